/**
 * Server Initialization
 *
 * Builds one process of a deployment.
 *
 * # Initialization Process
 *
 * 1. Open the registry (or take one supplied by the caller)
 * 2. Create the live state for this process
 * 3. Release rows a crashed predecessor left under this process id
 * 4. Seed the demo topics on an empty database
 * 5. Create the public and control routers
 *
 * Background tasks (drain worker, reapers) start in [`LiveServer::serve`].
 */

use crate::backend::error::BackendError;
use crate::backend::live::LiveState;
use crate::backend::pages::db::seed_demo_topics;
use crate::backend::registry::ConnectionRegistry;
use crate::backend::routes::{create_control_router, create_router};
use crate::backend::server::config::load_registry;
use crate::backend::server::state::AppState;
use crate::shared::LiveConfig;
use axum::Router;
use tokio::net::TcpListener;

/// One process, ready to serve
pub struct LiveServer {
    /// Public router (pages behind the live connection middleware)
    pub app: Router<()>,
    /// Loopback control router
    pub control: Router<()>,
    pub live: LiveState,
}

/// Create the process described by `config`, opening its registry
pub async fn create_app(config: LiveConfig) -> Result<LiveServer, BackendError> {
    let registry = load_registry(&config).await?;
    create_app_with_registry(config, registry).await
}

/// Create a process on an already opened registry
pub async fn create_app_with_registry(
    config: LiveConfig,
    registry: ConnectionRegistry,
) -> Result<LiveServer, BackendError> {
    tracing::info!("[Server] Initializing process {}", config.process_index);

    let live = LiveState::new(config, registry.clone())?;
    live.release_stale_rows().await?;
    seed_demo_topics(registry.pool()).await?;

    let app_state = AppState {
        live: live.clone(),
        pool: registry.pool().clone(),
    };
    let app = create_router(app_state);
    let control = create_control_router(live.clone());

    tracing::info!("[Server] Routers configured for {}", live.process());
    Ok(LiveServer { app, control, live })
}

impl LiveServer {
    /// Serve both routers until the live state is shut down
    ///
    /// Held streams end when shutdown cancels them, so graceful shutdown
    /// does not wait on long-polls.
    pub async fn serve(self, public: TcpListener, control: TcpListener) -> std::io::Result<()> {
        let workers = self.live.spawn_background_tasks();
        let token = self.live.shutdown_token().clone();

        tracing::info!(
            "[Server] {} listening on {} (control {})",
            self.live.process(),
            public.local_addr()?,
            control.local_addr()?
        );

        let public_token = token.clone();
        let public_server = axum::serve(public, self.app)
            .with_graceful_shutdown(async move { public_token.cancelled().await });
        let control_server = axum::serve(control, self.control)
            .with_graceful_shutdown(async move { token.cancelled().await });

        let result = tokio::try_join!(
            async { public_server.await },
            async { control_server.await }
        );

        for worker in workers {
            if let Err(e) = worker.await {
                tracing::warn!("[Server] Background task ended abnormally: {}", e);
            }
        }
        result.map(|_| ())
    }
}
