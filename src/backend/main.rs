/**
 * Live-Updates Server Entry Point
 *
 * Runs one process of a deployment, or, when asked for several processes
 * without an index, supervises one child per index.
 */

#[cfg(feature = "ssr")]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use live_updates::backend::server::{config::load_config, create_app, supervisor};
    use std::net::SocketAddr;

    // Load environment variables from .env file if present
    dotenv::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
        .init();

    let config = load_config()?;

    let index_from_env = std::env::var("LIVE_PROCESS_INDEX").ok();
    if supervisor::should_supervise(&config, index_from_env.as_deref()) {
        tracing::info!("[Supervisor] Launching {} processes", config.process_count);
        let failed = supervisor::supervise(&config).await?;
        if failed > 0 {
            std::process::exit(1);
        }
        return Ok(());
    }

    let public_addr = SocketAddr::from(([0, 0, 0, 0], config.http_port()));
    let control_addr = SocketAddr::from(([127, 0, 0, 1], config.control_port()));

    let server = create_app(config).await?;
    let live = server.live.clone();

    let public = tokio::net::TcpListener::bind(public_addr).await?;
    let control = tokio::net::TcpListener::bind(control_addr).await?;

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("[Server] Failed to listen for Ctrl-C: {}", e);
            return;
        }
        tracing::info!("[Server] Shutting down");
        if let Err(e) = live.shutdown().await {
            tracing::error!("[Server] Shutdown cleanup failed: {}", e);
        }
    });

    server.serve(public, control).await?;
    Ok(())
}

#[cfg(not(feature = "ssr"))]
fn main() {
    eprintln!("Server requires the 'ssr' feature to be enabled.");
    eprintln!("Run with: cargo run --bin live-updates-server --features ssr");
    std::process::exit(1);
}
