/**
 * Router Configuration
 *
 * Two routers per process:
 *
 * - The public router: page routes wrapped in the live connection
 *   middleware and a `TraceLayer`.
 * - The control router, bound to loopback: `POST /live-updates`.
 *
 * The page routes are also installed, without the middleware, as the
 * renderer that pushes replay requests through.
 */

use crate::backend::live::{LiveState, RouterRenderer};
use crate::backend::middleware::live_connection_middleware;
use crate::backend::pages::page_routes;
use crate::backend::routes::control::handle_live_updates_ping;
use crate::backend::server::state::AppState;
use axum::{middleware, routing::post, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Create the public router and install the push renderer
pub fn create_router(app_state: AppState) -> Router<()> {
    let live = app_state.live.clone();
    let pages: Router<()> = page_routes().with_state(app_state);

    if !live.install_renderer(Arc::new(RouterRenderer::new(pages.clone()))) {
        tracing::warn!("[Server] Renderer already installed; keeping the first one");
    }

    pages
        .layer(middleware::from_fn_with_state(live, live_connection_middleware))
        .layer(TraceLayer::new_for_http())
}

/// Create the loopback control router
pub fn create_control_router(live: LiveState) -> Router<()> {
    Router::new()
        .route("/live-updates", post(handle_live_updates_ping))
        .with_state(live)
}
