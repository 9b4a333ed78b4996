/**
 * Application State Management
 *
 * `AppState` is the state of the page router. It implements `FromRef` for
 * its parts so handlers extract only what they use: page handlers take the
 * `SqlitePool`, handlers that mutate data also take the `LiveState` to call
 * `notify_changed`.
 */

use crate::backend::live::LiveState;
use axum::extract::FromRef;
use sqlx::SqlitePool;

/// State shared by all page handlers
#[derive(Clone)]
pub struct AppState {
    /// Live-update machinery of this process
    pub live: LiveState,

    /// Pool for page data; the same database as the registry
    pub pool: SqlitePool,
}

impl FromRef<AppState> for LiveState {
    fn from_ref(state: &AppState) -> Self {
        state.live.clone()
    }
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}
