/**
 * Control Endpoint
 *
 * `POST /live-updates` is the sibling ping: "you may have pending work".
 * It carries no body; the receiver re-reads the registry itself.
 */

use crate::backend::live::LiveState;
use axum::{extract::State, http::StatusCode};

/// Wake the drain worker and answer at once
pub async fn handle_live_updates_ping(State(live): State<LiveState>) -> StatusCode {
    tracing::debug!("[Notifier] Ping received by {}", live.process());
    live.wake_local();
    StatusCode::NO_CONTENT
}
