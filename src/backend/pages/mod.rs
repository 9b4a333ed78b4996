//! Demo Pages
//!
//! A small discussion board (topics with posts) standing in for the business
//! routes that live updates are layered over.
//!
//! - `GET /` - topic list
//! - `GET /topics/{id}` - one topic with its posts and a reply form
//! - `POST /topics/{id}/posts` - add a reply; calls `notify_changed("/topics/{id}")`

pub mod db;
pub mod handlers;
pub mod view;

use crate::backend::server::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

/// Page routes, without the live connection middleware
pub fn page_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::handle_index))
        .route("/topics/{id}", get(handlers::handle_topic))
        .route("/topics/{id}/posts", post(handlers::handle_new_post))
}
