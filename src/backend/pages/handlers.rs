/**
 * Page Handlers
 *
 * `GET /` and `GET /topics/{id}` render full HTML documents; the live
 * connection middleware decides whether the response becomes a held stream.
 * `POST /topics/{id}/posts` stores a reply and announces the change so every
 * open view of the topic is re-rendered.
 */

use crate::backend::error::BackendError;
use crate::backend::live::LiveState;
use crate::backend::pages::{db, view};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, Redirect},
    Form,
};
use serde::Deserialize;
use sqlx::SqlitePool;

/// Reply form body
#[derive(Debug, Deserialize)]
pub struct NewPost {
    pub author: String,
    pub body: String,
}

pub async fn handle_index(State(pool): State<SqlitePool>) -> Result<Html<String>, BackendError> {
    let topics = db::list_topics(&pool).await?;
    Ok(Html(view::render_index(&topics)))
}

pub async fn handle_topic(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<Html<String>, BackendError> {
    let topic = db::find_topic(&pool, id)
        .await?
        .ok_or_else(|| BackendError::handler(StatusCode::NOT_FOUND, format!("no topic {}", id)))?;
    let posts = db::list_posts(&pool, id).await?;
    Ok(Html(view::render_topic(&topic, &posts)))
}

/// Store a reply, then announce the change to every open view of the topic
pub async fn handle_new_post(
    State(pool): State<SqlitePool>,
    State(live): State<LiveState>,
    Path(id): Path<i64>,
    Form(post): Form<NewPost>,
) -> Result<Redirect, BackendError> {
    let author = post.author.trim();
    let body = post.body.trim();
    if author.is_empty() || body.is_empty() {
        return Err(BackendError::handler(
            StatusCode::BAD_REQUEST,
            "author and body are required",
        ));
    }
    if db::find_topic(&pool, id).await?.is_none() {
        return Err(BackendError::handler(StatusCode::NOT_FOUND, format!("no topic {}", id)));
    }

    let post_id = db::insert_post(&pool, id, author, body).await?;
    tracing::info!("[Pages] Post {} added to topic {}", post_id, id);

    let url = format!("/topics/{}", id);
    live.notify_changed(&url).await?;
    Ok(Redirect::to(&url))
}
