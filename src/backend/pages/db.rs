/**
 * Database Operations for Topics and Posts
 *
 * Queries behind the demo discussion pages. Topics and posts live in the
 * same SQLite database as the connection registry.
 */

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

/// A discussion topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Topic {
    pub id: i64,
    pub title: String,
}

/// One post in a topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub topic_id: i64,
    pub author: String,
    pub body: String,
}

/// List every topic, oldest first
pub async fn list_topics(pool: &SqlitePool) -> Result<Vec<Topic>, sqlx::Error> {
    sqlx::query_as::<_, Topic>("SELECT id, title FROM topics ORDER BY id ASC")
        .fetch_all(pool)
        .await
}

pub async fn find_topic(pool: &SqlitePool, id: i64) -> Result<Option<Topic>, sqlx::Error> {
    sqlx::query_as::<_, Topic>("SELECT id, title FROM topics WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Create a topic and return its id
pub async fn insert_topic(pool: &SqlitePool, title: &str) -> Result<i64, sqlx::Error> {
    let result = sqlx::query("INSERT INTO topics (title, created_at) VALUES (?, ?)")
        .bind(title)
        .bind(Utc::now().timestamp_millis())
        .execute(pool)
        .await?;
    Ok(result.last_insert_rowid())
}

/// Posts of a topic in the order they were written
pub async fn list_posts(pool: &SqlitePool, topic_id: i64) -> Result<Vec<Post>, sqlx::Error> {
    sqlx::query_as::<_, Post>(
        r#"
        SELECT id, topic_id, author, body
        FROM posts
        WHERE topic_id = ?
        ORDER BY id ASC
        "#,
    )
    .bind(topic_id)
    .fetch_all(pool)
    .await
}

pub async fn insert_post(
    pool: &SqlitePool,
    topic_id: i64,
    author: &str,
    body: &str,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO posts (topic_id, author, body, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(topic_id)
    .bind(author)
    .bind(body)
    .bind(Utc::now().timestamp_millis())
    .execute(pool)
    .await?;
    Ok(result.last_insert_rowid())
}

/// Create the demo topics on an empty database
pub async fn seed_demo_topics(pool: &SqlitePool) -> Result<usize, sqlx::Error> {
    let (existing,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM topics")
        .fetch_one(pool)
        .await?;
    if existing > 0 {
        return Ok(0);
    }

    let titles = ["Welcome", "Week 1: Ownership", "Week 2: Async"];
    for title in titles {
        insert_topic(pool, title).await?;
    }
    tracing::info!("[Pages] Seeded {} demo topics", titles.len());
    Ok(titles.len())
}
