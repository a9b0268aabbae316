//! Post creation and feed
//!
//! The post-creation collaborator of the notification layer. A post is
//! committed durably first; the caller triggers the broadcaster only after
//! this module returns.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;

use crate::db::{fmt_ts, parse_ts};
use crate::error::{Error, Result};
use crate::follows::FollowManager;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDto {
    pub id: i64,
    pub user_id: i64,
    pub author_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

pub struct PostManager {
    pool: SqlitePool,
}

impl PostManager {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Durably create a post for `user_id`.
    pub async fn create(&self, user_id: i64, content: &str) -> Result<PostDto> {
        if content.trim().is_empty() {
            return Err(Error::EmptyPost);
        }

        let author: Option<(String, String)> =
            sqlx::query_as("SELECT first_name, last_name FROM users WHERE id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        let (first_name, last_name) = author.ok_or(Error::UserNotFound { id: user_id })?;

        let created_at = Utc::now();
        let result =
            sqlx::query("INSERT INTO posts (user_id, content, created_at) VALUES (?, ?, ?)")
                .bind(user_id)
                .bind(content)
                .bind(fmt_ts(created_at))
                .execute(&self.pool)
                .await?;
        let id = result.last_insert_rowid();

        info!("[Posts] post {} created by user {}", id, user_id);

        Ok(PostDto {
            id,
            user_id,
            author_name: format!("{} {}", first_name, last_name),
            content: content.to_string(),
            created_at,
        })
    }

    /// Posts by `user_id` and everyone they follow, newest first.
    pub async fn feed_for(&self, user_id: i64, follows: &FollowManager) -> Result<Vec<PostDto>> {
        let mut author_ids = follows.following_ids(user_id).await?;
        author_ids.push(user_id);

        // SQLite has no array binds; the id list is small (a user's follow
        // list), so build the placeholder list by hand.
        let placeholders = vec!["?"; author_ids.len()].join(", ");
        let sql = format!(
            r#"
            SELECT p.id, p.user_id, u.first_name, u.last_name, p.content, p.created_at
            FROM posts p
            JOIN users u ON p.user_id = u.id
            WHERE p.user_id IN ({})
            ORDER BY p.created_at DESC, p.id DESC
            "#,
            placeholders
        );

        let mut query = sqlx::query_as::<_, (i64, i64, String, String, String, String)>(&sql);
        for id in &author_ids {
            query = query.bind(*id);
        }
        let rows = query.fetch_all(&self.pool).await?;

        Ok(rows
            .into_iter()
            .map(|(id, user_id, first_name, last_name, content, created_at)| PostDto {
                id,
                user_id,
                author_name: format!("{} {}", first_name, last_name),
                content,
                created_at: parse_ts(&created_at),
            })
            .collect())
    }
}
