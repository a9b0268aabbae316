//! Follow Graph Module
//!
//! Directed follower/followed relationships. The notification broadcaster
//! selects its recipients from this graph.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;

use crate::auth::UserInfo;
use crate::db::fmt_ts;
use crate::error::{Error, Result};

pub struct FollowManager {
    pool: SqlitePool,
}

impl FollowManager {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Make `follower_id` follow `followed_id`.
    pub async fn follow(&self, follower_id: i64, followed_id: i64) -> Result<()> {
        if follower_id == followed_id {
            return Err(Error::SelfFollow);
        }

        let target: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE id = ?")
            .bind(followed_id)
            .fetch_optional(&self.pool)
            .await?;
        if target.is_none() {
            return Err(Error::UserNotFound { id: followed_id });
        }

        let existing: Option<(i64,)> = sqlx::query_as(
            "SELECT follower_id FROM follows WHERE follower_id = ? AND followed_id = ?",
        )
        .bind(follower_id)
        .bind(followed_id)
        .fetch_optional(&self.pool)
        .await?;
        if existing.is_some() {
            return Err(Error::AlreadyFollowing { id: followed_id });
        }

        sqlx::query("INSERT INTO follows (follower_id, followed_id, created_at) VALUES (?, ?, ?)")
            .bind(follower_id)
            .bind(followed_id)
            .bind(fmt_ts(Utc::now()))
            .execute(&self.pool)
            .await?;

        info!("[Follows] {} -> {}", follower_id, followed_id);

        Ok(())
    }

    /// Remove a follow relationship.
    pub async fn unfollow(&self, follower_id: i64, followed_id: i64) -> Result<()> {
        let result =
            sqlx::query("DELETE FROM follows WHERE follower_id = ? AND followed_id = ?")
                .bind(follower_id)
                .bind(followed_id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFollowing { id: followed_id });
        }

        info!("[Follows] {} unfollowed {}", follower_id, followed_id);

        Ok(())
    }

    /// Ids of users following `user_id`. Recipient source for fan-out.
    pub async fn follower_ids(&self, user_id: i64) -> Result<Vec<i64>> {
        let rows: Vec<(i64,)> =
            sqlx::query_as("SELECT follower_id FROM follows WHERE followed_id = ?")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Ids of users that `user_id` follows.
    pub async fn following_ids(&self, user_id: i64) -> Result<Vec<i64>> {
        let rows: Vec<(i64,)> =
            sqlx::query_as("SELECT followed_id FROM follows WHERE follower_id = ?")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Followers of `user_id` with user details.
    pub async fn followers(&self, user_id: i64) -> Result<Vec<UserInfo>> {
        let rows: Vec<(i64, String, String, String)> = sqlx::query_as(
            r#"
            SELECT u.id, u.first_name, u.last_name, u.email
            FROM follows f
            JOIN users u ON f.follower_id = u.id
            WHERE f.followed_id = ?
            ORDER BY u.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, first_name, last_name, email)| UserInfo {
                id,
                first_name,
                last_name,
                email,
            })
            .collect())
    }

    /// Users that `user_id` follows, with user details.
    pub async fn following(&self, user_id: i64) -> Result<Vec<UserInfo>> {
        let rows: Vec<(i64, String, String, String)> = sqlx::query_as(
            r#"
            SELECT u.id, u.first_name, u.last_name, u.email
            FROM follows f
            JOIN users u ON f.followed_id = u.id
            WHERE f.follower_id = ?
            ORDER BY u.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, first_name, last_name, email)| UserInfo {
                id,
                first_name,
                last_name,
                email,
            })
            .collect())
    }
}
