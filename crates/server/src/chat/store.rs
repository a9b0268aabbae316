//! Message Store
//!
//! Append-only log of direct messages. The database row is the record of
//! truth; live delivery is an optimization layered on top. Messages are
//! never updated or deleted.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::db::{fmt_ts, parse_ts};
use crate::error::Result;

/// Persisted message. Immutable once written.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

pub struct MessageStore {
    pool: SqlitePool,
}

impl MessageStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist a message with a server-assigned id and timestamp. The write
    /// is a single INSERT: the message is fully created or not created at
    /// all, and it has committed by the time this returns.
    pub async fn insert(
        &self,
        sender_id: i64,
        receiver_id: i64,
        content: &str,
    ) -> Result<Message> {
        let sent_at = Utc::now();
        let result = sqlx::query(
            "INSERT INTO messages (sender_id, receiver_id, content, sent_at) VALUES (?, ?, ?, ?)",
        )
        .bind(sender_id)
        .bind(receiver_id)
        .bind(content)
        .bind(fmt_ts(sent_at))
        .execute(&self.pool)
        .await?;

        Ok(Message {
            id: result.last_insert_rowid(),
            sender_id,
            receiver_id,
            content: content.to_string(),
            sent_at,
        })
    }

    /// All messages between the unordered pair {a, b}, ascending by
    /// (sent_at, id). Serves both directions identically.
    pub async fn history_between(&self, a: i64, b: i64) -> Result<Vec<Message>> {
        let rows: Vec<(i64, i64, i64, String, String)> = sqlx::query_as(
            r#"
            SELECT id, sender_id, receiver_id, content, sent_at
            FROM messages
            WHERE (sender_id = ?1 AND receiver_id = ?2)
               OR (sender_id = ?2 AND receiver_id = ?1)
            ORDER BY sent_at ASC, id ASC
            "#,
        )
        .bind(a)
        .bind(b)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(row_to_message).collect())
    }

    /// Distinct counterparties `user_id` has exchanged messages with.
    pub async fn counterparty_ids(&self, user_id: i64) -> Result<Vec<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT CASE WHEN sender_id = ?1 THEN receiver_id ELSE sender_id END
            FROM messages
            WHERE sender_id = ?1 OR receiver_id = ?1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Most recent message between the pair by (sent_at, id), if any.
    pub async fn last_message_between(&self, a: i64, b: i64) -> Result<Option<Message>> {
        let row: Option<(i64, i64, i64, String, String)> = sqlx::query_as(
            r#"
            SELECT id, sender_id, receiver_id, content, sent_at
            FROM messages
            WHERE (sender_id = ?1 AND receiver_id = ?2)
               OR (sender_id = ?2 AND receiver_id = ?1)
            ORDER BY sent_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(a)
        .bind(b)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(row_to_message))
    }
}

fn row_to_message(row: (i64, i64, i64, String, String)) -> Message {
    let (id, sender_id, receiver_id, content, sent_at) = row;
    Message {
        id,
        sender_id,
        receiver_id,
        content,
        sent_at: parse_ts(&sent_at),
    }
}
