//! Authentication Module
//!
//! Handles user signup, login, and session management. User and session
//! records live in the shared SQLite database; validated sessions are cached
//! in memory.

pub mod middleware;

use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::{fmt_ts, parse_ts};
use crate::error::{Error, Result};

/// User record stored in database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Public user info (no sensitive data)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl UserInfo {
    /// Display name as shown in conversation lists.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl From<User> for UserInfo {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
        }
    }
}

/// Session token for authenticated requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Auth manager handles all authentication
pub struct AuthManager {
    pool: SqlitePool,
    /// In-memory session cache
    sessions: RwLock<HashMap<String, Session>>,
}

impl AuthManager {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new user
    pub async fn signup(
        &self,
        first_name: &str,
        last_name: &str,
        email: &str,
        password: &str,
    ) -> Result<User> {
        let existing: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        if existing.is_some() {
            return Err(Error::EmailTaken);
        }

        let password_hash = hash(password, DEFAULT_COST)?;
        let created_at = Utc::now();

        let result = sqlx::query(
            "INSERT INTO users (first_name, last_name, email, password_hash, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(first_name)
        .bind(last_name)
        .bind(email)
        .bind(&password_hash)
        .bind(fmt_ts(created_at))
        .execute(&self.pool)
        .await?;

        let user = User {
            id: result.last_insert_rowid(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_string(),
            password_hash,
            created_at,
        };

        info!("[Auth] User registered: {} ({})", user.display_name(), email);

        Ok(user)
    }

    /// Login and create a session
    pub async fn login(&self, email: &str, password: &str) -> Result<(User, Session)> {
        let row: Option<(i64, String, String, String, String)> = sqlx::query_as(
            "SELECT id, first_name, last_name, password_hash, created_at FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        let (id, first_name, last_name, password_hash, created_at) =
            row.ok_or(Error::LoginFail)?;

        let valid = verify(password, &password_hash)?;
        if !valid {
            warn!("[Auth] Failed login attempt for {}", email);
            return Err(Error::LoginFail);
        }

        let session = self.create_session(id).await?;

        let user = User {
            id,
            first_name,
            last_name,
            email: email.to_string(),
            password_hash: String::new(), // Don't return hash
            created_at: parse_ts(&created_at),
        };

        info!("[Auth] User logged in: {}", user.display_name());

        Ok((user, session))
    }

    async fn create_session(&self, user_id: i64) -> Result<Session> {
        let session = Session {
            token: Uuid::new_v4().to_string(),
            user_id,
            created_at: Utc::now(),
            expires_at: Utc::now() + chrono::Duration::days(30),
        };

        sqlx::query(
            "INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&session.token)
        .bind(session.user_id)
        .bind(fmt_ts(session.created_at))
        .bind(fmt_ts(session.expires_at))
        .execute(&self.pool)
        .await?;

        self.sessions
            .write()
            .await
            .insert(session.token.clone(), session.clone());

        Ok(session)
    }

    /// Validate a session token, returning the owning user.
    pub async fn validate_session(&self, token: &str) -> Result<UserInfo> {
        // Check cache first
        let cached_user_id = {
            let sessions = self.sessions.read().await;
            sessions
                .get(token)
                .filter(|s| s.expires_at > Utc::now())
                .map(|s| s.user_id)
        };
        if let Some(user_id) = cached_user_id {
            if let Some(user) = self.get_user(user_id).await? {
                return Ok(user);
            }
        }

        // Check database
        let row: Option<(i64, String, String, String, String)> = sqlx::query_as(
            r#"
            SELECT u.id, u.first_name, u.last_name, u.email, s.expires_at
            FROM users u
            JOIN sessions s ON u.id = s.user_id
            WHERE s.token = ?
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        if let Some((id, first_name, last_name, email, expires_at)) = row {
            if parse_ts(&expires_at) > Utc::now() {
                return Ok(UserInfo {
                    id,
                    first_name,
                    last_name,
                    email,
                });
            }
        }

        Err(Error::SessionInvalid)
    }

    /// Logout (invalidate session)
    pub async fn logout(&self, token: &str) -> Result<()> {
        self.sessions.write().await.remove(token);

        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;

        info!("[Auth] Session invalidated");

        Ok(())
    }

    /// Look up a user by id.
    pub async fn get_user(&self, user_id: i64) -> Result<Option<UserInfo>> {
        let row: Option<(i64, String, String, String)> = sqlx::query_as(
            "SELECT id, first_name, last_name, email FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, first_name, last_name, email)| UserInfo {
            id,
            first_name,
            last_name,
            email,
        }))
    }

    /// List all users (for contact discovery)
    pub async fn list_users(&self) -> Result<Vec<UserInfo>> {
        let rows: Vec<(i64, String, String, String)> =
            sqlx::query_as("SELECT id, first_name, last_name, email FROM users ORDER BY id")
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

impl User {
    /// Display name as shown in logs and auth responses.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
