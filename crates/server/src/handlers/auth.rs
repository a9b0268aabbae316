//! Auth handlers

use axum::{extract::State, http::header, http::HeaderMap, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::middleware::Ctx;
use crate::auth::UserInfo;
use crate::config::AppState;
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub user_id: i64,
    pub user_name: String,
}

/// POST /auth/signup
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<Json<AuthResponse>> {
    info!("POST /auth/signup - {}", req.email);

    state
        .auth
        .signup(&req.first_name, &req.last_name, &req.email, &req.password)
        .await?;
    let (user, session) = state.auth.login(&req.email, &req.password).await?;

    Ok(Json(AuthResponse {
        token: session.token,
        user_id: user.id,
        user_name: user.display_name(),
    }))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    info!("POST /auth/login - {}", req.email);

    let (user, session) = state.auth.login(&req.email, &req.password).await?;

    Ok(Json(AuthResponse {
        token: session.token,
        user_id: user.id,
        user_name: user.display_name(),
    }))
}

/// POST /auth/logout
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<()> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(Error::AuthFailNoToken)?;

    state.auth.logout(token).await
}

/// GET /auth/me
pub async fn me(State(state): State<AppState>, ctx: Ctx) -> Result<Json<UserInfo>> {
    let user = state
        .auth
        .get_user(ctx.user_id())
        .await?
        .ok_or(Error::UserNotFound { id: ctx.user_id() })?;
    Ok(Json(user))
}

/// GET /users (contact discovery)
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserInfo>>> {
    Ok(Json(state.auth.list_users().await?))
}
