//! Follow graph handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;

use crate::auth::middleware::Ctx;
use crate::auth::UserInfo;
use crate::config::AppState;
use crate::error::Result;

/// POST /follows/{user_id}
pub async fn follow(
    State(state): State<AppState>,
    ctx: Ctx,
    Path(user_id): Path<i64>,
) -> Result<StatusCode> {
    info!("POST /follows/{}", user_id);
    state.follows.follow(ctx.user_id(), user_id).await?;
    Ok(StatusCode::CREATED)
}

/// DELETE /follows/{user_id}
pub async fn unfollow(
    State(state): State<AppState>,
    ctx: Ctx,
    Path(user_id): Path<i64>,
) -> Result<StatusCode> {
    info!("DELETE /follows/{}", user_id);
    state.follows.unfollow(ctx.user_id(), user_id).await?;
    Ok(StatusCode::OK)
}

/// GET /follows/followers
pub async fn list_followers(
    State(state): State<AppState>,
    ctx: Ctx,
) -> Result<Json<Vec<UserInfo>>> {
    Ok(Json(state.follows.followers(ctx.user_id()).await?))
}

/// GET /follows/following
pub async fn list_following(
    State(state): State<AppState>,
    ctx: Ctx,
) -> Result<Json<Vec<UserInfo>>> {
    Ok(Json(state.follows.following(ctx.user_id()).await?))
}
