//! Post handlers
//!
//! Post creation is the trigger for the notification broadcaster: the post
//! commits first, and only then is the fan-out attempted. A fan-out failure
//! never fails the request.

use axum::{extract::State, Json};
use serde::Deserialize;
use tracing::{info, warn};

use crate::auth::middleware::Ctx;
use crate::config::AppState;
use crate::error::Result;
use crate::posts::PostDto;

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub content: String,
}

/// POST /posts
pub async fn create_post(
    State(state): State<AppState>,
    ctx: Ctx,
    Json(req): Json<CreatePostRequest>,
) -> Result<Json<PostDto>> {
    info!("POST /posts - user {}", ctx.user_id());

    let post = state.posts.create(ctx.user_id(), &req.content).await?;

    if let Err(e) = state
        .notifier
        .notify_new_content(post.user_id, &post.author_name)
        .await
    {
        warn!("[Posts] notification fan-out failed: {}", e);
    }

    Ok(Json(post))
}

/// GET /posts/feed
pub async fn feed(State(state): State<AppState>, ctx: Ctx) -> Result<Json<Vec<PostDto>>> {
    let posts = state
        .posts
        .feed_for(ctx.user_id(), &state.follows)
        .await?;
    Ok(Json(posts))
}
