//! Social Server Library
//!
//! Presence tracking, durable direct messaging with live WebSocket
//! delivery, and throttled new-post notification fan-out, plus the thin
//! account/follow/post endpoints the real-time core depends on.

pub mod auth;
pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod follows;
pub mod handlers;
pub mod notify;
pub mod posts;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use auth::AuthManager;
use chat::{ChatGateway, MessageStore, PresenceRegistry};
use config::{AppState, ServerConfig};
use follows::FollowManager;
use handlers::{
    chat_ws,
    create_post,
    feed,
    follow,
    list_followers,
    list_following,
    list_users,
    login,
    logout,
    me,
    notifications_ws,
    signup,
    unfollow,
};
use notify::{throttle::NotificationThrottle, NotificationBroadcaster};
use posts::PostManager;

pub async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        // Already set, ignore
    }

    let config = ServerConfig::from_env();

    info!("=== Social Server ===");
    info!("Database: {:?}", config.database_path);
    info!(
        "Notification throttle: {:?} (global gate)",
        config.notify_throttle
    );

    let pool = db::connect(&config.database_path).await?;
    db::run_migrations(&pool).await?;
    info!("Database ready");

    let state = build_state(pool, &config);

    let app = build_router(state);

    info!("Listening on http://{}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Wire the managers together. The throttle gate is created exactly once
/// here, at startup, and lives inside the broadcaster for the process
/// lifetime.
pub fn build_state(pool: sqlx::SqlitePool, config: &ServerConfig) -> AppState {
    let auth = Arc::new(AuthManager::new(pool.clone()));
    let follows = Arc::new(FollowManager::new(pool.clone()));
    let chat_presence = Arc::new(PresenceRegistry::new());
    let feed_presence = Arc::new(PresenceRegistry::new());

    let chat = Arc::new(ChatGateway::new(
        MessageStore::new(pool.clone()),
        auth.clone(),
        chat_presence.clone(),
    ));
    let notifier = Arc::new(NotificationBroadcaster::new(
        follows.clone(),
        feed_presence.clone(),
        NotificationThrottle::new(config.notify_throttle),
    ));
    let posts = Arc::new(PostManager::new(pool));

    AppState {
        auth,
        follows,
        chat,
        posts,
        notifier,
        chat_presence,
        feed_presence,
    }
}

fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
        .route("/users", get(list_users))
        .route("/follows/{user_id}", post(follow).delete(unfollow))
        .route("/follows/followers", get(list_followers))
        .route("/follows/following", get(list_following))
        .route("/posts", post(create_post))
        .route("/posts/feed", get(feed))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::middleware::mw_require_auth,
        ));

    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        // WS channels authenticate via access_token query parameter
        .route("/ws/chat", get(chat_ws))
        .route("/ws/notifications", get(notifications_ws))
        .merge(protected)
        .route("/health", get(health_check))
        .with_state(state)
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tower::ServiceExt;

    async fn test_app() -> (tempfile::TempDir, AppState, Router) {
        let dir = tempfile::tempdir().unwrap();
        let pool = db::connect(&dir.path().join("test.db")).await.unwrap();
        db::run_migrations(&pool).await.unwrap();
        let state = build_state(pool, &ServerConfig::default());
        let app = build_router(state.clone());
        (dir, state, app)
    }

    /// Serve the router on an ephemeral port so the WS upgrade path runs
    /// against a real connection.
    async fn spawn_server(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    /// Raw HTTP/1.1 WebSocket handshake; returns the response head.
    async fn ws_handshake(addr: SocketAddr, uri: &str) -> (tokio::net::TcpStream, String) {
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "GET {uri} HTTP/1.1\r\n\
             Host: {addr}\r\n\
             Connection: Upgrade\r\n\
             Upgrade: websocket\r\n\
             Sec-WebSocket-Version: 13\r\n\
             Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n"
        );
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut buf = vec![0u8; 1024];
        let n = stream.read(&mut buf).await.unwrap();
        (stream, String::from_utf8_lossy(&buf[..n]).into_owned())
    }

    #[tokio::test]
    async fn ws_connect_without_token_is_rejected() {
        let (_dir, state, app) = test_app().await;
        let addr = spawn_server(app).await;

        let (_stream, response) = ws_handshake(addr, "/ws/chat").await;
        assert!(response.starts_with("HTTP/1.1 401"), "got: {response}");

        // The rejected connect never reached the registry
        assert!(state.chat_presence.lookup(1).await.is_none());
    }

    #[tokio::test]
    async fn ws_connect_with_bogus_token_is_rejected() {
        let (_dir, state, app) = test_app().await;
        let addr = spawn_server(app).await;

        let (_stream, response) =
            ws_handshake(addr, "/ws/notifications?access_token=bogus").await;
        assert!(response.starts_with("HTTP/1.1 401"), "got: {response}");
        assert!(state.feed_presence.lookup(1).await.is_none());
    }

    #[tokio::test]
    async fn ws_connect_with_valid_token_registers_presence() {
        let (_dir, state, app) = test_app().await;
        let addr = spawn_server(app).await;

        let user = state
            .auth
            .signup("Ada", "Lovelace", "ada@example.com", "hunter2!")
            .await
            .unwrap();
        let (_, session) = state
            .auth
            .login("ada@example.com", "hunter2!")
            .await
            .unwrap();

        let uri = format!("/ws/chat?access_token={}", session.token);
        let (_stream, response) = ws_handshake(addr, &uri).await;
        assert!(response.starts_with("HTTP/1.1 101"), "got: {response}");

        // Registration happens on the upgraded task; poll briefly
        for _ in 0..50 {
            if state.chat_presence.is_online(user.id).await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("user never appeared in the presence registry");
    }

    #[tokio::test]
    async fn protected_routes_require_bearer_token() {
        let (_dir, _state, app) = test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/posts/feed")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
