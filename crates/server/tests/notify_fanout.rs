//! Notification fan-out behavior: follower selection, liveness filtering,
//! and the global throttle gate.

use std::time::Duration;

use server::chat::protocol::ServerFrame;
use server::chat::ClientHandle;
use server::config::{AppState, ServerConfig};
use server::db;
use tempfile::TempDir;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Short throttle window so the gate can reopen inside a test.
const TEST_WINDOW: Duration = Duration::from_millis(150);

async fn setup() -> (TempDir, AppState) {
    let dir = TempDir::new().unwrap();
    let pool = db::connect(&dir.path().join("test.db")).await.unwrap();
    db::run_migrations(&pool).await.unwrap();

    let mut config = ServerConfig::default();
    config.notify_throttle = TEST_WINDOW;

    let state = server::build_state(pool, &config);
    (dir, state)
}

async fn create_user(state: &AppState, first: &str, last: &str, email: &str) -> i64 {
    state
        .auth
        .signup(first, last, email, "hunter2!")
        .await
        .unwrap()
        .id
}

/// Register a live notification-channel handle for `user_id`.
async fn connect_feed(
    state: &AppState,
    user_id: i64,
) -> mpsc::UnboundedReceiver<ServerFrame> {
    let (tx, rx) = mpsc::unbounded_channel();
    state
        .feed_presence
        .register(user_id, ClientHandle::new(Uuid::new_v4(), tx))
        .await;
    rx
}

fn expect_new_post(frame: ServerFrame) -> (String, bool) {
    match frame {
        ServerFrame::NewPostNotification(payload) => (payload.author_name, payload.has_new_post),
        other => panic!("expected newPostNotification, got {:?}", other),
    }
}

#[tokio::test]
async fn fanout_reaches_live_followers_only() {
    let (_dir, state) = setup().await;
    let author = create_user(&state, "Ada", "Lovelace", "ada@example.com").await;
    let live_follower = create_user(&state, "Blaise", "Pascal", "blaise@example.com").await;
    let offline_follower = create_user(&state, "Carl", "Gauss", "carl@example.com").await;
    let bystander = create_user(&state, "Emmy", "Noether", "emmy@example.com").await;

    state.follows.follow(live_follower, author).await.unwrap();
    state.follows.follow(offline_follower, author).await.unwrap();

    let mut follower_rx = connect_feed(&state, live_follower).await;
    let mut bystander_rx = connect_feed(&state, bystander).await;

    let post = state.posts.create(author, "first light").await.unwrap();
    let delivered = state
        .notifier
        .notify_new_content(post.user_id, &post.author_name)
        .await
        .unwrap();

    assert_eq!(delivered, 1);

    let (author_name, has_new_post) = expect_new_post(follower_rx.try_recv().unwrap());
    assert_eq!(author_name, "Ada Lovelace");
    assert!(has_new_post);

    assert!(bystander_rx.try_recv().is_err(), "non-followers hear nothing");
}

#[tokio::test]
async fn throttle_gate_is_global_across_authors() {
    let (_dir, state) = setup().await;
    let author_one = create_user(&state, "Ada", "Lovelace", "ada@example.com").await;
    let author_two = create_user(&state, "Blaise", "Pascal", "blaise@example.com").await;
    let follower = create_user(&state, "Carl", "Gauss", "carl@example.com").await;

    state.follows.follow(follower, author_one).await.unwrap();
    state.follows.follow(follower, author_two).await.unwrap();

    let mut rx = connect_feed(&state, follower).await;

    // First event passes and advances the gate
    let delivered = state
        .notifier
        .notify_new_content(author_one, "Ada Lovelace")
        .await
        .unwrap();
    assert_eq!(delivered, 1);

    // A different author inside the same window is suppressed entirely
    let delivered = state
        .notifier
        .notify_new_content(author_two, "Blaise Pascal")
        .await
        .unwrap();
    assert_eq!(delivered, 0);

    let (first_author, _) = expect_new_post(rx.try_recv().unwrap());
    assert_eq!(first_author, "Ada Lovelace");
    assert!(rx.try_recv().is_err(), "suppressed fan-out reaches nobody");

    // Once the window has elapsed the gate reopens
    tokio::time::sleep(TEST_WINDOW + Duration::from_millis(50)).await;
    let delivered = state
        .notifier
        .notify_new_content(author_two, "Blaise Pascal")
        .await
        .unwrap();
    assert_eq!(delivered, 1);

    let (second_author, _) = expect_new_post(rx.try_recv().unwrap());
    assert_eq!(second_author, "Blaise Pascal");
}

#[tokio::test]
async fn stale_handles_are_dropped_silently() {
    let (_dir, state) = setup().await;
    let author = create_user(&state, "Ada", "Lovelace", "ada@example.com").await;
    let follower = create_user(&state, "Blaise", "Pascal", "blaise@example.com").await;

    state.follows.follow(follower, author).await.unwrap();

    // The follower's receiving side goes away after registration
    let rx = connect_feed(&state, follower).await;
    drop(rx);

    let delivered = state
        .notifier
        .notify_new_content(author, "Ada Lovelace")
        .await
        .unwrap();
    assert_eq!(delivered, 0, "dead handle is not an error, just a miss");
}

#[tokio::test]
async fn post_creation_commits_before_fanout() {
    let (_dir, state) = setup().await;
    let author = create_user(&state, "Ada", "Lovelace", "ada@example.com").await;
    let follower = create_user(&state, "Blaise", "Pascal", "blaise@example.com").await;

    state.follows.follow(follower, author).await.unwrap();
    let mut rx = connect_feed(&state, follower).await;

    let post = state.posts.create(author, "durable first").await.unwrap();
    state
        .notifier
        .notify_new_content(post.user_id, &post.author_name)
        .await
        .unwrap();

    expect_new_post(rx.try_recv().unwrap());

    // The notified client re-fetches the feed and finds the post
    let feed = state.posts.feed_for(follower, &state.follows).await.unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].content, "durable first");
    assert_eq!(feed[0].author_name, "Ada Lovelace");
}
