//! HTTP and WebSocket handlers

pub mod auth;
pub mod follows;
pub mod posts;
pub mod ws;

// Auth handlers
pub use auth::{list_users, login, logout, me, signup};

// Follow graph
pub use follows::{follow, list_followers, list_following, unfollow};

// Posts (notification trigger)
pub use posts::{create_post, feed};

// WebSocket channels
pub use ws::{chat_ws, notifications_ws};
