//! Notification Broadcaster
//!
//! Pushes a lightweight new-content signal to the live connections of an
//! author's followers, behind a single global throttle gate. The signal is
//! ephemeral: nothing is persisted, and a follower without a live handle
//! simply misses it.

pub mod throttle;

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

use crate::chat::presence::PresenceRegistry;
use crate::chat::protocol::{NewPostPayload, ServerFrame};
use crate::error::Result;
use crate::follows::FollowManager;
use throttle::NotificationThrottle;

pub struct NotificationBroadcaster {
    follows: Arc<FollowManager>,
    presence: Arc<PresenceRegistry>,
    throttle: NotificationThrottle,
}

impl NotificationBroadcaster {
    pub fn new(
        follows: Arc<FollowManager>,
        presence: Arc<PresenceRegistry>,
        throttle: NotificationThrottle,
    ) -> Self {
        Self {
            follows,
            presence,
            throttle,
        }
    }

    /// Fan a new-content signal out to the author's followers that hold a
    /// live handle. The gate is global: when it is closed, the entire
    /// fan-out for this event is suppressed, whoever the author is.
    /// Returns the number of recipients that accepted the push.
    pub async fn notify_new_content(&self, author_id: i64, author_name: &str) -> Result<usize> {
        if !self.throttle.should_notify() {
            debug!(
                "[Notify] fan-out for author {} suppressed by throttle",
                author_id
            );
            return Ok(0);
        }

        let followers = self.follows.follower_ids(author_id).await?;
        let payload = NewPostPayload {
            has_new_post: true,
            author_name: author_name.to_string(),
            timestamp: Utc::now(),
        };

        let mut delivered = 0;
        for follower_id in &followers {
            // A handle gone stale between selection and push is dropped
            // silently; not an error for the caller.
            if self
                .presence
                .push_to(*follower_id, ServerFrame::NewPostNotification(payload.clone()))
                .await
            {
                delivered += 1;
            }
        }

        info!(
            "[Notify] author {}: {}/{} followers reached",
            author_id,
            delivered,
            followers.len()
        );

        Ok(delivered)
    }
}
