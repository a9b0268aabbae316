//! Notification throttle gate
//!
//! A single process-wide timestamp guarding all notification fan-outs,
//! regardless of author. Initialized once at startup; the first event is
//! always admitted.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

pub struct NotificationThrottle {
    interval: Duration,
    last_notified_at: Mutex<Option<Instant>>,
}

impl NotificationThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_notified_at: Mutex::new(None),
        }
    }

    /// Check-and-advance in one critical section: either the gate is open
    /// and the timestamp advances to now, or the whole fan-out is
    /// suppressed. Two concurrent callers can never both be admitted within
    /// one interval.
    pub fn should_notify(&self) -> bool {
        let mut last = self.last_notified_at.lock();
        let now = Instant::now();
        match *last {
            Some(prev) if now.duration_since(prev) <= self.interval => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }
}
