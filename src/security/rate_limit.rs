//! Fixed-window rate limiting.
//!
//! At most one admitted request per identifier per window. There is no burst
//! credit: the window restarts only when a request is admitted.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Per-identifier fixed-interval gate.
pub struct RateLimiter {
    last_admitted: DashMap<String, Instant>,
    window: Duration,
}

impl RateLimiter {
    pub fn new(window: Duration) -> Self {
        Self {
            last_admitted: DashMap::new(),
            window,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Admit the request if the identifier's last admission is at least one
    /// window old. A refused request leaves the state unchanged.
    pub fn admit(&self, identifier: &str) -> bool {
        let now = Instant::now();
        match self.last_admitted.entry(identifier.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(now);
                true
            }
            Entry::Occupied(mut slot) => {
                if now.duration_since(*slot.get()) >= self.window {
                    slot.insert(now);
                    true
                } else {
                    tracing::debug!(identifier, "Rate limit window not elapsed");
                    false
                }
            }
        }
    }

    /// Drop identifiers not admitted for `max_idle`.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let before = self.last_admitted.len();
        self.last_admitted
            .retain(|_, admitted| now.duration_since(*admitted) < max_idle);
        before.saturating_sub(self.last_admitted.len())
    }

    pub fn len(&self) -> usize {
        self.last_admitted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_admitted.is_empty()
    }
}
