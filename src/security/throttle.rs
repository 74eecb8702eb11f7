//! Login-failure throttle.
//!
//! # Responsibilities
//! - Count authentication failures per identifier
//! - Lock an identifier out once it reaches `max_attempts`
//! - Expire lockouts lazily, `lockout` after the last failure
//!
//! # Design Decisions
//! - One DashMap shard lock per access; unrelated identifiers rarely contend
//! - An expired lockout deletes the record (full amnesty), never decrements
//! - Readers that find an expired lockout remove it themselves; no sweep is
//!   required for correctness

use dashmap::DashMap;
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
struct FailureState {
    count: u32,
    last_failure: Instant,
}

/// Current standing of one identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "failures")]
pub enum ThrottleState {
    Clean,
    Warned(u32),
    Locked,
}

/// Per-identifier failure counter with time-boxed lockout.
pub struct LoginThrottle {
    failures: DashMap<String, FailureState>,
    max_attempts: u32,
    lockout: Duration,
}

impl LoginThrottle {
    pub fn new(max_attempts: u32, lockout: Duration) -> Self {
        Self {
            failures: DashMap::new(),
            max_attempts: max_attempts.max(1),
            lockout,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn lockout(&self) -> Duration {
        self.lockout
    }

    fn is_expired(&self, state: &FailureState, now: Instant) -> bool {
        state.count >= self.max_attempts && now.duration_since(state.last_failure) >= self.lockout
    }

    fn classify(&self, state: &FailureState, now: Instant) -> ThrottleState {
        if state.count < self.max_attempts {
            ThrottleState::Warned(state.count)
        } else if self.is_expired(state, now) {
            ThrottleState::Clean
        } else {
            ThrottleState::Locked
        }
    }

    /// Count one failure. Returns `true` only for the failure that crosses the
    /// threshold.
    pub fn record_failure(&self, identifier: &str) -> bool {
        let now = Instant::now();
        let mut entry = self
            .failures
            .entry(identifier.to_string())
            .or_insert(FailureState {
                count: 0,
                last_failure: now,
            });

        if self.is_expired(&entry, now) {
            entry.count = 0;
        }
        entry.count = entry.count.saturating_add(1);
        entry.last_failure = now;

        let newly_locked = entry.count == self.max_attempts;
        let count = entry.count;
        drop(entry);

        if newly_locked {
            tracing::warn!(identifier, failures = count, lockout = ?self.lockout, "Identifier locked out");
        } else {
            tracing::debug!(identifier, failures = count, "Authentication failure recorded");
        }
        newly_locked
    }

    /// Forget all failures of an identifier.
    pub fn record_success(&self, identifier: &str) {
        self.failures.remove(identifier);
    }

    /// Evaluate the identifier, dropping its record if the lockout has run out.
    pub fn state_of(&self, identifier: &str) -> ThrottleState {
        let now = Instant::now();
        let state = self
            .failures
            .get(identifier)
            .map(|entry| self.classify(entry.value(), now));

        match state {
            None => ThrottleState::Clean,
            Some(ThrottleState::Clean) => {
                self.failures
                    .remove_if(identifier, |_, state| self.is_expired(state, now));
                ThrottleState::Clean
            }
            Some(other) => other,
        }
    }

    pub fn is_locked(&self, identifier: &str) -> bool {
        self.state_of(identifier) == ThrottleState::Locked
    }

    /// Failures currently counted for an identifier.
    pub fn failures(&self, identifier: &str) -> u32 {
        self.failures.get(identifier).map(|entry| entry.count).unwrap_or(0)
    }

    /// Clear the whole table. Returns how many identifiers were locked.
    pub fn unlock_all(&self) -> usize {
        let locked = self.locked_count();
        self.failures.clear();
        tracing::info!(unlocked = locked, "All lockouts cleared");
        locked
    }

    /// Identifiers currently locked out, sorted.
    pub fn locked_identifiers(&self) -> Vec<String> {
        let now = Instant::now();
        let mut locked: Vec<String> = self
            .failures
            .iter()
            .filter(|entry| self.classify(entry.value(), now) == ThrottleState::Locked)
            .map(|entry| entry.key().clone())
            .collect();
        locked.sort();
        locked
    }

    pub fn locked_count(&self) -> usize {
        let now = Instant::now();
        self.failures
            .iter()
            .filter(|entry| self.classify(entry.value(), now) == ThrottleState::Locked)
            .count()
    }

    /// Drop records whose last failure is older than `max_idle`.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let before = self.failures.len();
        self.failures
            .retain(|_, state| now.duration_since(state.last_failure) < max_idle);
        before.saturating_sub(self.failures.len())
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::time::advance;

    const LOCKOUT: Duration = Duration::from_secs(15 * 60);

    fn throttle() -> LoginThrottle {
        LoginThrottle::new(5, LOCKOUT)
    }

    #[tokio::test(start_paused = true)]
    async fn test_locks_at_threshold() {
        let throttle = throttle();

        for attempt in 1..5 {
            assert!(!throttle.record_failure("10.0.0.1"));
            assert_eq!(throttle.state_of("10.0.0.1"), ThrottleState::Warned(attempt));
        }
        assert!(throttle.record_failure("10.0.0.1"));
        assert!(throttle.is_locked("10.0.0.1"));
        assert_eq!(throttle.locked_identifiers(), vec!["10.0.0.1".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_counter() {
        let throttle = throttle();
        for _ in 0..5 {
            throttle.record_failure("10.0.0.1");
        }

        throttle.record_success("10.0.0.1");
        assert!(!throttle.is_locked("10.0.0.1"));
        assert!(!throttle.record_failure("10.0.0.1"));
        assert_eq!(throttle.failures("10.0.0.1"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lockout_expires_without_reset() {
        let throttle = throttle();
        for _ in 0..5 {
            throttle.record_failure("10.0.0.1");
        }

        advance(LOCKOUT - Duration::from_secs(1)).await;
        assert!(throttle.is_locked("10.0.0.1"));

        advance(Duration::from_secs(1)).await;
        assert!(!throttle.is_locked("10.0.0.1"));
        assert!(throttle.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_after_expiry_starts_from_zero() {
        let throttle = throttle();
        for _ in 0..5 {
            throttle.record_failure("10.0.0.1");
        }
        advance(Duration::from_secs(16 * 60)).await;

        assert!(!throttle.record_failure("10.0.0.1"));
        assert_eq!(throttle.state_of("10.0.0.1"), ThrottleState::Warned(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unlock_all_clears_table() {
        let throttle = throttle();
        for _ in 0..5 {
            throttle.record_failure("10.0.0.1");
            throttle.record_failure("10.0.0.2");
        }
        throttle.record_failure("10.0.0.3");

        assert_eq!(throttle.locked_count(), 2);
        assert_eq!(throttle.unlock_all(), 2);
        assert!(throttle.is_empty());
        assert!(!throttle.is_locked("10.0.0.1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_evict_idle_keeps_recent_records() {
        let throttle = throttle();
        throttle.record_failure("10.0.0.1");
        advance(Duration::from_secs(120)).await;
        throttle.record_failure("10.0.0.2");

        assert_eq!(throttle.evict_idle(Duration::from_secs(60)), 1);
        assert_eq!(throttle.failures("10.0.0.1"), 0);
        assert_eq!(throttle.failures("10.0.0.2"), 1);
    }

    #[test]
    fn test_concurrent_failures_are_all_counted() {
        let throttle = Arc::new(LoginThrottle::new(1000, LOCKOUT));

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let throttle = throttle.clone();
                std::thread::spawn(move || {
                    let mut crossed = 0;
                    for _ in 0..100 {
                        if throttle.record_failure("10.0.0.1") {
                            crossed += 1;
                        }
                    }
                    crossed
                })
            })
            .collect();

        let crossed: u32 = workers.into_iter().map(|w| w.join().unwrap()).sum();
        assert_eq!(throttle.failures("10.0.0.1"), 800);
        assert_eq!(crossed, 0);
    }
}
