//! Idle-entry sweeping for the per-identifier tables.
//!
//! # Responsibilities
//! - Periodically drop throttle records untouched for `idle_multiplier`
//!   lockout durations
//! - Periodically drop rate-window records untouched for `idle_multiplier`
//!   windows
//! - Publish the locked-identifier gauge

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::observability::metrics;
use crate::security::rate_limit::RateLimiter;
use crate::security::throttle::LoginThrottle;

pub struct Sweeper {
    throttle: Arc<LoginThrottle>,
    limiter: Option<Arc<RateLimiter>>,
    interval: Duration,
    idle_multiplier: u32,
}

impl Sweeper {
    pub fn new(
        throttle: Arc<LoginThrottle>,
        limiter: Option<Arc<RateLimiter>>,
        interval: Duration,
        idle_multiplier: u32,
    ) -> Self {
        Self {
            throttle,
            limiter,
            interval,
            idle_multiplier: idle_multiplier.max(1),
        }
    }

    /// One pass over both tables. Returns the number of evicted entries.
    pub fn sweep(&self) -> usize {
        let throttle_evicted = self
            .throttle
            .evict_idle(self.throttle.lockout().saturating_mul(self.idle_multiplier));
        let rate_evicted = self
            .limiter
            .as_ref()
            .map(|limiter| limiter.evict_idle(limiter.window().saturating_mul(self.idle_multiplier)))
            .unwrap_or(0);

        metrics::record_locked(self.throttle.locked_count());

        if throttle_evicted + rate_evicted > 0 {
            tracing::debug!(throttle_evicted, rate_evicted, "Evicted idle entries");
        }
        throttle_evicted + rate_evicted
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval = ?self.interval,
            idle_multiplier = self.idle_multiplier,
            "Eviction sweeper starting"
        );

        let start = Instant::now().checked_add(self.interval).unwrap_or_else(Instant::now);
        let mut ticker = time::interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep();
                }
                _ = shutdown.recv() => {
                    tracing::info!("Eviction sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    #[tokio::test(start_paused = true)]
    async fn test_sweep_uses_multiplier() {
        let throttle = Arc::new(LoginThrottle::new(5, Duration::from_secs(60)));
        let limiter = Arc::new(RateLimiter::new(Duration::from_secs(1)));
        let sweeper = Sweeper::new(throttle.clone(), Some(limiter.clone()), Duration::from_secs(30), 4);

        throttle.record_failure("10.0.0.1");
        limiter.admit("10.0.0.1");

        advance(Duration::from_secs(5)).await;
        assert_eq!(sweeper.sweep(), 1);
        assert_eq!(limiter.len(), 0);
        assert_eq!(throttle.len(), 1);

        advance(Duration::from_secs(240)).await;
        assert_eq!(sweeper.sweep(), 1);
        assert!(throttle.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_saturates_huge_idle_limit() {
        let throttle = Arc::new(LoginThrottle::new(5, Duration::from_secs(u64::MAX / 2)));
        let limiter = Arc::new(RateLimiter::new(Duration::from_secs(u64::MAX / 2)));
        let sweeper = Sweeper::new(throttle.clone(), Some(limiter.clone()), Duration::from_secs(30), u32::MAX);

        throttle.record_failure("10.0.0.1");
        limiter.admit("10.0.0.1");
        advance(Duration::from_secs(3600)).await;

        assert_eq!(sweeper.sweep(), 0);
        assert_eq!(throttle.len(), 1);
        assert_eq!(limiter.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_sweeps_until_shutdown() {
        let throttle = Arc::new(LoginThrottle::new(5, Duration::from_secs(1)));
        let sweeper = Sweeper::new(throttle.clone(), None, Duration::from_secs(10), 2);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        throttle.record_failure("10.0.0.1");
        let handle = tokio::spawn(sweeper.run(shutdown_rx));

        time::sleep(Duration::from_secs(11)).await;
        assert!(throttle.is_empty());

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
