//! Blacklist cache.
//!
//! Process-wide set of banned identifiers. Reads take a shared lock and never
//! touch the network; `refresh` does its I/O first and only then takes the
//! write lock to merge the result.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::observability::metrics;
use crate::store::{SecurityStore, StoreError};

/// Where a ban came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BanOrigin {
    /// Loaded from (or confirmed by) the store.
    Persistent,
    /// Issued by this process and not yet seen in the store.
    Runtime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BanRecord {
    pub identifier: String,
    pub reason: String,
    pub origin: BanOrigin,
}

const PERSISTED_REASON: &str = "persisted ban";

/// Cache of banned identifiers backed by the store.
pub struct BlacklistCache {
    entries: RwLock<HashMap<String, BanRecord>>,
    store: Arc<dyn SecurityStore>,
    refresh_timeout: Duration,
}

impl BlacklistCache {
    pub fn new(store: Arc<dyn SecurityStore>, refresh_timeout: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            store,
            refresh_timeout,
        }
    }

    /// Point-in-time membership check.
    pub fn is_banned(&self, identifier: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(identifier)
    }

    /// Ban an identifier for the rest of the process lifetime.
    ///
    /// Returns `false` when it was already banned; the existing record is kept.
    pub fn ban(&self, identifier: &str, reason: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(identifier) {
            return false;
        }
        entries.insert(
            identifier.to_string(),
            BanRecord {
                identifier: identifier.to_string(),
                reason: reason.to_string(),
                origin: BanOrigin::Runtime,
            },
        );
        metrics::record_blacklist_size(entries.len());
        drop(entries);

        tracing::warn!(identifier, reason, "Identifier banned");
        true
    }

    /// Pull the persisted ban list and merge it in.
    ///
    /// Persistent entries are replaced by the fetched set; runtime bans are
    /// kept. On failure the cache is left exactly as it was.
    pub async fn refresh(&self) -> Result<usize, StoreError> {
        let fetched = match time::timeout(self.refresh_timeout, self.store.fetch_banned()).await {
            Ok(Ok(fetched)) => fetched,
            Ok(Err(e)) => {
                metrics::record_refresh("error");
                return Err(e);
            }
            Err(_) => {
                metrics::record_refresh("timeout");
                return Err(StoreError::Timeout(self.refresh_timeout));
            }
        };

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|_, record| record.origin == BanOrigin::Runtime);
        for identifier in &fetched {
            entries
                .entry(identifier.clone())
                .and_modify(|record| record.origin = BanOrigin::Persistent)
                .or_insert_with(|| BanRecord {
                    identifier: identifier.clone(),
                    reason: PERSISTED_REASON.to_string(),
                    origin: BanOrigin::Persistent,
                });
        }
        let total = entries.len();
        drop(entries);

        metrics::record_refresh("ok");
        metrics::record_blacklist_size(total);
        tracing::info!(persisted = fetched.len(), total, "Blacklist refreshed");
        Ok(fetched.len())
    }

    /// Re-run `refresh` every `interval` until shutdown.
    pub fn start_periodic_refresh(
        self: &Arc<Self>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let start = Instant::now().checked_add(interval).unwrap_or_else(Instant::now);
            let mut ticker = time::interval_at(start, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::info!(interval = ?interval, "Blacklist refresh starting");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = cache.refresh().await {
                            tracing::warn!(error = %e, "Blacklist refresh failed, keeping last loaded set");
                        }
                    }
                    _ = shutdown.recv() => {
                        tracing::info!("Blacklist refresh received shutdown signal, exiting loop");
                        break;
                    }
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All current bans, ordered by identifier.
    pub fn snapshot(&self) -> Vec<BanRecord> {
        let mut records: Vec<BanRecord> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        records.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        records
    }
}
