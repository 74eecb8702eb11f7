//! Process-local store.
//!
//! Used when no remote backend is configured, and by tests, which can switch
//! it into an unreachable state to exercise the degraded paths.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::security::audit::AuditRecord;
use crate::store::{SecurityStore, StoreError, StoreResult};

#[derive(Debug, Default)]
pub struct MemoryStore {
    bans: Mutex<HashMap<String, String>>,
    audit: Mutex<Vec<AuditRecord>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds the given bans.
    pub fn with_bans<I, S>(identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        {
            let mut bans = store.bans.lock().unwrap_or_else(PoisonError::into_inner);
            for identifier in identifiers {
                bans.insert(identifier.into(), "seeded".to_string());
            }
        }
        store
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Snapshot of the audit records written so far.
    pub fn audit_records(&self) -> Vec<AuditRecord> {
        self.audit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Snapshot of persisted bans: identifier -> reason.
    pub fn persisted_bans(&self) -> HashMap<String, String> {
        self.bans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn ensure_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store switched off".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SecurityStore for MemoryStore {
    async fn fetch_banned(&self) -> StoreResult<HashSet<String>> {
        self.ensure_available()?;
        let bans = self.bans.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(bans.keys().cloned().collect())
    }

    async fn append_audit(&self, record: &AuditRecord) -> StoreResult<()> {
        self.ensure_available()?;
        self.audit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }

    async fn persist_ban(&self, identifier: &str, reason: &str) -> StoreResult<()> {
        self.ensure_available()?;
        self.bans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(identifier.to_string(), reason.to_string());
        Ok(())
    }
}
