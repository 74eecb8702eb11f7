//! Persistence collaborator.
//!
//! # Data Flow
//! ```text
//! BlacklistCache::refresh ──▶ fetch_banned ──┐
//! AuditWorker (audit job) ──▶ append_audit ──┼──▶ SecurityStore impl
//! admin ban / promotion   ──▶ persist_ban  ──┘      ├─ rest.rs   (remote database API)
//!                                                   └─ memory.rs (process-local)
//! ```
//!
//! # Design Decisions
//! - The gate never depends on a concrete backend, only on `SecurityStore`
//! - Store errors are values; callers log them and keep serving
//! - No store call is made while an in-memory lock is held

pub mod memory;
pub mod rest;

use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

use crate::security::audit::AuditRecord;

pub use memory::MemoryStore;
pub use rest::RestStore;

/// Errors surfaced by a persistence backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Network or protocol failure talking to the store.
    #[error("store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The store answered with a non-success status.
    #[error("store returned status {0}")]
    Status(u16),

    /// The call did not finish in time.
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    /// The store cannot be used at all.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Operations the access gate needs from durable storage.
#[async_trait]
pub trait SecurityStore: Send + Sync {
    /// Every identifier currently banned in storage.
    async fn fetch_banned(&self) -> StoreResult<HashSet<String>>;

    /// Append one audit record. The store stamps the creation time.
    async fn append_audit(&self, record: &AuditRecord) -> StoreResult<()>;

    /// Record a durable ban.
    async fn persist_ban(&self, identifier: &str, reason: &str) -> StoreResult<()>;
}
