//! Security subsystem: the guards the gate pipeline is built from.
//!
//! # Data Flow
//! ```text
//! Incoming request (via gate::Gatekeeper):
//!     → blacklist.rs  (banned identifiers, refreshed from the store)
//!     → throttle.rs   (login-failure lockouts)
//!     → inspector.rs  (body size ceiling, script-injection patterns)
//!     → rate_limit.rs (one admitted request per window)
//!
//! Findings:
//!     → audit.rs (bounded queue → background worker → store)
//!
//! Background:
//!     → eviction.rs (drops idle throttle and rate entries)
//! ```
//!
//! # Design Decisions
//! - Each table owns its own lock; no guard ever waits on another
//! - No guard performs I/O on the request path
//! - Fail closed on policy, fail open on collaborator errors

pub mod audit;
pub mod blacklist;
pub mod eviction;
pub mod inspector;
pub mod rate_limit;
pub mod throttle;

pub use audit::{AuditKind, AuditRecord, AuditSink, AuditWorker};
pub use blacklist::{BanOrigin, BanRecord, BlacklistCache};
pub use inspector::{Payload, RequestInspector, Verdict};
pub use rate_limit::RateLimiter;
pub use throttle::{LoginThrottle, ThrottleState};
