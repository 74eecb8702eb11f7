//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Metrics → Store → Initial blacklist load → Background tasks → Listeners
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Audit worker drains queue → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - Every background task subscribes to the same broadcast
//! - Shutdown has a deadline: tasks that do not stop in time are abandoned

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
