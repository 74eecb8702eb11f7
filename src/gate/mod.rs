//! Gate pipeline: one decision per inbound request.
//!
//! # Data Flow
//! ```text
//! http::middleware
//!     → auth.rs     (what the request offers for authentication)
//!     → pipeline.rs (blacklist → lockout → inspector → rate → authentication)
//!     → decision.rs (Pass / Reject(kind) → status code)
//! ```

pub mod auth;
pub mod decision;
pub mod pipeline;

pub use auth::{AuthRoutes, Authentication, CredentialVerifier, Credentials, StaticCredentials};
pub use decision::{Decision, RejectKind};
pub use pipeline::{BanOutcome, GateRequest, Gatekeeper};
