//! Adaptive access gate for an admin panel.
//!
//! Every request passes an ordered chain of guards (blacklist, login-failure
//! lockout, body inspection, rate limit, authentication) before it is
//! forwarded to the application behind the gate.

pub mod admin;
pub mod config;
pub mod gate;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;
pub mod store;

pub use config::schema::GateConfig;
pub use gate::Gatekeeper;
pub use http::GateServer;
pub use lifecycle::Shutdown;
