//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs     (Axum setup, request ID, tracing, timeout)
//!     → request.rs    (request ID, client identifier)
//!     → middleware.rs (gate pipeline; reject or re-attach body)
//!     → forward.rs    (send to upstream application)
//!     → response.rs   (JSON error bodies)
//!     → Send to client
//! ```

pub mod forward;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use middleware::{ClientId, SuspiciousContent};
pub use request::X_REQUEST_ID;
pub use server::{AppState, GateServer};
