//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GateConfig (validated, immutable)
//!     → each subsystem takes the section it needs at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::AuthConfig;
pub use schema::GateConfig;
pub use schema::InspectorConfig;
pub use schema::LockoutScope;
pub use schema::ObservabilityConfig;
pub use schema::StoreBackend;
pub use schema::StoreConfig;
pub use schema::VerifierKind;
