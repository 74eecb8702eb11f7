//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gate.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the access gate.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GateConfig {
    /// Public listener (the gated traffic).
    pub listener: ListenerConfig,

    /// Application the gate forwards admitted requests to.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Blacklist cache refresh settings.
    pub blacklist: BlacklistConfig,

    /// Login-failure throttle settings.
    pub throttle: ThrottleConfig,

    /// Per-client fixed-window rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Request body inspection.
    pub inspector: InspectorConfig,

    /// Which requests are authentication attempts and how they are verified.
    pub auth: AuthConfig,

    /// Background audit queue.
    pub audit: AuditConfig,

    /// Idle-entry sweeping for the per-client tables.
    pub eviction: EvictionConfig,

    /// Persistence collaborator for bans and audit records.
    pub store: StoreConfig,

    pub admin: AdminConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Take the client identifier from the left-most `X-Forwarded-For`
    /// entry instead of the peer address. Only safe behind a trusted proxy.
    pub trust_forwarded_for: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            trust_forwarded_for: false,
        }
    }
}

/// Upstream application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream address (e.g., "127.0.0.1:3000").
    pub address: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3000".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Blacklist cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BlacklistConfig {
    /// How often the cache is re-pulled from the store, in seconds.
    pub refresh_interval_secs: u64,

    /// Upper bound on a single fetch from the store, in seconds.
    pub refresh_timeout_secs: u64,
}

impl BlacklistConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_secs)
    }
}

impl Default for BlacklistConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 600,
            refresh_timeout_secs: 10,
        }
    }
}

/// Which requests a locked-out client is denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LockoutScope {
    /// Every request from a locked identifier is rejected.
    #[default]
    AllRequests,
    /// Only authentication attempts are rejected.
    AuthOnly,
}

/// Login-failure throttle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Failures before an identifier is locked out.
    pub max_attempts: u32,

    /// Lockout length in seconds, measured from the last failure.
    pub lockout_secs: u64,

    pub lockout_scope: LockoutScope,

    /// Turn a lockout into a durable ban (blacklist + store) instead of
    /// letting it expire.
    pub promote_to_blacklist: bool,
}

impl ThrottleConfig {
    pub fn lockout(&self) -> Duration {
        Duration::from_secs(self.lockout_secs)
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lockout_secs: 15 * 60,
            lockout_scope: LockoutScope::AllRequests,
            promote_to_blacklist: false,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Minimum spacing between admitted requests per client, in milliseconds.
    pub window_ms: u64,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_ms: 1000,
        }
    }
}

/// Request inspector configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InspectorConfig {
    /// Maximum body size in bytes; larger bodies are rejected.
    pub max_body_bytes: usize,

    /// Substrings that flag a body as a script-injection attempt
    /// (ASCII case-insensitive).
    pub patterns: Vec<String>,

    /// Length of the body excerpt attached to audit records, in characters.
    pub excerpt_chars: usize,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 2 * 1024 * 1024, // 2MB
            patterns: vec!["<script".to_string(), "javascript:".to_string()],
            excerpt_chars: 256,
        }
    }
}

/// Where credentials are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VerifierKind {
    /// Compare against `auth.username` / `auth.password`.
    #[default]
    Static,
    /// Password grant against the remote store's auth endpoint.
    Store,
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Path prefixes guarded by the HTTP basic-auth wall.
    pub basic_auth_paths: Vec<String>,

    /// Path of the login form (POST, urlencoded `email` + `password`).
    pub login_path: String,

    /// Realm announced in `WWW-Authenticate`.
    pub realm: String,

    pub verifier: VerifierKind,

    pub username: String,

    pub password: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            basic_auth_paths: vec!["/admin".to_string()],
            login_path: "/login".to_string(),
            realm: "Restricted".to_string(),
            verifier: VerifierKind::Static,
            username: "admin".to_string(),
            // WARNING: This is a placeholder! Change this in production.
            password: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}

/// Audit sink configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Jobs buffered for the audit worker before new ones are dropped.
    pub queue_capacity: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
        }
    }
}

/// Idle-entry eviction for the throttle and rate tables.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EvictionConfig {
    pub enabled: bool,

    /// Sweep interval in seconds.
    pub sweep_interval_secs: u64,

    /// An entry is evicted once untouched for this many lockout durations
    /// (throttle) or windows (rate limiter).
    pub idle_multiplier: u32,
}

impl EvictionConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sweep_interval_secs: 300,
            idle_multiplier: 4,
        }
    }
}

/// Persistence backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Process-local store; bans do not survive a restart.
    #[default]
    Memory,
    /// PostgREST-style remote database API.
    Rest,
}

/// Persistence collaborator configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// Base URL of the remote API (e.g., "https://project.example.co").
    pub url: String,

    /// API key sent as `apikey` and bearer token.
    pub api_key: String,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            url: String::new(),
            api_key: String::new(),
            timeout_secs: 10,
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
