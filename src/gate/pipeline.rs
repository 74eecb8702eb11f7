//! The ordered decision chain.
//!
//! # Data Flow
//! ```text
//! GateRequest
//!     → blacklist       banned?                 → 403
//!     → throttle        locked? (all_requests)  → 429
//!     → inspector       too large?              → 413 + MASSIVE_PAYLOAD
//!                       suspicious?             → flag + XSS_ATTEMPT, continue
//!     → rate limiter    inside window?          → 429
//!     → authentication  locked? (auth_only)     → 429
//!                       missing                 → 401 challenge
//!                       wrong / malformed       → 401 + LOGIN_FAIL, count failure
//!                                                 threshold → LOCKED_OUT or IP_BANNED
//!     → Pass
//! ```
//!
//! # Design Decisions
//! - The pipeline holds no state of its own besides the guards and the order
//! - A verifier that cannot answer is not the client's fault: the attempt is
//!   refused but not counted toward lockout

use axum::http::Method;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::config::{GateConfig, LockoutScope};
use crate::gate::auth::{Authentication, CredentialVerifier, Credentials};
use crate::gate::decision::{Decision, RejectKind};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::security::eviction::Sweeper;
use crate::security::{
    AuditKind, AuditSink, AuditWorker, BlacklistCache, LoginThrottle, Payload, RateLimiter,
    RequestInspector, Verdict,
};
use crate::store::SecurityStore;

const LOCKOUT_BAN_REASON: &str = "Too many failed login attempts";

/// Everything the gate needs to know about one request.
#[derive(Debug)]
pub struct GateRequest<'a> {
    pub identifier: &'a str,
    pub method: &'a Method,
    pub payload: Payload<'a>,
    pub authentication: Authentication,
}

/// Result of an administrative ban.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BanOutcome {
    /// `false` if the identifier was already in the cache.
    pub newly_banned: bool,
    /// Whether the store accepted the ban.
    pub persisted: bool,
}

pub struct Gatekeeper {
    blacklist: Arc<BlacklistCache>,
    throttle: Arc<LoginThrottle>,
    limiter: Option<Arc<RateLimiter>>,
    inspector: RequestInspector,
    verifier: Arc<dyn CredentialVerifier>,
    store: Arc<dyn SecurityStore>,
    sink: AuditSink,
    lockout_scope: LockoutScope,
    promote_to_blacklist: bool,
}

impl Gatekeeper {
    /// Build the guards from configuration. The returned worker must be run
    /// for audit records and lockout bans to reach the store.
    pub fn from_config(
        config: &GateConfig,
        store: Arc<dyn SecurityStore>,
        verifier: Arc<dyn CredentialVerifier>,
    ) -> (Self, AuditWorker) {
        let (sink, worker) = AuditSink::channel(config.audit.queue_capacity, store.clone());

        let gate = Self {
            blacklist: Arc::new(BlacklistCache::new(
                store.clone(),
                config.blacklist.refresh_timeout(),
            )),
            throttle: Arc::new(LoginThrottle::new(
                config.throttle.max_attempts,
                config.throttle.lockout(),
            )),
            limiter: config
                .rate_limit
                .enabled
                .then(|| Arc::new(RateLimiter::new(config.rate_limit.window()))),
            inspector: RequestInspector::new(&config.inspector),
            verifier,
            store,
            sink,
            lockout_scope: config.throttle.lockout_scope,
            promote_to_blacklist: config.throttle.promote_to_blacklist,
        };
        (gate, worker)
    }

    /// Run the full chain for one request.
    pub async fn check(&self, request: GateRequest<'_>) -> Decision {
        let decision = self.evaluate(request).await;
        metrics::record_decision(match &decision {
            Decision::Pass { flagged: false } => "pass",
            Decision::Pass { flagged: true } => "pass_flagged",
            Decision::Reject(kind) => kind.as_str(),
        });
        decision
    }

    /// Identifier-only stages: blacklist, then lockout under `all_requests`.
    ///
    /// Needs nothing but the identifier, so callers run it before reading the
    /// request body. `check` repeats these stages.
    pub fn precheck(&self, identifier: &str) -> Option<RejectKind> {
        let kind = self.screen(identifier)?;
        metrics::record_decision(kind.as_str());
        Some(kind)
    }

    fn screen(&self, identifier: &str) -> Option<RejectKind> {
        if self.blacklist.is_banned(identifier) {
            tracing::warn!(identifier, "Rejected banned identifier");
            return Some(RejectKind::Banned);
        }

        if self.lockout_scope == LockoutScope::AllRequests && self.throttle.is_locked(identifier) {
            tracing::warn!(identifier, "Rejected locked-out identifier");
            return Some(RejectKind::LockedOut);
        }

        None
    }

    async fn evaluate(&self, request: GateRequest<'_>) -> Decision {
        let GateRequest {
            identifier,
            method,
            payload,
            authentication,
        } = request;

        if let Some(kind) = self.screen(identifier) {
            return Decision::Reject(kind);
        }

        let mut flagged = false;
        match self.inspector.inspect(method, payload) {
            Verdict::Pass => {}
            Verdict::RejectTooLarge => {
                let excerpt = match payload {
                    Payload::Complete(body) => format!("{} bytes", body.len()),
                    Payload::Overflowed => {
                        format!("more than {} bytes", self.inspector.max_body_bytes())
                    }
                };
                self.sink.record(identifier, AuditKind::MassivePayload, excerpt);
                return Decision::Reject(RejectKind::PayloadTooLarge);
            }
            Verdict::FlagSuspicious(excerpt) => {
                self.sink.record(identifier, AuditKind::XssAttempt, excerpt);
                flagged = true;
            }
        }

        if let Some(limiter) = &self.limiter {
            if !limiter.admit(identifier) {
                tracing::warn!(identifier, "Rate limit exceeded");
                return Decision::Reject(RejectKind::RateLimited);
            }
        }

        if authentication.is_attempt()
            && self.lockout_scope == LockoutScope::AuthOnly
            && self.throttle.is_locked(identifier)
        {
            tracing::warn!(identifier, "Rejected authentication attempt while locked out");
            return Decision::Reject(RejectKind::LockedOut);
        }

        match authentication {
            Authentication::NotRequired => Decision::Pass { flagged },
            Authentication::Missing => Decision::Reject(RejectKind::AuthenticationRequired),
            Authentication::Malformed => self.authentication_failed(identifier, ""),
            Authentication::Attempt(credentials) => {
                self.authenticate(identifier, &credentials, flagged).await
            }
        }
    }

    async fn authenticate(&self, identifier: &str, credentials: &Credentials, flagged: bool) -> Decision {
        match self.verifier.verify(credentials).await {
            Ok(true) => {
                self.throttle.record_success(identifier);
                tracing::info!(identifier, username = %credentials.username, "Authentication succeeded");
                Decision::Pass { flagged }
            }
            Ok(false) => self.authentication_failed(identifier, &credentials.username),
            Err(e) => {
                tracing::error!(identifier, error = %e, "Credential verifier unavailable");
                Decision::Reject(RejectKind::AuthenticationFailed)
            }
        }
    }

    fn authentication_failed(&self, identifier: &str, username: &str) -> Decision {
        self.sink.record(identifier, AuditKind::LoginFail, username);

        if self.throttle.record_failure(identifier) {
            if self.promote_to_blacklist {
                self.blacklist.ban(identifier, LOCKOUT_BAN_REASON);
                self.sink.persist_ban(identifier, LOCKOUT_BAN_REASON);
                self.sink.record(identifier, AuditKind::IpBanned, LOCKOUT_BAN_REASON);
            } else {
                self.sink.record(identifier, AuditKind::LockedOut, LOCKOUT_BAN_REASON);
            }
            metrics::record_locked(self.throttle.locked_count());
        }

        Decision::Reject(RejectKind::AuthenticationFailed)
    }

    /// Ban an identifier now: in memory first, then in the store.
    ///
    /// A store failure leaves the in-memory ban in place; calling this again
    /// retries the write.
    pub async fn ban_now(&self, identifier: &str, reason: &str) -> BanOutcome {
        let newly_banned = self.blacklist.ban(identifier, reason);
        if newly_banned {
            self.sink.record(identifier, AuditKind::IpBanned, reason);
        }

        let persisted = match self.store.persist_ban(identifier, reason).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(identifier, error = %e, "Ban persistence failed, ban is in memory only");
                false
            }
        };

        BanOutcome {
            newly_banned,
            persisted,
        }
    }

    /// Clear every runtime lockout. Returns how many identifiers were locked.
    pub fn unlock_all(&self) -> usize {
        let unlocked = self.throttle.unlock_all();
        metrics::record_locked(0);
        unlocked
    }

    pub fn locked_count(&self) -> usize {
        self.throttle.locked_count()
    }

    pub fn locked_identifiers(&self) -> Vec<String> {
        self.throttle.locked_identifiers()
    }

    pub fn blacklist(&self) -> &Arc<BlacklistCache> {
        &self.blacklist
    }

    pub fn throttle(&self) -> &Arc<LoginThrottle> {
        &self.throttle
    }

    pub fn inspector(&self) -> &RequestInspector {
        &self.inspector
    }

    /// Start the blacklist refresh and, if enabled, the eviction sweeper.
    pub fn spawn_background(self: &Arc<Self>, config: &GateConfig, shutdown: &Shutdown) -> Vec<JoinHandle<()>> {
        let mut handles = vec![self
            .blacklist
            .start_periodic_refresh(config.blacklist.refresh_interval(), shutdown.subscribe())];

        if config.eviction.enabled {
            let sweeper = Sweeper::new(
                self.throttle.clone(),
                self.limiter.clone(),
                config.eviction.sweep_interval(),
                config.eviction.idle_multiplier,
            );
            handles.push(tokio::spawn(sweeper.run(shutdown.subscribe())));
        } else {
            tracing::info!("Idle-entry eviction disabled");
        }

        handles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::auth::StaticCredentials;
    use crate::security::AuditRecord;
    use crate::store::MemoryStore;
    use std::time::Duration;
    use tokio::sync::broadcast;
    use tokio::time::advance;

    struct Harness {
        gate: Gatekeeper,
        worker: AuditWorker,
        store: Arc<MemoryStore>,
    }

    impl Harness {
        fn new(config: GateConfig) -> Self {
            let store = Arc::new(MemoryStore::new());
            let (gate, worker) = Gatekeeper::from_config(
                &config,
                store.clone(),
                Arc::new(StaticCredentials::new("admin", "pw")),
            );
            Self { gate, worker, store }
        }

        /// Stop the worker after it has written everything queued so far.
        async fn flush(self) -> Vec<AuditRecord> {
            let (tx, rx) = broadcast::channel(1);
            tx.send(()).unwrap();
            self.worker.run(rx).await;
            self.store.audit_records()
        }
    }

    fn config_without_rate_limit() -> GateConfig {
        let mut config = GateConfig::default();
        config.rate_limit.enabled = false;
        config
    }

    fn login(username: &str, password: &str) -> Authentication {
        Authentication::Attempt(Credentials {
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    async fn attempt(gate: &Gatekeeper, identifier: &str, authentication: Authentication) -> Decision {
        gate.check(GateRequest {
            identifier,
            method: &Method::POST,
            payload: Payload::Complete(b""),
            authentication,
        })
        .await
    }

    async fn get(gate: &Gatekeeper, identifier: &str) -> Decision {
        gate.check(GateRequest {
            identifier,
            method: &Method::GET,
            payload: Payload::Complete(b""),
            authentication: Authentication::NotRequired,
        })
        .await
    }

    #[tokio::test(start_paused = true)]
    async fn test_lockout_after_five_failures_then_amnesty() {
        let harness = Harness::new(config_without_rate_limit());
        let gate = &harness.gate;

        for _ in 0..5 {
            assert_eq!(
                attempt(gate, "10.0.0.1", login("admin", "wrong")).await,
                Decision::Reject(RejectKind::AuthenticationFailed)
            );
            advance(Duration::from_millis(150)).await;
        }

        // Sixth request, any method, is refused before credentials are read.
        assert_eq!(get(gate, "10.0.0.1").await, Decision::Reject(RejectKind::LockedOut));
        assert_eq!(
            attempt(gate, "10.0.0.1", login("admin", "pw")).await,
            Decision::Reject(RejectKind::LockedOut)
        );
        assert_eq!(gate.locked_identifiers(), vec!["10.0.0.1".to_string()]);

        advance(Duration::from_secs(16 * 60)).await;

        assert_eq!(
            attempt(gate, "10.0.0.1", login("admin", "wrong")).await,
            Decision::Reject(RejectKind::AuthenticationFailed)
        );
        assert_eq!(gate.throttle().failures("10.0.0.1"), 1);
        assert!(!gate.blacklist().is_banned("10.0.0.1"));

        let records = harness.flush().await;
        let kinds: Vec<AuditKind> = records.iter().map(|r| r.kind).collect();
        assert_eq!(kinds.iter().filter(|k| **k == AuditKind::LoginFail).count(), 6);
        assert_eq!(kinds.iter().filter(|k| **k == AuditKind::LockedOut).count(), 1);
        assert_eq!(records[0].excerpt, "admin");
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_login_clears_failures() {
        let harness = Harness::new(config_without_rate_limit());
        let gate = &harness.gate;

        for _ in 0..4 {
            attempt(gate, "10.0.0.1", login("admin", "wrong")).await;
        }
        assert_eq!(
            attempt(gate, "10.0.0.1", login("admin", "pw")).await,
            Decision::Pass { flagged: false }
        );
        assert_eq!(gate.throttle().failures("10.0.0.1"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_promotion_bans_and_persists() {
        let mut config = config_without_rate_limit();
        config.throttle.promote_to_blacklist = true;
        let harness = Harness::new(config);
        let gate = &harness.gate;

        for _ in 0..5 {
            attempt(gate, "10.0.0.1", login("admin", "wrong")).await;
        }
        assert!(gate.blacklist().is_banned("10.0.0.1"));

        advance(Duration::from_secs(16 * 60)).await;
        assert_eq!(get(gate, "10.0.0.1").await, Decision::Reject(RejectKind::Banned));

        let store = harness.store.clone();
        let records = harness.flush().await;
        assert!(records.iter().any(|r| r.kind == AuditKind::IpBanned));
        assert!(store.persisted_bans().contains_key("10.0.0.1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_only_scope_lets_plain_requests_through() {
        let mut config = config_without_rate_limit();
        config.throttle.lockout_scope = LockoutScope::AuthOnly;
        let harness = Harness::new(config);
        let gate = &harness.gate;

        for _ in 0..5 {
            attempt(gate, "10.0.0.1", login("admin", "wrong")).await;
        }

        assert_eq!(get(gate, "10.0.0.1").await, Decision::Pass { flagged: false });
        assert_eq!(
            attempt(gate, "10.0.0.1", login("admin", "pw")).await,
            Decision::Reject(RejectKind::LockedOut)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_window() {
        let harness = Harness::new(GateConfig::default());
        let gate = &harness.gate;

        assert!(get(gate, "10.0.0.2").await.is_pass());
        advance(Duration::from_millis(200)).await;
        assert_eq!(get(gate, "10.0.0.2").await, Decision::Reject(RejectKind::RateLimited));
        advance(Duration::from_millis(900)).await;
        assert!(get(gate, "10.0.0.2").await.is_pass());
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected_and_audited() {
        let harness = Harness::new(GateConfig::default());
        let body = vec![b'a'; 2 * 1024 * 1024 + 1];

        let decision = harness
            .gate
            .check(GateRequest {
                identifier: "10.0.0.3",
                method: &Method::POST,
                payload: Payload::Complete(&body),
                authentication: Authentication::NotRequired,
            })
            .await;
        assert_eq!(decision, Decision::Reject(RejectKind::PayloadTooLarge));

        let records = harness.flush().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, AuditKind::MassivePayload);
    }

    #[tokio::test]
    async fn test_script_body_is_flagged_and_passed() {
        let harness = Harness::new(GateConfig::default());

        let decision = harness
            .gate
            .check(GateRequest {
                identifier: "10.0.0.4",
                method: &Method::POST,
                payload: Payload::Complete(b"comment=<script>alert(1)</script>"),
                authentication: Authentication::NotRequired,
            })
            .await;
        assert_eq!(decision, Decision::Pass { flagged: true });

        let records = harness.flush().await;
        assert_eq!(records[0].kind, AuditKind::XssAttempt);
    }

    #[tokio::test]
    async fn test_banned_identifier_is_rejected_first() {
        let harness = Harness::new(GateConfig::default());
        let outcome = harness.gate.ban_now("10.0.0.5", "manual").await;
        assert!(outcome.newly_banned);
        assert!(outcome.persisted);

        let body = vec![b'a'; 3 * 1024 * 1024];
        let decision = harness
            .gate
            .check(GateRequest {
                identifier: "10.0.0.5",
                method: &Method::POST,
                payload: Payload::Complete(&body),
                authentication: Authentication::NotRequired,
            })
            .await;
        assert_eq!(decision, Decision::Reject(RejectKind::Banned));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_refuses_rapid_retries_before_they_count() {
        let harness = Harness::new(GateConfig::default());

        let decision = attempt(&harness.gate, "10.0.1.4", login("admin", "wrong")).await;
        assert_eq!(decision, Decision::Reject(RejectKind::AuthenticationFailed));
        for _ in 0..4 {
            let decision = attempt(&harness.gate, "10.0.1.4", login("admin", "wrong")).await;
            assert_eq!(decision, Decision::Reject(RejectKind::RateLimited));
        }
        assert_eq!(harness.gate.throttle().failures("10.0.1.4"), 1);

        for _ in 0..4 {
            advance(Duration::from_secs(1)).await;
            attempt(&harness.gate, "10.0.1.4", login("admin", "wrong")).await;
        }
        assert!(harness.gate.throttle().is_locked("10.0.1.4"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_precheck_covers_ban_and_lockout_scope() {
        let harness = Harness::new(config_without_rate_limit());
        assert_eq!(harness.gate.precheck("10.0.1.1"), None);

        harness.gate.ban_now("10.0.1.1", "manual").await;
        assert_eq!(harness.gate.precheck("10.0.1.1"), Some(RejectKind::Banned));

        for _ in 0..5 {
            attempt(&harness.gate, "10.0.1.2", login("admin", "wrong")).await;
        }
        assert_eq!(harness.gate.precheck("10.0.1.2"), Some(RejectKind::LockedOut));

        let mut config = config_without_rate_limit();
        config.throttle.lockout_scope = LockoutScope::AuthOnly;
        let auth_only = Harness::new(config);
        for _ in 0..5 {
            attempt(&auth_only.gate, "10.0.1.3", login("admin", "wrong")).await;
        }
        assert!(auth_only.gate.throttle().is_locked("10.0.1.3"));
        assert_eq!(auth_only.gate.precheck("10.0.1.3"), None);
    }

    #[tokio::test]
    async fn test_ban_survives_store_failure() {
        let harness = Harness::new(GateConfig::default());
        harness.store.set_unavailable(true);

        let outcome = harness.gate.ban_now("10.0.0.6", "manual").await;
        assert!(outcome.newly_banned);
        assert!(!outcome.persisted);
        assert!(harness.gate.blacklist().is_banned("10.0.0.6"));

        harness.store.set_unavailable(false);
        let retry = harness.gate.ban_now("10.0.0.6", "manual").await;
        assert!(!retry.newly_banned);
        assert!(retry.persisted);
    }

    #[tokio::test]
    async fn test_missing_credentials_are_not_counted() {
        let harness = Harness::new(config_without_rate_limit());

        let decision = attempt(&harness.gate, "10.0.0.7", Authentication::Missing).await;
        assert_eq!(decision, Decision::Reject(RejectKind::AuthenticationRequired));
        assert_eq!(harness.gate.throttle().failures("10.0.0.7"), 0);

        let decision = attempt(&harness.gate, "10.0.0.7", Authentication::Malformed).await;
        assert_eq!(decision, Decision::Reject(RejectKind::AuthenticationFailed));
        assert_eq!(harness.gate.throttle().failures("10.0.0.7"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unlock_all() {
        let harness = Harness::new(config_without_rate_limit());
        for id in ["10.0.0.8", "10.0.0.9"] {
            for _ in 0..5 {
                attempt(&harness.gate, id, login("admin", "wrong")).await;
            }
        }

        assert_eq!(harness.gate.locked_count(), 2);
        assert_eq!(harness.gate.unlock_all(), 2);
        assert_eq!(get(&harness.gate, "10.0.0.8").await, Decision::Pass { flagged: false });
    }
}
