//! Pipeline outcomes.

use axum::http::StatusCode;

/// Why a request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectKind {
    Banned,
    LockedOut,
    RateLimited,
    PayloadTooLarge,
    /// No credentials were offered on a guarded route.
    AuthenticationRequired,
    /// Credentials were offered and did not verify.
    AuthenticationFailed,
}

impl RejectKind {
    pub fn status(&self) -> StatusCode {
        match self {
            RejectKind::Banned => StatusCode::FORBIDDEN,
            RejectKind::LockedOut | RejectKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            RejectKind::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            RejectKind::AuthenticationRequired | RejectKind::AuthenticationFailed => {
                StatusCode::UNAUTHORIZED
            }
        }
    }

    /// Client-facing message. Carries no internal state.
    pub fn message(&self) -> &'static str {
        match self {
            RejectKind::Banned => "Access denied",
            RejectKind::LockedOut => "Too many failed attempts, try again later",
            RejectKind::RateLimited => "Too many requests",
            RejectKind::PayloadTooLarge => "Request body too large",
            RejectKind::AuthenticationRequired => "Authentication required",
            RejectKind::AuthenticationFailed => "Invalid credentials",
        }
    }

    /// Metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectKind::Banned => "banned",
            RejectKind::LockedOut => "locked_out",
            RejectKind::RateLimited => "rate_limited",
            RejectKind::PayloadTooLarge => "payload_too_large",
            RejectKind::AuthenticationRequired => "authentication_required",
            RejectKind::AuthenticationFailed => "authentication_failed",
        }
    }

    /// Whether the response should carry a basic-auth challenge.
    pub fn challenges(&self) -> bool {
        matches!(
            self,
            RejectKind::AuthenticationRequired | RejectKind::AuthenticationFailed
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Let the request through. `flagged` marks suspicious content that was
    /// audited but not blocked.
    Pass { flagged: bool },
    Reject(RejectKind),
}

impl Decision {
    pub fn is_pass(&self) -> bool {
        matches!(self, Decision::Pass { .. })
    }
}
