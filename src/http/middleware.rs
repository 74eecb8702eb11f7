//! Gate middleware.
//!
//! # Data Flow
//! ```text
//! Request
//!     → client identifier (peer or trusted X-Forwarded-For)
//!     → Gatekeeper::precheck (banned / locked out, body never read)
//!     → buffer body (POST/PUT/PATCH, at most ceiling + 1 bytes)
//!     → authentication material (basic-auth wall, login form)
//!     → Gatekeeper::check
//!     → Reject: JSON error
//!     → Pass:   same bytes re-attached, next handler
//! ```

use axum::{
    body::{to_bytes, Body, Bytes},
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use http_body_util::LengthLimitError;
use std::net::SocketAddr;

use crate::gate::{Decision, GateRequest};
use crate::http::request::client_identifier;
use crate::http::response;
use crate::http::server::AppState;
use crate::security::inspector::carries_body;
use crate::security::Payload;

/// Marker extension on requests whose body matched an injection pattern.
#[derive(Debug, Clone, Copy)]
pub struct SuspiciousContent;

/// Client identifier, attached for downstream handlers.
#[derive(Debug, Clone)]
pub struct ClientId(pub String);

enum Buffered {
    /// Body left as a stream; not inspected.
    Untouched(Body),
    Complete(Bytes),
    Overflowed,
}

pub async fn gate_middleware(
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let identifier = client_identifier(peer, request.headers(), state.settings.trust_forwarded_for);

    if let Some(kind) = state.gate.precheck(&identifier) {
        tracing::warn!(
            client = %identifier,
            method = %request.method(),
            path = %request.uri().path(),
            reason = kind.as_str(),
            "Request rejected"
        );
        return response::rejection(kind, &state.settings.realm);
    }

    let (mut parts, body) = request.into_parts();

    let limit = state.gate.inspector().max_body_bytes();
    let buffered = if !carries_body(&parts.method) {
        Buffered::Untouched(body)
    } else if declared_length(&parts.headers).is_some_and(|len| len > limit as u64) {
        Buffered::Overflowed
    } else {
        match to_bytes(body, limit.saturating_add(1)).await {
            Ok(bytes) => Buffered::Complete(bytes),
            Err(e) if is_length_limit(&e) => Buffered::Overflowed,
            Err(e) => {
                tracing::debug!(client = %identifier, error = %e, "Failed to read request body");
                return response::bad_request();
            }
        }
    };

    let payload = match &buffered {
        Buffered::Untouched(_) => Payload::Complete(&[]),
        Buffered::Complete(bytes) => Payload::Complete(bytes),
        Buffered::Overflowed => Payload::Overflowed,
    };

    let authentication =
        state
            .settings
            .routes
            .authentication(&parts.method, parts.uri.path(), &parts.headers, payload);

    let decision = state
        .gate
        .check(GateRequest {
            identifier: &identifier,
            method: &parts.method,
            payload,
            authentication,
        })
        .await;

    match decision {
        Decision::Reject(kind) => {
            tracing::warn!(
                client = %identifier,
                method = %parts.method,
                path = %parts.uri.path(),
                reason = kind.as_str(),
                "Request rejected"
            );
            response::rejection(kind, &state.settings.realm)
        }
        Decision::Pass { flagged } => {
            if flagged {
                parts.extensions.insert(SuspiciousContent);
            }
            parts.extensions.insert(ClientId(identifier));

            let body = match buffered {
                Buffered::Untouched(body) => body,
                Buffered::Complete(bytes) => Body::from(bytes),
                // Overflowed bodies are always rejected by the inspector.
                Buffered::Overflowed => return response::bad_request(),
            };
            next.run(Request::from_parts(parts, body)).await
        }
    }
}

fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

fn is_length_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}
