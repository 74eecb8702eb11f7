//! Client-facing error responses.
//!
//! Every refusal is `{"error": "..."}` with a status per cause. Messages are
//! fixed strings; nothing about internal state is echoed back.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::gate::RejectKind;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
}

pub fn error_response(status: StatusCode, message: &'static str) -> Response {
    (status, Json(ErrorBody { error: message })).into_response()
}

/// Response for a pipeline rejection. Authentication failures carry a basic
/// challenge for `realm`.
pub fn rejection(kind: RejectKind, realm: &str) -> Response {
    let mut response = error_response(kind.status(), kind.message());
    if kind.challenges() {
        if let Ok(value) = HeaderValue::from_str(&format!("Basic realm=\"{}\"", realm)) {
            response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
        }
    }
    response
}

pub fn bad_request() -> Response {
    error_response(StatusCode::BAD_REQUEST, "Malformed request")
}

pub fn bad_gateway() -> Response {
    error_response(StatusCode::BAD_GATEWAY, "Upstream request failed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_rejection_body_and_challenge() {
        let response = rejection(RejectKind::AuthenticationFailed, "Restricted");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Basic realm=\"Restricted\""
        );

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Invalid credentials");
    }

    #[test]
    fn test_lockout_has_no_challenge() {
        let response = rejection(RejectKind::LockedOut, "Restricted");
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());
    }
}
