//! Upstream forwarding for admitted requests.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{
        header,
        uri::{Authority, Scheme},
        HeaderName, HeaderValue, Request, Uri,
    },
    response::Response,
};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Instant;

use crate::http::request::{X_FORWARDED_FOR, X_REQUEST_ID};
use crate::http::response;
use crate::http::server::AppState;
use crate::observability::metrics;

const HOP_BY_HOP: [HeaderName; 4] = [
    header::CONNECTION,
    header::TE,
    header::TRAILER,
    header::UPGRADE,
];

/// Send the request, with the body the gate re-attached, to the upstream.
pub async fn forward_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let (mut parts, body) = request.into_parts();

    let request_id = parts
        .headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = match Authority::from_str(&state.upstream) {
        Ok(authority) => Some(authority),
        Err(e) => {
            tracing::error!(upstream = %state.upstream, error = %e, "Invalid upstream address");
            return response::bad_gateway();
        }
    };
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(axum::http::uri::PathAndQuery::from_static("/"));
    }
    parts.uri = match Uri::from_parts(uri_parts) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Failed to build upstream URI");
            return response::bad_gateway();
        }
    };

    for name in HOP_BY_HOP.iter() {
        parts.headers.remove(name);
    }
    let forwarded_for = match parts.headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(existing) => format!("{}, {}", existing, peer.ip()),
        None => peer.ip().to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
        parts.headers.insert(X_FORWARDED_FOR, value);
    }

    let request = Request::from_parts(parts, body);
    match state.client.request(request).await {
        Ok(upstream_response) => {
            let status = upstream_response.status();
            metrics::record_upstream(status.as_u16(), start);
            tracing::debug!(request_id = %request_id, status = %status, "Upstream responded");

            let (parts, body) = upstream_response.into_parts();
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            metrics::record_upstream(502, start);
            tracing::error!(request_id = %request_id, error = %e, "Upstream error");
            response::bad_gateway()
        }
    }
}
