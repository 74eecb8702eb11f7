//! Shared utilities for integration testing.

#![allow(dead_code)]

use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, DefaultBodyLimit},
    http::{HeaderMap, Request},
    response::Response,
    Router,
};
use gatekeeper::admin::{setup_admin_router, AdminState};
use gatekeeper::gate::StaticCredentials;
use gatekeeper::security::{AuditKind, AuditRecord};
use gatekeeper::store::MemoryStore;
use gatekeeper::{GateConfig, GateServer, Gatekeeper, Shutdown};
use http_body_util::BodyExt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceExt;

pub const ADMIN_KEY: &str = "test-admin-key";
pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "correct horse";

/// Start an upstream that answers every request with the body it received.
///
/// The `x-forwarded-for` header it saw is echoed back as `x-seen-forwarded-for`.
pub async fn start_echo_upstream() -> SocketAddr {
    let app = Router::new()
        .fallback(echo)
        .layer(DefaultBodyLimit::disable());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn echo(headers: HeaderMap, body: Bytes) -> Response {
    let mut response = Response::new(Body::from(body));
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        response
            .headers_mut()
            .insert("x-seen-forwarded-for", forwarded.clone());
    }
    response
}

/// An address nothing listens on.
pub async fn dead_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub fn test_config(upstream: SocketAddr) -> GateConfig {
    let mut config = GateConfig::default();
    config.upstream.address = upstream.to_string();
    config.auth.username = USERNAME.to_string();
    config.auth.password = PASSWORD.to_string();
    config.admin.enabled = true;
    config.admin.api_key = ADMIN_KEY.to_string();
    config
}

pub struct TestGate {
    pub router: Router,
    pub admin: Router,
    pub gate: Arc<Gatekeeper>,
    pub store: Arc<MemoryStore>,
    pub shutdown: Shutdown,
}

/// Build the gate against a fresh memory store with its audit worker running.
pub fn spawn_gate(config: GateConfig) -> TestGate {
    spawn_gate_with_store(config, Arc::new(MemoryStore::new()))
}

pub fn spawn_gate_with_store(config: GateConfig, store: Arc<MemoryStore>) -> TestGate {
    let verifier = Arc::new(StaticCredentials::from_config(&config.auth));
    let (gate, worker) = Gatekeeper::from_config(&config, store.clone(), verifier);
    let gate = Arc::new(gate);

    let shutdown = Shutdown::new();
    tokio::spawn(worker.run(shutdown.subscribe()));

    let router = GateServer::new(&config, gate.clone()).router();
    let admin = setup_admin_router(AdminState {
        gate: gate.clone(),
        api_key: Arc::from(config.admin.api_key.as_str()),
    });

    TestGate {
        router,
        admin,
        gate,
        store,
        shutdown,
    }
}

/// Drive `router` with a request arriving from `peer_ip`.
pub async fn send(router: &Router, peer_ip: &str, mut request: Request<Body>) -> Response {
    let peer: SocketAddr = format!("{}:40000", peer_ip).parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(peer));
    router.clone().oneshot(request).await.unwrap()
}

pub fn get(path: &str) -> Request<Body> {
    Request::builder().uri(path).body(Body::empty()).unwrap()
}

pub fn post(path: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .body(body.into())
        .unwrap()
}

pub fn admin_request(method: &str, path: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(path)
        .header("authorization", format!("Bearer {}", ADMIN_KEY))
        .body(Body::empty())
        .unwrap()
}

pub async fn body_bytes(response: Response) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Wait until the audit worker has written a record of `kind` for `identifier`.
pub async fn wait_for_audit(store: &MemoryStore, identifier: &str, kind: AuditKind) -> AuditRecord {
    for _ in 0..200 {
        if let Some(record) = store
            .audit_records()
            .into_iter()
            .find(|r| r.identifier == identifier && r.kind == kind)
        {
            return record;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("no {} audit record for {}", kind, identifier);
}
