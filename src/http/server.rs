//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router: every path goes through the gate, then upstream
//! - Wire up middleware (request ID, tracing, timeout)
//! - Serve until the shutdown signal, with client addresses attached

use axum::{body::Body, middleware, routing::any, Router};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::GateConfig;
use crate::gate::{AuthRoutes, Gatekeeper};
use crate::http::forward::forward_handler;
use crate::http::middleware::gate_middleware;
use crate::http::request::{make_span, request_id_header, MakeRequestUuid};

/// Per-listener settings the middleware reads on every request.
#[derive(Debug)]
pub struct GateSettings {
    pub routes: AuthRoutes,
    pub realm: String,
    pub trust_forwarded_for: bool,
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<Gatekeeper>,
    pub settings: Arc<GateSettings>,
    pub client: Client<HttpConnector, Body>,
    pub upstream: Arc<str>,
}

/// Public listener: the gate in front of the upstream application.
pub struct GateServer {
    router: Router,
}

impl GateServer {
    pub fn new(config: &GateConfig, gate: Arc<Gatekeeper>) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        let state = AppState {
            gate,
            settings: Arc::new(GateSettings {
                routes: AuthRoutes::from_config(&config.auth),
                realm: config.auth.realm.clone(),
                trust_forwarded_for: config.listener.trust_forwarded_for,
            }),
            client,
            upstream: Arc::from(config.upstream.address.as_str()),
        };

        Self {
            router: Self::build_router(config, state),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GateConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(forward_handler))
            .route("/", any(forward_handler))
            .layer(middleware::from_fn_with_state(state.clone(), gate_middleware))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(request_id_header(), MakeRequestUuid))
                    .layer(TraceLayer::new_for_http().make_span_with(make_span))
                    .layer(PropagateRequestIdLayer::new(request_id_header()))
                    .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
            )
    }

    /// The router, for driving the gate without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Gate listener starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("Gate listener stopped");
        Ok(())
    }
}
