//! Administrative API on its own listener.
//!
//! Every route requires the configured bearer key.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::gate::Gatekeeper;
use self::auth::admin_auth_middleware;
use self::handlers::*;

#[derive(Clone)]
pub struct AdminState {
    pub gate: Arc<Gatekeeper>,
    pub api_key: Arc<str>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/security/ban/{ip}", post(ban_ip))
        .route("/admin/security/unlock-all", post(unlock_all))
        .route("/admin/security/locked", get(get_locked))
        .route("/admin/security/locked/count", get(get_locked_count))
        .route("/admin/security/banned", get(get_banned))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}

/// Serve the admin API until `shutdown` fires.
pub async fn serve(router: Router, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Admin API listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    tracing::info!("Admin API stopped");
    Ok(())
}
