//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the store, verifier and gate from validated configuration
//! - Load the blacklist once before taking traffic
//! - Start background tasks (audit worker, blacklist refresh, sweeper)
//! - Bind listeners and serve until a shutdown signal
//!
//! # Design Decisions
//! - Fail fast on bad wiring (unbindable address, unusable store URL)
//! - An unreachable store at boot is not fatal: the gate starts with an
//!   empty blacklist and the periodic refresh catches up
//! - Listeners start last (traffic only when ready)

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::admin::{self, AdminState};
use crate::config::{GateConfig, StoreBackend, VerifierKind};
use crate::gate::{CredentialVerifier, Gatekeeper, StaticCredentials};
use crate::http::GateServer;
use crate::lifecycle::signals::shutdown_signal;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::store::{MemoryStore, RestStore, SecurityStore, StoreError};

/// How long background tasks get to finish after shutdown is triggered.
const DRAIN_DEADLINE: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("store setup failed: {0}")]
    Store(#[from] StoreError),

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Store and verifier selected by configuration.
pub fn build_collaborators(
    config: &GateConfig,
) -> Result<(Arc<dyn SecurityStore>, Arc<dyn CredentialVerifier>), StartupError> {
    let rest = match config.store.backend {
        StoreBackend::Rest => Some(Arc::new(RestStore::new(&config.store)?)),
        StoreBackend::Memory => None,
    };

    let store: Arc<dyn SecurityStore> = match &rest {
        Some(rest) => rest.clone() as Arc<dyn SecurityStore>,
        None => {
            tracing::warn!("Using in-memory store; bans and audit records are not persisted");
            Arc::new(MemoryStore::new()) as Arc<dyn SecurityStore>
        }
    };

    let verifier: Arc<dyn CredentialVerifier> = match (config.auth.verifier, rest) {
        (VerifierKind::Store, Some(rest)) => rest as Arc<dyn CredentialVerifier>,
        _ => Arc::new(StaticCredentials::from_config(&config.auth)) as Arc<dyn CredentialVerifier>,
    };

    Ok((store, verifier))
}

async fn bind(address: &str) -> Result<TcpListener, StartupError> {
    TcpListener::bind(address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.to_string(),
            source,
        })
}

/// Run the gate until a termination signal.
pub async fn run(config: GateConfig) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let (store, verifier) = build_collaborators(&config)?;
    let (gate, worker) = Gatekeeper::from_config(&config, store, verifier);
    let gate = Arc::new(gate);

    match gate.blacklist().refresh().await {
        Ok(count) => tracing::info!(count, "Initial blacklist loaded"),
        Err(e) => tracing::warn!(error = %e, "Initial blacklist load failed, starting empty"),
    }

    let shutdown = Shutdown::new();
    let mut background: Vec<JoinHandle<()>> = vec![tokio::spawn(worker.run(shutdown.subscribe()))];
    background.extend(gate.spawn_background(&config, &shutdown));

    let admin_task = if config.admin.enabled {
        let listener = bind(&config.admin.bind_address).await?;
        let router = admin::setup_admin_router(AdminState {
            gate: gate.clone(),
            api_key: Arc::from(config.admin.api_key.as_str()),
        });
        Some(tokio::spawn(admin::serve(router, listener, shutdown.subscribe())))
    } else {
        None
    };

    let listener = bind(&config.listener.bind_address).await?;
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        "Gate ready"
    );

    let signal = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal.trigger();
    });

    let server = GateServer::new(&config, gate);
    let served = server.run(listener, shutdown.subscribe()).await;

    // The listener may also stop on its own error; make sure everything else stops too.
    shutdown.trigger();

    if let Some(task) = admin_task {
        match task.await {
            Ok(Err(e)) => tracing::error!(error = %e, "Admin API failed"),
            Err(e) => tracing::error!(error = %e, "Admin API task panicked"),
            Ok(Ok(())) => {}
        }
    }

    for handle in background {
        if tokio::time::timeout(DRAIN_DEADLINE, handle).await.is_err() {
            tracing::warn!("Background task did not stop before the deadline");
        }
    }

    served?;
    tracing::info!("Shutdown complete");
    Ok(())
}
