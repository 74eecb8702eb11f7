//! Audit sink: a bounded queue drained by one background worker.
//!
//! Request handlers only enqueue; the worker performs the store writes. A full
//! queue drops the job instead of blocking the request or spawning more writers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

use crate::observability::metrics;
use crate::store::SecurityStore;

/// Kind of security event written to the audit store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditKind {
    LoginFail,
    XssAttempt,
    MassivePayload,
    LockedOut,
    IpBanned,
}

impl AuditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditKind::LoginFail => "LOGIN_FAIL",
            AuditKind::XssAttempt => "XSS_ATTEMPT",
            AuditKind::MassivePayload => "MASSIVE_PAYLOAD",
            AuditKind::LockedOut => "LOCKED_OUT",
            AuditKind::IpBanned => "IP_BANNED",
        }
    }
}

impl fmt::Display for AuditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One append-only audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRecord {
    pub identifier: String,
    pub kind: AuditKind,
    pub excerpt: String,
}

#[derive(Debug)]
enum SinkJob {
    Audit(AuditRecord),
    PersistBan { identifier: String, reason: String },
}

/// Producer side, cheap to clone into every component that reports events.
#[derive(Clone)]
pub struct AuditSink {
    tx: mpsc::Sender<SinkJob>,
}

/// Consumer side; owns the store writes.
pub struct AuditWorker {
    rx: mpsc::Receiver<SinkJob>,
    store: Arc<dyn SecurityStore>,
}

impl AuditSink {
    /// Create a sink and the worker that drains it.
    pub fn channel(capacity: usize, store: Arc<dyn SecurityStore>) -> (AuditSink, AuditWorker) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (AuditSink { tx }, AuditWorker { rx, store })
    }

    /// Queue an audit record. Never blocks.
    pub fn record(&self, identifier: &str, kind: AuditKind, excerpt: impl Into<String>) {
        tracing::warn!(identifier, kind = %kind, "Security event");
        metrics::record_audit_event(kind.as_str());

        self.enqueue(SinkJob::Audit(AuditRecord {
            identifier: identifier.to_string(),
            kind,
            excerpt: excerpt.into(),
        }));
    }

    /// Queue a durable ban write. Never blocks.
    pub fn persist_ban(&self, identifier: &str, reason: &str) {
        self.enqueue(SinkJob::PersistBan {
            identifier: identifier.to_string(),
            reason: reason.to_string(),
        });
    }

    fn enqueue(&self, job: SinkJob) {
        match self.tx.try_send(job) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(job)) => {
                tracing::warn!(?job, "Audit queue full, dropping job");
                metrics::record_audit_dropped();
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                tracing::debug!(?job, "Audit worker stopped, dropping job");
                metrics::record_audit_dropped();
            }
        }
    }
}

impl AuditWorker {
    /// Drain the queue until shutdown. Jobs already queued at shutdown are
    /// still written.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!("Audit worker starting");

        loop {
            tokio::select! {
                job = self.rx.recv() => match job {
                    Some(job) => self.handle(job).await,
                    None => break,
                },
                _ = shutdown.recv() => {
                    self.rx.close();
                    while let Some(job) = self.rx.recv().await {
                        self.handle(job).await;
                    }
                    break;
                }
            }
        }

        tracing::info!("Audit worker stopped");
    }

    async fn handle(&self, job: SinkJob) {
        match job {
            SinkJob::Audit(record) => {
                if let Err(e) = self.store.append_audit(&record).await {
                    tracing::warn!(
                        identifier = %record.identifier,
                        kind = %record.kind,
                        error = %e,
                        "Audit write failed, record dropped"
                    );
                }
            }
            SinkJob::PersistBan { identifier, reason } => {
                match self.store.persist_ban(&identifier, &reason).await {
                    Ok(()) => tracing::info!(identifier = %identifier, "Ban persisted"),
                    Err(e) => tracing::warn!(
                        identifier = %identifier,
                        error = %e,
                        "Ban persistence failed, ban stays in memory only"
                    ),
                }
            }
        }
    }
}
