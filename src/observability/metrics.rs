//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gate_decisions_total` (counter): pipeline outcomes by `outcome`
//! - `gate_audit_events_total` (counter): security events by `kind`
//! - `gate_audit_dropped_total` (counter): audit jobs dropped on a full queue
//! - `gate_blacklist_size` (gauge): identifiers currently banned
//! - `gate_blacklist_refresh_total` (counter): refreshes by `result`
//! - `gate_locked_identifiers` (gauge): identifiers currently locked out
//! - `gate_upstream_duration_seconds` (histogram): forwarding latency by `status`
//!
//! Recording is a no-op until a recorder is installed, so components and
//! tests can call these freely.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus exporter with its own scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            register_metrics();
            tracing::info!(address = %addr, "Metrics exporter listening");
        }
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

fn register_metrics() {
    describe_counter!("gate_decisions_total", "Gate pipeline decisions by outcome");
    describe_counter!("gate_audit_events_total", "Security events reported to the audit sink");
    describe_counter!("gate_audit_dropped_total", "Audit jobs dropped because the queue was full");
    describe_gauge!("gate_blacklist_size", "Identifiers currently in the blacklist cache");
    describe_counter!("gate_blacklist_refresh_total", "Blacklist refresh attempts by result");
    describe_gauge!("gate_locked_identifiers", "Identifiers currently locked out");
    describe_histogram!("gate_upstream_duration_seconds", "Upstream forwarding latency");
}

pub fn record_decision(outcome: &'static str) {
    counter!("gate_decisions_total", "outcome" => outcome).increment(1);
}

pub fn record_audit_event(kind: &'static str) {
    counter!("gate_audit_events_total", "kind" => kind).increment(1);
}

pub fn record_audit_dropped() {
    counter!("gate_audit_dropped_total").increment(1);
}

pub fn record_blacklist_size(size: usize) {
    gauge!("gate_blacklist_size").set(size as f64);
}

pub fn record_refresh(result: &'static str) {
    counter!("gate_blacklist_refresh_total", "result" => result).increment(1);
}

pub fn record_locked(count: usize) {
    gauge!("gate_locked_identifiers").set(count as f64);
}

pub fn record_upstream(status: u16, start: Instant) {
    histogram!("gate_upstream_duration_seconds", "status" => status.to_string())
        .record(start.elapsed().as_secs_f64());
}
