use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::admin::AdminState;
use crate::http::response::error_response;
use crate::security::BanRecord;

const DEFAULT_BAN_REASON: &str = "Manual ban";

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub banned: usize,
    pub locked: usize,
}

#[derive(Serialize)]
pub struct BanResponse {
    pub identifier: String,
    pub newly_banned: bool,
    pub persisted: bool,
}

#[derive(Serialize)]
pub struct UnlockResponse {
    pub unlocked: usize,
}

#[derive(Serialize)]
pub struct LockedCount {
    pub count: usize,
}

#[derive(Serialize)]
pub struct LockedList {
    pub count: usize,
    pub identifiers: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct BanParams {
    pub reason: Option<String>,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        banned: state.gate.blacklist().len(),
        locked: state.gate.locked_count(),
    })
}

/// Ban an IP address now. The path segment must parse as an IP address.
pub async fn ban_ip(
    State(state): State<AdminState>,
    Path(ip): Path<String>,
    Query(params): Query<BanParams>,
) -> Response {
    let Ok(ip) = ip.parse::<IpAddr>() else {
        return error_response(StatusCode::BAD_REQUEST, "Not an IP address");
    };
    let identifier = ip.to_string();
    let reason = params
        .reason
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_BAN_REASON.to_string());

    let outcome = state.gate.ban_now(&identifier, &reason).await;
    tracing::info!(
        identifier = %identifier,
        newly_banned = outcome.newly_banned,
        persisted = outcome.persisted,
        "Admin ban"
    );

    Json(BanResponse {
        identifier,
        newly_banned: outcome.newly_banned,
        persisted: outcome.persisted,
    })
    .into_response()
}

pub async fn unlock_all(State(state): State<AdminState>) -> Json<UnlockResponse> {
    let unlocked = state.gate.unlock_all();
    tracing::info!(unlocked, "Admin unlock-all");
    Json(UnlockResponse { unlocked })
}

pub async fn get_locked(State(state): State<AdminState>) -> Json<LockedList> {
    let identifiers = state.gate.locked_identifiers();
    Json(LockedList {
        count: identifiers.len(),
        identifiers,
    })
}

pub async fn get_locked_count(State(state): State<AdminState>) -> Json<LockedCount> {
    Json(LockedCount {
        count: state.gate.locked_count(),
    })
}

pub async fn get_banned(State(state): State<AdminState>) -> Json<Vec<BanRecord>> {
    Json(state.gate.blacklist().snapshot())
}
