//! Stats endpoint handlers.
//!
//! Errors never change the status code; they are returned as a JSON
//! string so that peers polling us can always decode the body.

use std::collections::HashMap;

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use fleetgrid_state::{NodeIp, NodeStatsRecord};

use crate::ApiState;

/// Sentinel reply for a `PUT /stats` body that is not an ip → record map.
pub const MALFORMED_BODY: &str = "boom";

const DEFAULT_ELECTIONS_LIMIT: usize = 20;

fn error_json(msg: impl std::fmt::Display) -> Json<Value> {
    Json(json!(format!("Error: {msg}")))
}

async fn stat_response(state: &ApiState, key: &str) -> Response {
    match state.coordinator.stat(key).await {
        Ok(value) => Json(value).into_response(),
        Err(e) => error_json(e).into_response(),
    }
}

// ── Stats ──────────────────────────────────────────────────────

/// Query pairs in request order, percent-decoded.
pub type StatsQuery = Vec<(String, String)>;

/// The stat named by `?<key>` or `?key=<key>`.
fn stat_key(pairs: &[(String, String)]) -> Option<&str> {
    let (name, value) = pairs.first()?;
    let key = if name == "key" { value } else { name };
    Some(key.as_str()).filter(|k| !k.is_empty())
}

/// GET /stats and GET /stats?<key>
pub async fn get_stats(
    State(state): State<ApiState>,
    query: Result<Query<StatsQuery>, QueryRejection>,
) -> Response {
    let pairs = match query {
        Ok(Query(pairs)) => pairs,
        Err(e) => return error_json(e).into_response(),
    };

    match stat_key(&pairs) {
        Some(key) => stat_response(&state, key).await,
        None => Json(state.coordinator.default_stats().await).into_response(),
    }
}

/// GET /stats/{key}
pub async fn get_stat(State(state): State<ApiState>, Path(key): Path<String>) -> Response {
    stat_response(&state, &key).await
}

/// PUT /stats
///
/// Merges every record except the one for this node and answers with the
/// resulting table.
pub async fn put_stats(State(state): State<ApiState>, body: Bytes) -> Response {
    let remote: HashMap<NodeIp, NodeStatsRecord> = match serde_json::from_slice(&body) {
        Ok(remote) => remote,
        Err(e) => {
            warn!(error = %e, bytes = body.len(), "malformed stats body");
            return Json(MALFORMED_BODY).into_response();
        }
    };

    let merged = state.coordinator.merge_remote(remote);
    debug!(merged, "merged pushed stats");
    Json(state.coordinator.table().snapshot()).into_response()
}

/// POST /stats/reset
pub async fn reset_stats(State(state): State<ApiState>) -> Response {
    info!("epoch reset requested over http");
    state.coordinator.reset().await;
    Json(state.coordinator.table().snapshot()).into_response()
}

// ── Audit ──────────────────────────────────────────────────────

#[derive(Debug, serde::Deserialize)]
pub struct ElectionsQuery {
    pub limit: Option<usize>,
}

/// GET /elections?limit=N
pub async fn list_elections(
    State(state): State<ApiState>,
    query: Result<Query<ElectionsQuery>, QueryRejection>,
) -> Response {
    let Some(audit) = &state.audit else {
        return error_json("election audit log is disabled").into_response();
    };
    let limit = match query {
        Ok(Query(q)) => q.limit.unwrap_or(DEFAULT_ELECTIONS_LIMIT),
        Err(e) => return error_json(e.body_text()).into_response(),
    };

    match audit.list_elections(limit) {
        Ok(records) => Json(records).into_response(),
        Err(e) => error_json(e).into_response(),
    }
}
