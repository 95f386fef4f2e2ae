//! Handlers for the webhook ingestion front-end (C8) and the read API
//! (C9). Every handler takes the shared `Arc<AppState>` and returns a
//! plain `(StatusCode, Json<Value>)` - nothing here ever panics or
//! propagates an error past its own boundary, per spec.md §7.

use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use sentinel_core::{IngestOutcome, SentinelError};
use sentinel_model::Id;
use sentinel_store::clamp_limit;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

fn not_found(what: &str) -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "error": format!("{what} not found") })))
}

fn bad_id() -> (StatusCode, Json<Value>) {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": "malformed id" })))
}

pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "sentinel is online",
        "status": "operational",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let health = state.sentinel.health();
    Json(json!({
        "status": "healthy",
        "services": {
            "ml": health.ml,
            "rl": health.rl,
            "llm": health.llm,
            "remediation": health.remediation,
        },
        "store": health.store,
    }))
}

/// `POST /api/v1/falco/webhook`: runs the full pipeline. Any
/// unexpected failure inside the pipeline (§7's one escape hatch) is
/// surfaced as an opaque 500, never a panic past this boundary.
pub async fn webhook(State(state): State<Arc<AppState>>, Json(event): Json<Value>) -> impl IntoResponse {
    match state.sentinel.ingest(&event).await {
        Ok(IngestOutcome::Dropped) => (StatusCode::OK, Json(json!({ "status": "processed", "threat": null }))),
        Ok(IngestOutcome::Processed { threat, action }) => (
            StatusCode::OK,
            Json(json!({
                "status": "processed",
                "threat_id": threat.id.to_string(),
                "severity": threat.severity,
                "action": action.map(|a| a.action_type),
            })),
        ),
        Err(SentinelError::Internal(msg)) => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": msg }))),
        Err(SentinelError::Config(msg)) => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": msg }))),
    }
}

/// `POST /api/v1/simulate`: normalizes and stores only, no
/// scoring/decision/actuation.
pub async fn simulate(State(state): State<Arc<AppState>>, Json(event): Json<Value>) -> Json<Value> {
    match state.sentinel.simulate(&event).await {
        IngestOutcome::Dropped => Json(json!({ "status": "processed", "threat_id": null })),
        IngestOutcome::Processed { threat, .. } => Json(json!({
            "status": "processed",
            "threat_id": threat.id.to_string(),
        })),
    }
}

#[derive(Debug, Deserialize)]
pub struct ThreatFilter {
    severity: Option<String>,
    threat_type: Option<String>,
    resolved: Option<bool>,
    limit: Option<usize>,
}

/// `GET /api/v1/threats?severity=&threat_type=&resolved=&limit=`
pub async fn list_threats(State(state): State<Arc<AppState>>, Query(filter): Query<ThreatFilter>) -> Json<Value> {
    let all = state.sentinel.store().list_threats().await;
    let limit = clamp_limit(filter.limit);

    let filtered: Vec<_> = all
        .into_iter()
        .filter(|t| filter.severity.as_deref().map_or(true, |s| t.severity.to_string().eq_ignore_ascii_case(s)))
        .filter(|t| filter.threat_type.as_deref().map_or(true, |tt| t.threat_type.to_string().eq_ignore_ascii_case(tt)))
        .filter(|t| filter.resolved.map_or(true, |r| t.resolved == r))
        .take(limit)
        .collect();

    Json(json!(filtered))
}

pub async fn get_threat(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> impl IntoResponse {
    let Ok(id) = id.parse::<Id>() else { return bad_id() };
    match state.sentinel.store().find_threat(id).await {
        Some(threat) => (StatusCode::OK, Json(json!(threat))),
        None => not_found("threat"),
    }
}

/// `POST /api/v1/threats/{id}/resolve`
pub async fn resolve_threat(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> impl IntoResponse {
    let Ok(id) = id.parse::<Id>() else { return bad_id() };
    match state.sentinel.resolve_threat(id).await {
        Some(threat) => (StatusCode::OK, Json(json!({ "status": "resolved", "threat_id": threat.id.to_string() }))),
        None => not_found("threat"),
    }
}

#[derive(Debug, Deserialize)]
pub struct ActionFilter {
    action_type: Option<String>,
    executed: Option<bool>,
    limit: Option<usize>,
}

/// `GET /api/v1/actions?action_type=&executed=&limit=`
pub async fn list_actions(State(state): State<Arc<AppState>>, Query(filter): Query<ActionFilter>) -> Json<Value> {
    let all = state.sentinel.store().list_actions().await;
    let limit = clamp_limit(filter.limit);

    let filtered: Vec<_> = all
        .into_iter()
        .filter(|a| filter.action_type.as_deref().map_or(true, |at| a.action_type.to_string().eq_ignore_ascii_case(at)))
        .filter(|a| filter.executed.map_or(true, |e| a.executed == e))
        .take(limit)
        .collect();

    Json(json!(filtered))
}

pub async fn get_action(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> impl IntoResponse {
    let Ok(id) = id.parse::<Id>() else { return bad_id() };
    match state.sentinel.store().find_action(id).await {
        Some(action) => (StatusCode::OK, Json(json!(action))),
        None => not_found("action"),
    }
}

/// `GET /api/v1/explain/{threat_id}`
pub async fn explain(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> impl IntoResponse {
    let Ok(id) = id.parse::<Id>() else { return bad_id() };
    match state.sentinel.explain(id).await {
        Some((threat, explanation)) => (
            StatusCode::OK,
            Json(json!({
                "threat_id": threat.id.to_string(),
                "summary": threat.broadcast_summary(),
                "details": threat.description,
                "severity": threat.severity,
                "detected_at": threat.detected_at,
                "explanation": explanation,
            })),
        ),
        None => not_found("threat"),
    }
}
