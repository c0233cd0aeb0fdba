//! REST API endpoint handlers for the observer server.
//!
//! All reads copy the relevant aggregate out of the shared store and
//! release its lock before serializing.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Service info |
//! | `GET` | `/api/health` | Health check |
//! | `GET` | `/api/status` | Train telemetry |
//! | `GET` | `/api/city-status` | City response posture |
//! | `GET` | `/api/units` | Unit statuses |
//! | `GET` | `/api/incident` | Incident flag |
//! | `GET` | `/api/history` | Recent incident reports |
//! | `GET` | `/api/hierarchy` | Role-scoped topology |
//! | `POST` | `/api/alert`, `/api/internal/push` | Submit an incident |

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use chrono::Utc;
use railguard_core::hierarchy::{self, HierarchyView};
use railguard_types::{
    CityStatus, IncidentFlag, IncidentReport, LiveMessage, Role, TrainState, UnitStatusMap,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::ObserverError;
use crate::hub::SnapshotBatch;
use crate::state::AppState;

/// Default number of history entries returned.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Largest accepted `limit` for `GET /api/history`.
pub const MAX_HISTORY_LIMIT: usize = 500;

// ---------------------------------------------------------------------------
// Query parameter structs
// ---------------------------------------------------------------------------

/// Query parameters for `GET /api/history`.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Number of entries; out-of-range values fall back to the default.
    pub limit: Option<usize>,
}

/// Query parameters for `GET /api/hierarchy`.
#[derive(Debug, Deserialize)]
pub struct HierarchyQuery {
    /// Viewer role, `DAOP_ADMIN` when absent.
    #[serde(default)]
    pub role: Role,
    /// Post for `JPL_OFFICER`.
    pub post_id: Option<String>,
    /// Station for `STATION_MASTER`.
    pub station_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Service info
// ---------------------------------------------------------------------------

/// Describe the service and its endpoints.
pub async fn index(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "service": "RailGuard crossing monitor",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "ONLINE",
        "started_at": state.started_at,
        "endpoints": {
            "health": "GET /api/health",
            "train": "GET /api/status",
            "city": "GET /api/city-status",
            "units": "GET /api/units",
            "incident": "GET /api/incident",
            "history": "GET /api/history?limit=N",
            "hierarchy": "GET /api/hierarchy?role=&post_id=&station_id=",
            "alert": "POST /api/alert",
            "live": "GET /ws",
            "camera": "GET /stream/cam1",
        },
    }))
}

/// Liveness probe.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let uptime = Utc::now()
        .signed_duration_since(state.started_at)
        .num_seconds()
        .max(0);
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "storage": "in-memory",
        "uptime_seconds": uptime,
        "timestamp": Utc::now(),
    }))
}

// ---------------------------------------------------------------------------
// State reads
// ---------------------------------------------------------------------------

/// Current train telemetry.
pub async fn train_status(State(state): State<Arc<AppState>>) -> Json<TrainState> {
    Json(state.store.train().await)
}

/// Current city posture.
pub async fn city_status(State(state): State<Arc<AppState>>) -> Json<CityStatus> {
    Json(state.store.city().await)
}

/// Current unit statuses.
pub async fn unit_statuses(State(state): State<Arc<AppState>>) -> Json<UnitStatusMap> {
    Json(state.store.units().await)
}

/// Current incident flag.
pub async fn incident_status(State(state): State<Arc<AppState>>) -> Json<IncidentFlag> {
    Json(state.store.incident().await)
}

/// Recent incident reports, oldest first.
pub async fn history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Json<Value> {
    let limit = query
        .limit
        .filter(|n| (1..=MAX_HISTORY_LIMIT).contains(n))
        .unwrap_or(DEFAULT_HISTORY_LIMIT);
    let history = state.incidents.history().recent(limit).await;
    Json(json!({
        "total": history.len(),
        "history": history,
        "source": "memory",
    }))
}

/// The slice of the hierarchy visible to the requested role.
pub async fn hierarchy(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HierarchyQuery>,
) -> Result<Json<HierarchyView>, ObserverError> {
    let statuses = state.store.units().await;
    hierarchy::view_for_role(
        &state.topology,
        &statuses,
        query.role,
        query.post_id.as_deref(),
        query.station_id.as_deref(),
    )
    .map(Json)
    .ok_or_else(|| ObserverError::NotFound(String::from("no hierarchy data for this role")))
}

// ---------------------------------------------------------------------------
// Incident ingestion
// ---------------------------------------------------------------------------

/// Submit an incident report.
///
/// Malformed JSON and invalid reports are rejected with 400 before any
/// state changes. An accepted report is pushed to live viewers as a
/// `detection` message right away.
pub async fn submit_incident(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<IncidentReport>, JsonRejection>,
) -> Result<impl IntoResponse, ObserverError> {
    let Json(report) = payload.map_err(|e| ObserverError::InvalidPayload(e.body_text()))?;
    let accepted = state.incidents.ingest(report).await?;
    debug!(incident_id = %accepted.ack.incident_id, "incident acknowledged");

    match SnapshotBatch::message(&LiveMessage::Detection(accepted.report)) {
        Ok(batch) => {
            if let Err(e) = state.snapshots.broadcast(Arc::new(batch)).await {
                warn!(error = %e, "detection push dropped");
            }
        }
        Err(e) => warn!(error = %e, "failed to encode detection"),
    }

    Ok(Json(accepted.ack))
}
