//! Core state aggregates and payloads.
//!
//! [`TrainState`], [`CityStatus`], [`IncidentFlag`] and [`UnitStatusMap`]
//! are the four independently locked aggregates of the state store.
//! [`Snapshot`] is a point-in-time copy of all four.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{
    CrossingGate, Dispatch, EvacuationRoute, ResponseTier, Siren, TrafficLight, TrainStatus,
    UnitStatus,
};
use crate::ids::IncidentId;

/// Unit identifier → current status.
pub type UnitStatusMap = BTreeMap<String, UnitStatus>;

// ---------------------------------------------------------------------------
// TrainState
// ---------------------------------------------------------------------------

/// Telemetry of the simulated train approaching the crossing.
///
/// Speed and distance are never negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TrainState {
    /// Train service identifier.
    pub train_id: String,
    /// Speed in km/h.
    #[serde(rename = "speed")]
    pub speed_kmh: f64,
    /// Distance to the crossing in km.
    #[serde(rename = "distance")]
    pub distance_km: f64,
    /// Coarse status derived from distance (or forced by an incident).
    pub status: TrainStatus,
    /// Free-text city action derived from `status`.
    pub city_action: String,
    /// Seconds until the train reaches the crossing, `None` when stopped.
    #[serde(rename = "eta")]
    pub eta_seconds: Option<f64>,
    /// When this record was last written.
    pub timestamp: DateTime<Utc>,
}

impl TrainState {
    /// A train at the start of a lap: given distance and speed, status `SAFE`.
    pub fn at_start(train_id: &str, distance_km: f64, speed_kmh: f64, now: DateTime<Utc>) -> Self {
        let mut state = Self {
            train_id: train_id.to_owned(),
            speed_kmh,
            distance_km,
            status: TrainStatus::Safe,
            city_action: TrainStatus::Safe.city_action().to_owned(),
            eta_seconds: None,
            timestamp: now,
        };
        state.refresh_eta();
        state
    }

    /// Set `status` and the matching `city_action` together.
    pub fn set_status(&mut self, status: TrainStatus) {
        self.status = status;
        status.city_action().clone_into(&mut self.city_action);
    }

    /// Recompute `eta_seconds` from the current distance and speed.
    pub fn refresh_eta(&mut self) {
        self.eta_seconds = if self.speed_kmh > 0.0 {
            Some((self.distance_km / self.speed_kmh * 3600.0).round())
        } else {
            None
        };
    }
}

// ---------------------------------------------------------------------------
// CityStatus
// ---------------------------------------------------------------------------

/// Full city response posture. Always rewritten as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CityStatus {
    /// Active posture tier.
    pub tier: ResponseTier,
    /// Traffic light plan.
    pub traffic_light: TrafficLight,
    /// Ambulance dispatch state.
    pub ambulance: Dispatch,
    /// Police dispatch state.
    pub police: Dispatch,
    /// Evacuation route state.
    pub evacuation_route: EvacuationRoute,
    /// Siren level.
    pub siren: Siren,
    /// Crossing gate position.
    pub rail_crossing: CrossingGate,
    /// When the posture was last recomputed.
    pub last_update: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// IncidentFlag
// ---------------------------------------------------------------------------

/// Incident override flag.
///
/// While `active`, the city posture is pinned to the maximum-alert tier and
/// the train decelerates instead of advancing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct IncidentFlag {
    /// Whether the override is in force.
    pub active: bool,
    /// Incident that armed the override.
    pub incident_id: Option<IncidentId>,
    /// When the override was (last) armed.
    pub activated_at: Option<DateTime<Utc>>,
    /// When the pending auto-clear is due.
    pub clears_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// IncidentReport
// ---------------------------------------------------------------------------

/// An incident (obstacle detection) pushed by the vision pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct IncidentReport {
    /// Report kind, e.g. `OBSTACLE_STUCK`. Empty becomes `detection`.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Detected object class (`car`, `person`, ...).
    #[serde(default, alias = "object")]
    pub object_class: String,
    /// Detector confidence in `0.0..=1.0`.
    pub confidence: f64,
    /// Whether the object sits inside the crossing's region of interest.
    #[serde(default)]
    pub in_roi: bool,
    /// Tracker object id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<i64>,
    /// How long the object has been stationary, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    /// Detection time; stamped on receipt when absent.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Source camera.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_id: Option<String>,
    /// Free-form detail.
    #[serde(default, rename = "detail", skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Evidence image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Point-in-time copy of every aggregate.
///
/// Each aggregate is internally consistent; aggregates are read one after
/// another so they may be a few milliseconds apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Snapshot {
    /// Train telemetry.
    pub train: TrainState,
    /// City response posture.
    pub city: CityStatus,
    /// Unit statuses.
    pub units: UnitStatusMap,
    /// Incident override.
    pub incident: IncidentFlag,
    /// When the copy was taken.
    pub taken_at: DateTime<Utc>,
}
