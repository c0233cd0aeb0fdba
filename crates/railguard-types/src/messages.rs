//! Messages pushed over the live-update `WebSocket`.
//!
//! Every message is a JSON object `{"type": ..., "data": ...}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::structs::{
    CityStatus, IncidentFlag, IncidentReport, Snapshot, TrainState, UnitStatusMap,
};

/// Greeting sent once when a viewer connects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Welcome {
    /// Human-readable greeting.
    pub message: String,
    /// Server time at connect.
    pub timestamp: DateTime<Utc>,
}

/// A live-update message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum LiveMessage {
    /// Connection greeting.
    Welcome(Welcome),
    /// Train telemetry.
    TrainStatus(TrainState),
    /// City response posture.
    CityStatus(CityStatus),
    /// Unit statuses.
    UnitStatus(UnitStatusMap),
    /// Incident override state.
    IncidentStatus(IncidentFlag),
    /// An accepted incident report, pushed as soon as it arrives.
    Detection(IncidentReport),
}

impl LiveMessage {
    /// Split a snapshot into one message per aggregate, in a fixed order.
    pub fn from_snapshot(snapshot: &Snapshot) -> [Self; 4] {
        [
            Self::TrainStatus(snapshot.train.clone()),
            Self::CityStatus(snapshot.city.clone()),
            Self::UnitStatus(snapshot.units.clone()),
            Self::IncidentStatus(snapshot.incident.clone()),
        ]
    }

    /// The `type` discriminator of this message.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Welcome(_) => "welcome",
            Self::TrainStatus(_) => "train_status",
            Self::CityStatus(_) => "city_status",
            Self::UnitStatus(_) => "unit_status",
            Self::IncidentStatus(_) => "incident_status",
            Self::Detection(_) => "detection",
        }
    }
}
