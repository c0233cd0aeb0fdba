//! Enumeration types for the crossing monitor.
//!
//! Every enum serializes as `SCREAMING_SNAKE_CASE` (`GREEN_WAVE`,
//! `RED_LOCK`, ...) because that is the wire format the dashboard renders
//! verbatim.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Train
// ---------------------------------------------------------------------------

/// Coarse classification of the approaching train.
///
/// Variants are declared in ascending severity so `Ord` compares severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrainStatus {
    /// The train is far from the crossing.
    Safe,
    /// The train is approaching; traffic should be cleared.
    Warning,
    /// The train is at or about to reach the crossing.
    Critical,
}

impl TrainStatus {
    /// The city action text shown alongside this status.
    pub const fn city_action(self) -> &'static str {
        match self {
            Self::Safe => "TRAFFIC_NORMAL",
            Self::Warning => "TRAFFIC_CAUTION",
            Self::Critical => "EMERGENCY_DISPATCH",
        }
    }
}

// ---------------------------------------------------------------------------
// City response
// ---------------------------------------------------------------------------

/// Traffic light plan around the crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrafficLight {
    /// Regular signal timing.
    Normal,
    /// Consecutive greens to flush vehicles away from the crossing.
    GreenWave,
    /// All approaches held at red.
    RedLock,
}

/// Dispatch state of an emergency service (ambulance or police).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Dispatch {
    /// Unit waiting at base.
    Standby,
    /// Unit sent to the crossing.
    Dispatched,
}

/// State of the evacuation route next to the crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvacuationRoute {
    /// Route open to public traffic.
    Open,
    /// Route reserved for emergency services.
    Closed,
}

/// Siren level at the crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Siren {
    /// Silent.
    Off,
    /// Intermittent warning tone.
    Warning,
    /// Continuous alarm.
    Critical,
}

/// Position of the rail crossing gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CrossingGate {
    /// Barrier raised.
    Open,
    /// Barrier lowering; lights flashing.
    Closing,
    /// Barrier down.
    Closed,
}

/// One posture tier of the city response ladder.
///
/// Variants are declared in ascending severity so `Ord` compares severity:
/// `Normal < Caution < Warning < Critical < Incident`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseTier {
    /// Train beyond the caution threshold.
    Normal,
    /// Train within the caution threshold: clear traffic.
    Caution,
    /// Train within the warning threshold: partial alert.
    Warning,
    /// Train within the critical threshold: maximum alert.
    Critical,
    /// Incident override: maximum alert regardless of distance.
    Incident,
}

impl ResponseTier {
    /// Whether this tier carries the maximum-alert posture.
    pub const fn is_maximum(self) -> bool {
        matches!(self, Self::Critical | Self::Incident)
    }
}

// ---------------------------------------------------------------------------
// Units and roles
// ---------------------------------------------------------------------------

/// Health of a camera or sensor unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitStatus {
    /// Streaming normally.
    Online,
    /// Degraded (packet loss, low light, ...).
    Warning,
    /// Not reachable.
    Offline,
}

/// Operator role used to scope hierarchy queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Regional operations admin: sees the whole region.
    #[default]
    DaopAdmin,
    /// Station master: sees one station.
    StationMaster,
    /// Level-crossing officer: sees one post.
    JplOfficer,
}
