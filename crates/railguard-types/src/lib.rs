//! Shared type definitions for the RailGuard crossing monitor.
//!
//! This crate is the single source of truth for every type that crosses a
//! crate or wire boundary. Types flow to `TypeScript` via `ts-rs` for the
//! command dashboard.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers
//! - [`enums`] -- Status, posture and role enumerations
//! - [`structs`] -- State aggregates, incident reports and snapshots
//! - [`messages`] -- Live-update `WebSocket` messages
//! - [`topology`] -- Region / station / post / unit records

pub mod enums;
pub mod ids;
pub mod messages;
pub mod structs;
pub mod topology;

// Re-export all public types at crate root for convenience.
pub use enums::{
    CrossingGate, Dispatch, EvacuationRoute, ResponseTier, Role, Siren, TrafficLight, TrainStatus,
    UnitStatus,
};
pub use ids::{IncidentId, SubscriberId};
pub use messages::{LiveMessage, Welcome};
pub use structs::{
    CityStatus, IncidentFlag, IncidentReport, Snapshot, TrainState, UnitStatusMap,
};
pub use topology::{Post, Region, Station, Unit};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation for the dashboard.

    #[test]
    fn export_bindings() {
        // ts-rs writes the files to `bindings/` relative to the crate root.
        use ts_rs::TS;

        let _ = crate::ids::IncidentId::export_all();
        let _ = crate::ids::SubscriberId::export_all();
        let _ = crate::enums::TrainStatus::export_all();
        let _ = crate::enums::ResponseTier::export_all();
        let _ = crate::enums::Role::export_all();
        let _ = crate::structs::TrainState::export_all();
        let _ = crate::structs::CityStatus::export_all();
        let _ = crate::structs::IncidentFlag::export_all();
        let _ = crate::structs::IncidentReport::export_all();
        let _ = crate::structs::Snapshot::export_all();
        let _ = crate::messages::LiveMessage::export_all();
        let _ = crate::topology::Region::export_all();
    }
}
