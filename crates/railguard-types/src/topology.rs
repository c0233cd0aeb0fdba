//! Organisation topology: region → stations → posts → units.
//!
//! The topology itself is static reference data. Only the `status` of each
//! [`Unit`] changes, and that is overlaid from the live unit status map at
//! query time.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::UnitStatus;

/// A CCTV camera or sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Unit {
    /// Unit identifier, e.g. `CCTV-JBG-01`.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Hardware kind, e.g. `CCTV`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Current status.
    pub status: UnitStatus,
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub long: f64,
}

/// A level-crossing guard post (JPL).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Post {
    /// Post identifier, e.g. `JPL-102`.
    pub id: String,
    /// Display name.
    pub name: String,
    /// `"lat, long"` string.
    pub geo_location: String,
    /// Units mounted at this post.
    pub units: Vec<Unit>,
}

/// A railway station and the posts it supervises.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Station {
    /// Station identifier, e.g. `STA-JBG`.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Officer in charge.
    pub head_officer: String,
    /// Supervised posts.
    pub posts: Vec<Post>,
}

/// An operations region (DAOP), the root of the topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Region {
    /// Region identifier, e.g. `DAOP-7`.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Short code.
    pub code: String,
    /// Stations in the region.
    pub stations: Vec<Station>,
}

impl Region {
    /// Iterate over every unit in the region.
    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.stations
            .iter()
            .flat_map(|s| s.posts.iter())
            .flat_map(|p| p.units.iter())
    }
}
