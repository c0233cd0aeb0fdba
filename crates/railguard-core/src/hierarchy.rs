//! Organisation hierarchy and role-scoped views.
//!
//! The DAOP-7 topology is static. Unit statuses live in the store, so every
//! view is a fresh copy of the relevant subtree with statuses overlaid from
//! the current [`UnitStatusMap`].

use railguard_types::{Post, Region, Role, Station, Unit, UnitStatus, UnitStatusMap};
use serde::Serialize;

/// A role-scoped slice of the hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum HierarchyView {
    /// The whole region.
    Region(Region),
    /// One station and its posts.
    Station(Station),
    /// One post and its units.
    Post(Post),
}

fn cctv(id: &str, label: Option<&str>, lat: f64, long: f64) -> Unit {
    Unit {
        id: id.to_owned(),
        name: label.map_or_else(|| id.to_owned(), |l| format!("{id} ({l})")),
        kind: String::from("CCTV"),
        status: UnitStatus::Online,
        lat,
        long,
    }
}

fn post(id: &str, name: &str, geo_location: &str, units: Vec<Unit>) -> Post {
    Post {
        id: id.to_owned(),
        name: name.to_owned(),
        geo_location: geo_location.to_owned(),
        units,
    }
}

/// The built-in DAOP 7 Madiun topology.
pub fn default_topology() -> Region {
    let jombang = Station {
        id: String::from("STA-JBG"),
        name: String::from("Stasiun Jombang"),
        head_officer: String::from("Bpk. Sutrisno"),
        posts: vec![
            post(
                "JPL-102",
                "Pos JPL 102 (Jombang Kota)",
                "-7.5456, 112.2134",
                vec![
                    cctv("CCTV-JBG-01", Some("Arah Timur"), -7.5456, 112.2134),
                    cctv("CCTV-JBG-02", Some("Arah Barat"), -7.5456, 112.2134),
                ],
            ),
            post(
                "JPL-105",
                "Pos JPL 105 (Peterongan)",
                "-7.5478, 112.2156",
                vec![cctv("CCTV-PTR-01", Some("Flyover"), -7.5478, 112.2156)],
            ),
        ],
    };
    let kertosono = Station {
        id: String::from("STA-KTS"),
        name: String::from("Stasiun Kertosono"),
        head_officer: String::from("Bpk. Hartono"),
        posts: vec![post(
            "JPL-98",
            "Pos JPL 98 (Baron)",
            "-7.6012, 112.1000",
            vec![cctv("CCTV-BRN-01", None, -7.6012, 112.1000)],
        )],
    };

    Region {
        id: String::from("DAOP-7"),
        name: String::from("DAOP 7 MADIUN"),
        code: String::from("D7"),
        stations: vec![jombang, kertosono],
    }
}

/// Every unit id in `region`, in topology order.
pub fn unit_ids(region: &Region) -> Vec<String> {
    region.units().map(|u| u.id.clone()).collect()
}

fn overlay_post(post: &mut Post, statuses: &UnitStatusMap) {
    for unit in &mut post.units {
        if let Some(status) = statuses.get(&unit.id) {
            unit.status = *status;
        }
    }
}

fn overlay_station(station: &mut Station, statuses: &UnitStatusMap) {
    for post in &mut station.posts {
        overlay_post(post, statuses);
    }
}

/// Copy of `region` with live statuses applied. Units missing from the map
/// keep their topology status.
pub fn annotate(region: &Region, statuses: &UnitStatusMap) -> Region {
    let mut region = region.clone();
    for station in &mut region.stations {
        overlay_station(station, statuses);
    }
    region
}

/// The slice of the hierarchy visible to `role`.
///
/// Station masters see the station named by `station_id`, JPL officers the
/// post named by `post_id`. Returns `None` when that id is missing or
/// unknown.
pub fn view_for_role(
    region: &Region,
    statuses: &UnitStatusMap,
    role: Role,
    post_id: Option<&str>,
    station_id: Option<&str>,
) -> Option<HierarchyView> {
    match role {
        Role::DaopAdmin => Some(HierarchyView::Region(annotate(region, statuses))),
        Role::StationMaster => {
            let id = station_id?;
            let mut station = region.stations.iter().find(|s| s.id == id)?.clone();
            overlay_station(&mut station, statuses);
            Some(HierarchyView::Station(station))
        }
        Role::JplOfficer => {
            let id = post_id?;
            let mut post = region
                .stations
                .iter()
                .flat_map(|s| s.posts.iter())
                .find(|p| p.id == id)?
                .clone();
            overlay_post(&mut post, statuses);
            Some(HierarchyView::Post(post))
        }
    }
}
