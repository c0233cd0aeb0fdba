//! In-memory state store.
//!
//! [`StateStore`] holds the four state aggregates, each behind its own
//! [`RwLock`]. Every accessor takes exactly one lock, copies or mutates the
//! in-memory fields, and releases it before returning, so no caller can
//! hold two aggregate locks at once and no lock is ever held across I/O.
//!
//! The store is constructed once and shared as `Arc<StateStore>` with every
//! component that needs it.

use chrono::Utc;
use railguard_types::{
    CityStatus, IncidentFlag, Snapshot, TrainState, UnitStatus, UnitStatusMap,
};
use tokio::sync::RwLock;

use crate::city;
use crate::config::RailguardConfig;

/// Shared simulation state.
#[derive(Debug)]
pub struct StateStore {
    train: RwLock<TrainState>,
    city: RwLock<CityStatus>,
    units: RwLock<UnitStatusMap>,
    incident: RwLock<IncidentFlag>,
}

impl StateStore {
    /// Create a store from explicit initial aggregates.
    pub fn new(train: TrainState, city: CityStatus, units: UnitStatusMap) -> Self {
        Self {
            train: RwLock::new(train),
            city: RwLock::new(city),
            units: RwLock::new(units),
            incident: RwLock::new(IncidentFlag::default()),
        }
    }

    /// Create a store at the start of a lap with every unit `ONLINE`.
    ///
    /// The initial city posture is evaluated from the initial distance so
    /// the very first snapshot is already consistent.
    pub fn from_config<I>(config: &RailguardConfig, unit_ids: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let now = Utc::now();
        let train = TrainState::at_start(
            &config.train.train_id,
            config.train.initial_distance_km,
            config.train.initial_speed_kmh,
            now,
        );
        let tier = city::evaluate(train.distance_km, false, &config.city);
        let units = unit_ids
            .into_iter()
            .map(|id| (id, UnitStatus::Online))
            .collect();
        Self::new(train, city::posture(tier, now), units)
    }

    // -----------------------------------------------------------------------
    // TrainState
    // -----------------------------------------------------------------------

    /// Copy of the train telemetry.
    pub async fn train(&self) -> TrainState {
        self.train.read().await.clone()
    }

    /// Current distance to the crossing (km).
    pub async fn train_distance(&self) -> f64 {
        self.train.read().await.distance_km
    }

    /// Mutate the train telemetry under its write lock.
    pub async fn update_train<R>(&self, f: impl FnOnce(&mut TrainState) -> R) -> R {
        let mut guard = self.train.write().await;
        f(&mut guard)
    }

    // -----------------------------------------------------------------------
    // CityStatus
    // -----------------------------------------------------------------------

    /// Copy of the city posture.
    pub async fn city(&self) -> CityStatus {
        self.city.read().await.clone()
    }

    /// Replace the city posture wholesale, returning the previous one.
    pub async fn replace_city(&self, status: CityStatus) -> CityStatus {
        let mut guard = self.city.write().await;
        std::mem::replace(&mut *guard, status)
    }

    // -----------------------------------------------------------------------
    // UnitStatusMap
    // -----------------------------------------------------------------------

    /// Copy of every unit status.
    pub async fn units(&self) -> UnitStatusMap {
        self.units.read().await.clone()
    }

    /// Overwrite one unit's status.
    ///
    /// Returns the previous status when the value actually changed, `None`
    /// when it was already `status` or the unit is unknown. Unknown units
    /// are not inserted.
    pub async fn set_unit_status(&self, unit_id: &str, status: UnitStatus) -> Option<UnitStatus> {
        let mut guard = self.units.write().await;
        let slot = guard.get_mut(unit_id)?;
        if *slot == status {
            return None;
        }
        Some(std::mem::replace(slot, status))
    }

    // -----------------------------------------------------------------------
    // IncidentFlag
    // -----------------------------------------------------------------------

    /// Copy of the incident flag.
    pub async fn incident(&self) -> IncidentFlag {
        self.incident.read().await.clone()
    }

    /// Whether the incident override is active.
    pub async fn incident_active(&self) -> bool {
        self.incident.read().await.active
    }

    /// Mutate the incident flag under its write lock.
    pub async fn update_incident<R>(&self, f: impl FnOnce(&mut IncidentFlag) -> R) -> R {
        let mut guard = self.incident.write().await;
        f(&mut guard)
    }

    // -----------------------------------------------------------------------
    // Snapshot
    // -----------------------------------------------------------------------

    /// Copy every aggregate, one lock at a time.
    pub async fn snapshot(&self) -> Snapshot {
        let train = self.train().await;
        let city = self.city().await;
        let units = self.units().await;
        let incident = self.incident().await;
        Snapshot {
            train,
            city,
            units,
            incident,
            taken_at: Utc::now(),
        }
    }
}
