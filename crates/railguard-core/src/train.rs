//! Train simulation engine.
//!
//! Once per tick the train either advances toward the crossing or, while
//! the incident override is active, brakes in place:
//!
//! - **No incident**: distance drops by the configured step (never less
//!   than one metre, the rounding resolution) and the status
//!   is reclassified (`< critical_km` → `CRITICAL`, `< warning_km` →
//!   `WARNING`, otherwise `SAFE`). When the distance reaches zero the lap
//!   wraps: distance and speed return to their initial values and the
//!   status to `SAFE`.
//! - **Incident**: distance is frozen, speed drops by the deceleration step
//!   (clamped at zero) and the status stays `CRITICAL`.
//!
//! Every tick stamps the timestamp and recomputes the ETA. All arithmetic is
//! clamped, so a tick can never fail.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use railguard_types::{TrainState, TrainStatus};
use tracing::debug;

use crate::config::{MIN_DISTANCE_STEP_KM, TrainConfig};
use crate::schedule::Periodic;
use crate::store::StateStore;

/// Distances at or below this are treated as "arrived" (km).
const ARRIVAL_EPSILON_KM: f64 = 1e-6;

/// What a single tick did to the train.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Moved one step closer.
    Advanced,
    /// Reached the crossing and started a new lap.
    LapCompleted,
    /// Braked in place because of an active incident.
    Braking,
}

/// Classify a distance into a coarse train status.
pub fn classify(distance_km: f64, config: &TrainConfig) -> TrainStatus {
    if distance_km < config.critical_km {
        TrainStatus::Critical
    } else if distance_km < config.warning_km {
        TrainStatus::Warning
    } else {
        TrainStatus::Safe
    }
}

/// Put the train back at the start of a lap.
pub fn reset_lap(train: &mut TrainState, config: &TrainConfig, now: DateTime<Utc>) {
    train.distance_km = config.initial_distance_km;
    train.speed_kmh = config.initial_speed_kmh;
    train.set_status(TrainStatus::Safe);
    train.refresh_eta();
    train.timestamp = now;
}

/// Advance the train by one tick.
pub fn advance(
    train: &mut TrainState,
    incident_active: bool,
    config: &TrainConfig,
    now: DateTime<Utc>,
) -> TickOutcome {
    let outcome = if incident_active {
        train.speed_kmh = (train.speed_kmh - config.deceleration_kmh).max(0.0);
        train.set_status(TrainStatus::Critical);
        TickOutcome::Braking
    } else {
        let step = config.distance_step_km.max(MIN_DISTANCE_STEP_KM);
        let next = round_km(train.distance_km - step);
        if next <= ARRIVAL_EPSILON_KM {
            reset_lap(train, config, now);
            TickOutcome::LapCompleted
        } else {
            train.distance_km = next;
            train.set_status(classify(next, config));
            TickOutcome::Advanced
        }
    };

    train.refresh_eta();
    train.timestamp = now;
    outcome
}

/// Round to whole metres so repeated subtraction does not drift.
fn round_km(km: f64) -> f64 {
    ((km * 1000.0).round() / 1000.0).max(0.0)
}

/// Periodic task driving [`advance`] against the shared store.
#[derive(Debug)]
pub struct TrainSimulator {
    store: Arc<StateStore>,
    config: TrainConfig,
    laps: u64,
}

impl TrainSimulator {
    /// Create a simulator over `store`.
    pub const fn new(store: Arc<StateStore>, config: TrainConfig) -> Self {
        Self {
            store,
            config,
            laps: 0,
        }
    }

    /// Laps completed since start.
    pub const fn laps(&self) -> u64 {
        self.laps
    }
}

impl Periodic for TrainSimulator {
    fn name(&self) -> &'static str {
        "train"
    }

    async fn tick(&mut self) {
        // Read the flag and release it before taking the train lock.
        let incident_active = self.store.incident_active().await;
        let config = &self.config;
        let (outcome, distance, speed) = self
            .store
            .update_train(|train| {
                let outcome = advance(train, incident_active, config, Utc::now());
                (outcome, train.distance_km, train.speed_kmh)
            })
            .await;

        if outcome == TickOutcome::LapCompleted {
            self.laps = self.laps.saturating_add(1);
            debug!(laps = self.laps, "train reached the crossing, new lap");
        } else {
            debug!(?outcome, distance, speed, "train tick");
        }
    }
}
