//! Unit status simulator.
//!
//! Every tick picks one known unit uniformly at random and one status from
//! a weighted candidate list (3 `ONLINE` : 1 `WARNING` : 1 `OFFLINE`), then
//! overwrites that unit's entry. Ticks are independent of each other and of
//! the train. Purely cosmetic: it keeps the dashboard's unit tree alive.

use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use railguard_types::UnitStatus;
use tracing::{debug, info};

use crate::schedule::Periodic;
use crate::store::StateStore;

/// Weighted candidate list: each entry is equally likely.
const STATUS_CANDIDATES: [UnitStatus; 5] = [
    UnitStatus::Online,
    UnitStatus::Online,
    UnitStatus::Online,
    UnitStatus::Warning,
    UnitStatus::Offline,
];

/// Periodic task perturbing unit statuses.
#[derive(Debug)]
pub struct UnitSimulator {
    store: Arc<StateStore>,
    unit_ids: Vec<String>,
    rng: StdRng,
}

impl UnitSimulator {
    /// Create a simulator over `unit_ids`.
    ///
    /// With `seed` the sequence of picks is reproducible; without it the
    /// RNG is seeded from the OS.
    pub fn new(store: Arc<StateStore>, unit_ids: Vec<String>, seed: Option<u64>) -> Self {
        let rng = seed.map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
        Self {
            store,
            unit_ids,
            rng,
        }
    }

    /// Draw the next `(unit, status)` pair, `None` when no units are known.
    pub fn pick(&mut self) -> Option<(String, UnitStatus)> {
        let unit = self.unit_ids.choose(&mut self.rng)?.clone();
        let status = *STATUS_CANDIDATES.choose(&mut self.rng)?;
        Some((unit, status))
    }
}

impl Periodic for UnitSimulator {
    fn name(&self) -> &'static str {
        "units"
    }

    async fn tick(&mut self) {
        let Some((unit, status)) = self.pick() else {
            debug!("no units to perturb");
            return;
        };

        match self.store.set_unit_status(&unit, status).await {
            Some(previous) => info!(%unit, ?previous, ?status, "unit status changed"),
            None => debug!(%unit, ?status, "unit status unchanged"),
        }
    }
}
