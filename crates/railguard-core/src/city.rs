//! City response state machine.
//!
//! Maps `(distance, incident flag)` onto one of five posture tiers through an
//! ordered cascade; the first matching branch wins:
//!
//! | # | Condition | Tier |
//! |---|-----------|------|
//! | 1 | incident active | `INCIDENT` (maximum alert) |
//! | 2 | distance ≤ critical | `CRITICAL` (maximum alert) |
//! | 3 | distance ≤ warning | `WARNING` (partial alert) |
//! | 4 | distance ≤ caution | `CAUTION` (traffic clearing) |
//! | 5 | otherwise | `NORMAL` |
//!
//! Each tier has exactly one posture; every tick rewrites the whole
//! [`CityStatus`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use railguard_types::{
    CityStatus, CrossingGate, Dispatch, EvacuationRoute, ResponseTier, Siren, TrafficLight,
};
use tracing::info;

use crate::config::CityConfig;
use crate::schedule::Periodic;
use crate::store::StateStore;

/// Pick the posture tier for a distance and incident flag.
pub fn evaluate(distance_km: f64, incident_active: bool, config: &CityConfig) -> ResponseTier {
    if incident_active {
        ResponseTier::Incident
    } else if distance_km <= config.critical_km {
        ResponseTier::Critical
    } else if distance_km <= config.warning_km {
        ResponseTier::Warning
    } else if distance_km <= config.caution_km {
        ResponseTier::Caution
    } else {
        ResponseTier::Normal
    }
}

/// The full city posture for a tier, stamped with `now`.
pub const fn posture(tier: ResponseTier, now: DateTime<Utc>) -> CityStatus {
    let (traffic_light, ambulance, police, evacuation_route, siren, rail_crossing) = match tier {
        ResponseTier::Incident | ResponseTier::Critical => (
            TrafficLight::RedLock,
            Dispatch::Dispatched,
            Dispatch::Dispatched,
            EvacuationRoute::Closed,
            Siren::Critical,
            CrossingGate::Closed,
        ),
        ResponseTier::Warning => (
            TrafficLight::RedLock,
            Dispatch::Standby,
            Dispatch::Dispatched,
            EvacuationRoute::Open,
            Siren::Critical,
            CrossingGate::Closed,
        ),
        ResponseTier::Caution => (
            TrafficLight::GreenWave,
            Dispatch::Standby,
            Dispatch::Standby,
            EvacuationRoute::Open,
            Siren::Warning,
            CrossingGate::Closing,
        ),
        ResponseTier::Normal => (
            TrafficLight::Normal,
            Dispatch::Standby,
            Dispatch::Standby,
            EvacuationRoute::Open,
            Siren::Off,
            CrossingGate::Open,
        ),
    };

    CityStatus {
        tier,
        traffic_light,
        ambulance,
        police,
        evacuation_route,
        siren,
        rail_crossing,
        last_update: now,
    }
}

/// Periodic task recomputing the city posture from the store.
#[derive(Debug)]
pub struct CityStateMachine {
    store: Arc<StateStore>,
    config: CityConfig,
    last_tier: Option<ResponseTier>,
}

impl CityStateMachine {
    /// Create a state machine over `store`.
    pub const fn new(store: Arc<StateStore>, config: CityConfig) -> Self {
        Self {
            store,
            config,
            last_tier: None,
        }
    }
}

impl Periodic for CityStateMachine {
    fn name(&self) -> &'static str {
        "city"
    }

    async fn tick(&mut self) {
        // Each read releases its lock before the city lock is taken.
        let distance = self.store.train_distance().await;
        let incident_active = self.store.incident_active().await;

        let tier = evaluate(distance, incident_active, &self.config);
        self.store.replace_city(posture(tier, Utc::now())).await;

        if self.last_tier != Some(tier) {
            info!(
                ?tier,
                maximum_alert = tier.is_maximum(),
                distance,
                incident_active,
                "city posture changed"
            );
            self.last_tier = Some(tier);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RailguardConfig;

    #[test]
    fn safe_distance_does_not_shift_the_normal_tier() {
        let config = CityConfig {
            safe_km: 50.0,
            ..CityConfig::default()
        };
        assert_eq!(evaluate(3.01, false, &config), ResponseTier::Normal);
        assert_eq!(evaluate(49.0, false, &config), ResponseTier::Normal);
        assert_eq!(evaluate(3.0, false, &config), ResponseTier::Caution);
    }

    #[test]
    fn boundaries_are_inclusive_on_the_strict_side() {
        let config = CityConfig::default();
        assert_eq!(evaluate(0.5, false, &config), ResponseTier::Critical);
        assert_eq!(evaluate(0.51, false, &config), ResponseTier::Warning);
        assert_eq!(evaluate(1.5, false, &config), ResponseTier::Warning);
        assert_eq!(evaluate(1.51, false, &config), ResponseTier::Caution);
        assert_eq!(evaluate(3.0, false, &config), ResponseTier::Caution);
        assert_eq!(evaluate(3.01, false, &config), ResponseTier::Normal);
        assert_eq!(evaluate(5.0, false, &config), ResponseTier::Normal);
        assert_eq!(evaluate(42.0, false, &config), ResponseTier::Normal);
        assert_eq!(evaluate(0.0, false, &config), ResponseTier::Critical);
    }

    #[test]
    fn incident_overrides_any_distance() {
        let config = CityConfig::default();
        for distance in [0.0, 0.5, 1.0, 2.0, 4.0, 10.0, 100.0] {
            let tier = evaluate(distance, true, &config);
            assert_eq!(tier, ResponseTier::Incident);
            let status = posture(tier, Utc::now());
            assert_eq!(status.traffic_light, TrafficLight::RedLock);
            assert_eq!(status.ambulance, Dispatch::Dispatched);
            assert_eq!(status.police, Dispatch::Dispatched);
            assert_eq!(status.evacuation_route, EvacuationRoute::Closed);
            assert_eq!(status.siren, Siren::Critical);
            assert_eq!(status.rail_crossing, CrossingGate::Closed);
        }
    }

    #[test]
    fn severity_never_drops_as_the_train_approaches() {
        let config = CityConfig::default();
        let mut previous = ResponseTier::Normal;
        let mut distance: f64 = 10.0;
        while distance >= 0.0 {
            let tier = evaluate(distance, false, &config);
            assert!(tier >= previous, "tier dropped at {distance}");
            previous = tier;
            distance -= 0.05;
        }
        assert_eq!(previous, ResponseTier::Critical);
    }

    #[test]
    fn critical_and_incident_share_the_maximum_posture() {
        let now = Utc::now();
        let mut critical = posture(ResponseTier::Critical, now);
        let incident = posture(ResponseTier::Incident, now);
        critical.tier = ResponseTier::Incident;
        assert_eq!(critical, incident);
    }

    #[test]
    fn partial_alert_keeps_evacuation_open() {
        let status = posture(ResponseTier::Warning, Utc::now());
        assert_eq!(status.police, Dispatch::Dispatched);
        assert_eq!(status.ambulance, Dispatch::Standby);
        assert_eq!(status.rail_crossing, CrossingGate::Closed);
        assert_eq!(status.evacuation_route, EvacuationRoute::Open);
    }

    #[test]
    fn clearing_tier_starts_green_wave() {
        let status = posture(ResponseTier::Caution, Utc::now());
        assert_eq!(status.traffic_light, TrafficLight::GreenWave);
        assert_eq!(status.rail_crossing, CrossingGate::Closing);
        assert_eq!(status.siren, Siren::Warning);
        assert_eq!(status.ambulance, Dispatch::Standby);
        assert_eq!(status.police, Dispatch::Standby);
    }

    #[tokio::test]
    async fn tick_rewrites_city_from_store() {
        let config = RailguardConfig::default();
        let store = Arc::new(StateStore::from_config(&config, Vec::new()));
        let mut machine = CityStateMachine::new(Arc::clone(&store), config.city.clone());

        store.update_train(|t| t.distance_km = 1.2).await;
        machine.tick().await;
        assert_eq!(store.city().await.tier, ResponseTier::Warning);

        store.update_incident(|f| f.active = true).await;
        machine.tick().await;
        assert_eq!(store.city().await.tier, ResponseTier::Incident);

        store.update_incident(|f| f.active = false).await;
        machine.tick().await;
        assert_eq!(store.city().await.tier, ResponseTier::Warning);
    }

    #[tokio::test]
    async fn every_tick_stamps_last_update() {
        let config = RailguardConfig::default();
        let store = Arc::new(StateStore::from_config(&config, Vec::new()));
        let mut machine = CityStateMachine::new(Arc::clone(&store), config.city.clone());

        let before = store.city().await.last_update;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        machine.tick().await;
        assert!(store.city().await.last_update > before);
    }
}
