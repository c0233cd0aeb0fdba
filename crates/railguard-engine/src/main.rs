//! Engine binary for the RailGuard crossing monitor.
//!
//! Wires the simulation timers, the incident dispatcher, both broadcast
//! hubs and the observer API server together, then runs until Ctrl-C.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `railguard-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Build the shared state (store, dispatcher, hubs, topology)
//! 4. Start the periodic tasks: train, city, units, broadcast
//! 5. Start the observer API server
//! 6. Wait for Ctrl-C, then stop the server and every task

mod error;

use std::path::Path;
use std::sync::Arc;

use railguard_core::city::CityStateMachine;
use railguard_core::config::{LoggingConfig, RailguardConfig};
use railguard_core::hierarchy;
use railguard_core::train::TrainSimulator;
use railguard_core::units::UnitSimulator;
use railguard_core::{TaskHandle, spawn_periodic};
use railguard_observer::{AppState, SnapshotBroadcaster};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Config file looked up in the working directory.
const CONFIG_FILE: &str = "railguard-config.yaml";

/// Application entry point for the engine.
///
/// # Errors
///
/// Returns an error if configuration, startup or shutdown fails.
#[tokio::main]
async fn main() -> Result<(), EngineError> {
    // 1. Load configuration. Logging is not up yet, so remember the source.
    let (config, from_file) = load_config()?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!(from_file, path = CONFIG_FILE, "railguard-engine starting");
    info!(
        train_id = %config.train.train_id,
        train_tick_ms = config.train.tick_interval_ms,
        city_tick_ms = config.city.tick_interval_ms,
        units_tick_ms = config.units.tick_interval_ms,
        broadcast_tick_ms = config.broadcast.tick_interval_ms,
        dwell_ms = config.incident.dwell_ms,
        "Configuration loaded"
    );

    // 3. Shared state.
    let state = Arc::new(AppState::from_config(&config));
    info!(
        units = hierarchy::unit_ids(&state.topology).len(),
        region = %state.topology.id,
        "State store initialized"
    );

    // 4. Periodic tasks.
    let tasks: Vec<TaskHandle> = vec![
        spawn_periodic(
            TrainSimulator::new(Arc::clone(&state.store), config.train.clone()),
            config.train.tick_interval(),
        ),
        spawn_periodic(
            CityStateMachine::new(Arc::clone(&state.store), config.city.clone()),
            config.city.tick_interval(),
        ),
        spawn_periodic(
            UnitSimulator::new(
                Arc::clone(&state.store),
                hierarchy::unit_ids(&state.topology),
                config.units.seed,
            ),
            config.units.tick_interval(),
        ),
        spawn_periodic(
            SnapshotBroadcaster::new(Arc::clone(&state.store), state.snapshots.clone()),
            config.broadcast.tick_interval(),
        ),
    ];
    info!(tasks = tasks.len(), "Periodic tasks started");

    // 5. Observer API server.
    let observer = railguard_observer::spawn_observer(&config.server, Arc::clone(&state)).await?;
    info!(host = %config.server.host, port = config.server.port, "Observer API server started");

    // 6. Run until Ctrl-C.
    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    let served = observer.shutdown().await;
    state.incidents.cancel_pending().await;
    for task in tasks {
        let name = task.name();
        task.stop().await;
        info!(task = name, "Periodic task stopped");
    }
    if let Err(e) = &served {
        warn!(error = %e, "Observer server ended with an error");
    }
    served?;

    info!("railguard-engine shutdown complete");
    Ok(())
}

/// Install the tracing subscriber.
///
/// `RUST_LOG` wins over the configured level; `logging.json` switches to
/// JSON lines.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Load `railguard-config.yaml` from the working directory.
///
/// A missing file means defaults, still subject to env overrides.
fn load_config() -> Result<(RailguardConfig, bool), EngineError> {
    let config_path = Path::new(CONFIG_FILE);
    if config_path.exists() {
        Ok((RailguardConfig::from_file(config_path)?, true))
    } else {
        let mut config = RailguardConfig::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok((config, false))
    }
}
