//! Shared application state for the observer API server.
//!
//! [`AppState`] bundles handles to everything the HTTP layer touches: the
//! state store, the incident dispatcher, both broadcast hubs and the static
//! topology. The periodic simulation tasks share the same store, so REST
//! reads always see live values.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use railguard_core::hierarchy;
use railguard_core::{IncidentDispatcher, RailguardConfig, StateStore};
use railguard_types::Region;

use crate::frames::FrameHub;
use crate::hub::SnapshotHub;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Live simulation state.
    pub store: Arc<StateStore>,
    /// Incident ingestion and auto-clear.
    pub incidents: Arc<IncidentDispatcher>,
    /// Live-update fan-out.
    pub snapshots: SnapshotHub,
    /// Camera frame fan-out.
    pub frames: FrameHub,
    /// Static organisation topology.
    pub topology: Arc<Region>,
    /// Per-connection live-update queue length.
    pub subscriber_queue: usize,
    /// Largest accepted frame upload, in bytes.
    pub max_frame_bytes: usize,
    /// Server start time.
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Build the store, dispatcher and both hubs from `config`.
    ///
    /// Spawns the hub actors, so it must run inside a Tokio runtime.
    pub fn from_config(config: &RailguardConfig) -> Self {
        let topology = hierarchy::default_topology();
        let store = Arc::new(StateStore::from_config(
            config,
            hierarchy::unit_ids(&topology),
        ));
        let incidents = Arc::new(IncidentDispatcher::new(
            Arc::clone(&store),
            config.train.clone(),
            &config.incident,
        ));
        let (snapshots, _) = SnapshotHub::spawn(config.broadcast.mailbox);
        let (frames, _) = FrameHub::spawn(config.frames.subscriber_queue, config.frames.mailbox);

        Self {
            store,
            incidents,
            snapshots,
            frames,
            topology: Arc::new(topology),
            subscriber_queue: config.broadcast.subscriber_queue,
            max_frame_bytes: config.frames.max_frame_bytes,
            started_at: Utc::now(),
        }
    }
}
