//! HTTP, `WebSocket` and MJPEG surface for the RailGuard crossing monitor.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **`WebSocket` endpoint** (`/ws`) pushing a welcome message, an
//!   immediate snapshot, then one snapshot per broadcast tick, plus a
//!   `detection` message for each accepted incident
//! - **MJPEG endpoint** (`/stream/cam1`) replaying uploaded camera frames
//! - **REST endpoints** for train, city, unit, incident, history and
//!   hierarchy queries plus incident and frame ingestion
//!
//! # Architecture
//!
//! Two mailbox actors own all subscriber bookkeeping: the
//! [`SnapshotHub`](hub::SnapshotHub) for live updates and the
//! [`FrameHub`](frames::FrameHub) for camera frames. Producers hand them
//! work and move on; neither hub ever waits on a subscriber.

pub mod error;
pub mod frames;
pub mod handlers;
pub mod hub;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod stream;
pub mod ws;

// Re-export primary types for convenience.
pub use frames::{FrameHub, FrameSubscription};
pub use hub::{SnapshotBroadcaster, SnapshotHub};
pub use router::build_router;
pub use server::ServerError;
pub use startup::{ObserverHandle, StartupError, spawn_observer};
pub use state::AppState;
