//! Simulation state, timers, and incident handling for the RailGuard
//! crossing monitor.
//!
//! Every piece of live state sits in one [`StateStore`]. Independent
//! periodic tasks mutate it on their own timers:
//!
//! - [`train`] -- moves the train toward the crossing, brakes during an
//!   incident, wraps the lap on arrival.
//! - [`city`] -- derives the five-tier city posture from distance and the
//!   incident flag.
//! - [`units`] -- randomly perturbs CCTV unit statuses.
//!
//! Supporting modules:
//!
//! - [`config`] -- Configuration loading from `railguard-config.yaml`.
//! - [`schedule`] -- [`Periodic`] trait and stoppable task handles.
//! - [`incident`] -- Report validation and the cancellable auto-clear.
//! - [`hierarchy`] -- DAOP topology and role-scoped views.
//!
//! [`StateStore`]: store::StateStore
//! [`Periodic`]: schedule::Periodic

pub mod city;
pub mod config;
pub mod hierarchy;
pub mod incident;
pub mod schedule;
pub mod store;
pub mod train;
pub mod units;

pub use config::RailguardConfig;
pub use incident::{Accepted, IncidentAck, IncidentDispatcher, IncidentError};
pub use schedule::{Periodic, TaskHandle, spawn_periodic};
pub use store::StateStore;
