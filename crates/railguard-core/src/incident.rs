//! Incident ingestion.
//!
//! An accepted [`IncidentReport`] arms the incident override:
//!
//! 1. the incident flag is set (keyed by a fresh [`IncidentId`]),
//! 2. the train is forced to `CRITICAL` / `EMERGENCY_DISPATCH`,
//! 3. a deferred clear is scheduled one dwell time later.
//!
//! Only one clear is ever pending. A new incident aborts the previous clear
//! and schedules its own, so the most recent incident governs how long the
//! override lasts. The clear task also checks that the flag still carries
//! its incident id before touching anything.
//!
//! Reports are validated before any state is touched; a malformed report
//! has no effect at all.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use railguard_types::{IncidentFlag, IncidentId, IncidentReport, TrainStatus};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{IncidentConfig, TrainConfig};
use crate::store::StateStore;
use crate::train;

/// Report kind used when the sender leaves `type` empty.
pub const DEFAULT_REPORT_KIND: &str = "detection";

/// Errors raised by incident ingestion.
#[derive(Debug, thiserror::Error)]
pub enum IncidentError {
    /// The report failed validation; nothing was changed.
    #[error("invalid incident report: {0}")]
    InvalidReport(String),
}

/// Acknowledgement returned for an accepted report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncidentAck {
    /// Always `"ok"`.
    pub status: &'static str,
    /// Kind of the accepted report.
    pub received: String,
    /// Identifier assigned to the incident.
    pub incident_id: IncidentId,
    /// Detection time (as sent, or time of receipt).
    pub timestamp: DateTime<Utc>,
    /// When the override is due to clear.
    pub clears_at: Option<DateTime<Utc>>,
}

/// A report the dispatcher accepted, with its acknowledgement.
#[derive(Debug, Clone, PartialEq)]
pub struct Accepted {
    /// Reply for the submitter.
    pub ack: IncidentAck,
    /// The report as stored, defaults filled in.
    pub report: IncidentReport,
}

/// Check a report without changing anything.
pub fn validate(report: &IncidentReport) -> Result<(), IncidentError> {
    if report.object_class.trim().is_empty() {
        return Err(IncidentError::InvalidReport(
            "object_class must not be empty".to_owned(),
        ));
    }
    if !report.confidence.is_finite() || !(0.0..=1.0).contains(&report.confidence) {
        return Err(IncidentError::InvalidReport(format!(
            "confidence must be within 0.0..=1.0, got {}",
            report.confidence
        )));
    }
    if let Some(duration) = report.duration_seconds
        && (!duration.is_finite() || duration < 0.0)
    {
        return Err(IncidentError::InvalidReport(format!(
            "duration_seconds must be a non-negative number, got {duration}"
        )));
    }
    Ok(())
}

/// Fill in the defaults the sender may omit.
fn normalize(mut report: IncidentReport, now: DateTime<Utc>) -> IncidentReport {
    if report.kind.trim().is_empty() {
        DEFAULT_REPORT_KIND.clone_into(&mut report.kind);
    }
    report.timestamp.get_or_insert(now);
    report
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// Bounded in-memory log of accepted reports, oldest evicted first.
#[derive(Debug)]
pub struct IncidentHistory {
    items: RwLock<VecDeque<IncidentReport>>,
    capacity: usize,
}

impl IncidentHistory {
    /// Create an empty history holding at most `capacity` reports.
    ///
    /// A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    /// Append a report, evicting the oldest when full.
    pub async fn push(&self, report: IncidentReport) {
        let mut items = self.items.write().await;
        if items.len() >= self.capacity {
            items.pop_front();
        }
        items.push_back(report);
    }

    /// The most recent `limit` reports, oldest first.
    pub async fn recent(&self, limit: usize) -> Vec<IncidentReport> {
        let items = self.items.read().await;
        let skip = items.len().saturating_sub(limit);
        items.iter().skip(skip).cloned().collect()
    }

    /// Number of stored reports.
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    /// Whether no report has been stored.
    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct PendingClear {
    incident_id: IncidentId,
    handle: JoinHandle<()>,
}

/// Accepts incident reports and owns the single pending auto-clear.
#[derive(Debug)]
pub struct IncidentDispatcher {
    store: Arc<StateStore>,
    train: TrainConfig,
    dwell: Duration,
    pending: Mutex<Option<PendingClear>>,
    history: IncidentHistory,
}

impl IncidentDispatcher {
    /// Create a dispatcher over `store`.
    pub fn new(store: Arc<StateStore>, train: TrainConfig, config: &IncidentConfig) -> Self {
        Self {
            store,
            train,
            dwell: config.dwell(),
            pending: Mutex::new(None),
            history: IncidentHistory::new(config.history_capacity),
        }
    }

    /// Accepted reports, newest last.
    pub const fn history(&self) -> &IncidentHistory {
        &self.history
    }

    /// Configured dwell time.
    pub const fn dwell(&self) -> Duration {
        self.dwell
    }

    /// Incident whose clear is still pending, if any.
    pub async fn pending_clear(&self) -> Option<IncidentId> {
        self.pending
            .lock()
            .await
            .as_ref()
            .filter(|p| !p.handle.is_finished())
            .map(|p| p.incident_id)
    }

    /// Validate and apply a report.
    ///
    /// # Errors
    ///
    /// Returns [`IncidentError::InvalidReport`] without touching any state
    /// if the report is malformed.
    pub async fn ingest(&self, report: IncidentReport) -> Result<Accepted, IncidentError> {
        validate(&report)?;

        let now = Utc::now();
        let report = normalize(report, now);
        let incident_id = IncidentId::new();
        let clears_at = TimeDelta::from_std(self.dwell)
            .ok()
            .and_then(|d| now.checked_add_signed(d));

        // Held until the clear is armed so the flag and the pending clear
        // always name the same incident.
        let mut pending = self.pending.lock().await;
        self.store
            .update_incident(|flag| {
                *flag = IncidentFlag {
                    active: true,
                    incident_id: Some(incident_id),
                    activated_at: Some(now),
                    clears_at,
                };
            })
            .await;

        self.store
            .update_train(|t| {
                t.set_status(TrainStatus::Critical);
                t.timestamp = now;
            })
            .await;

        self.arm_clear(&mut pending, incident_id);
        drop(pending);

        info!(
            %incident_id,
            kind = %report.kind,
            object_class = %report.object_class,
            confidence = report.confidence,
            in_roi = report.in_roi,
            "incident override armed"
        );

        let ack = IncidentAck {
            status: "ok",
            received: report.kind.clone(),
            incident_id,
            timestamp: report.timestamp.unwrap_or(now),
            clears_at,
        };
        self.history.push(report.clone()).await;
        Ok(Accepted { ack, report })
    }

    /// Replace any pending clear with one for `incident_id`.
    fn arm_clear(&self, pending: &mut Option<PendingClear>, incident_id: IncidentId) {
        if let Some(previous) = pending.take() {
            previous.handle.abort();
            debug!(
                previous = %previous.incident_id,
                next = %incident_id,
                "pending incident clear superseded"
            );
        }

        let handle = tokio::spawn(clear_after(
            Arc::clone(&self.store),
            self.train.clone(),
            incident_id,
            self.dwell,
        ));
        *pending = Some(PendingClear {
            incident_id,
            handle,
        });
    }

    /// Abort the pending clear, leaving the flag as it is.
    pub async fn cancel_pending(&self) {
        if let Some(previous) = self.pending.lock().await.take() {
            previous.handle.abort();
        }
    }
}

/// Sleep out the dwell, then clear the flag if it still belongs to us.
async fn clear_after(
    store: Arc<StateStore>,
    train_config: TrainConfig,
    incident_id: IncidentId,
    dwell: Duration,
) {
    tokio::time::sleep(dwell).await;

    let cleared = store
        .update_incident(|flag| {
            if flag.active && flag.incident_id == Some(incident_id) {
                *flag = IncidentFlag::default();
                true
            } else {
                false
            }
        })
        .await;

    if !cleared {
        warn!(%incident_id, "incident clear fired for a flag it no longer owns");
        return;
    }

    store
        .update_train(|t| train::reset_lap(t, &train_config, Utc::now()))
        .await;
    info!(%incident_id, "incident override cleared, train reset");
}

#[cfg(test)]
mod tests {
    use railguard_types::TrainStatus;

    use super::*;
    use crate::config::RailguardConfig;

    fn report() -> IncidentReport {
        IncidentReport {
            kind: String::from("OBSTACLE_STUCK"),
            object_class: String::from("car"),
            confidence: 0.87,
            in_roi: true,
            object_id: Some(4),
            duration_seconds: Some(6.5),
            timestamp: None,
            camera_id: Some(String::from("CCTV-JBG-01")),
            detail: None,
            image_url: None,
        }
    }

    fn dispatcher() -> (Arc<StateStore>, IncidentDispatcher) {
        let config = RailguardConfig::default();
        let store = Arc::new(StateStore::from_config(&config, Vec::new()));
        let dispatcher =
            IncidentDispatcher::new(Arc::clone(&store), config.train.clone(), &config.incident);
        (store, dispatcher)
    }

    #[test]
    fn validation_rejects_bad_reports() {
        let mut bad = report();
        bad.object_class = String::from("  ");
        assert!(validate(&bad).is_err());

        let mut bad = report();
        bad.confidence = 1.5;
        assert!(validate(&bad).is_err());

        let mut bad = report();
        bad.confidence = f64::NAN;
        assert!(validate(&bad).is_err());

        let mut bad = report();
        bad.duration_seconds = Some(-1.0);
        assert!(validate(&bad).is_err());

        assert!(validate(&report()).is_ok());
    }

    #[test]
    fn normalize_fills_defaults() {
        let now = Utc::now();
        let mut raw = report();
        raw.kind = String::new();
        let normalized = normalize(raw, now);
        assert_eq!(normalized.kind, DEFAULT_REPORT_KIND);
        assert_eq!(normalized.timestamp, Some(now));
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_report_changes_nothing() {
        let (store, dispatcher) = dispatcher();
        let before = store.snapshot().await;

        let mut bad = report();
        bad.confidence = -0.1;
        let result = dispatcher.ingest(bad).await;
        assert!(matches!(result, Err(IncidentError::InvalidReport(_))));

        let after = store.snapshot().await;
        assert_eq!(after.train, before.train);
        assert_eq!(after.incident, before.incident);
        assert!(dispatcher.history().is_empty().await);
        assert!(dispatcher.pending_clear().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn ingest_arms_override() {
        let (store, dispatcher) = dispatcher();
        let accepted = dispatcher.ingest(report()).await;
        assert!(accepted.is_ok());
        let ack = accepted.ok().map(|a| a.ack);

        let flag = store.incident().await;
        assert!(flag.active);
        assert_eq!(flag.incident_id, ack.as_ref().map(|a| a.incident_id));

        let train = store.train().await;
        assert_eq!(train.status, TrainStatus::Critical);
        assert_eq!(train.city_action, "EMERGENCY_DISPATCH");

        assert_eq!(dispatcher.history().len().await, 1);
        assert_eq!(
            dispatcher.pending_clear().await,
            ack.as_ref().map(|a| a.incident_id)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn override_clears_after_dwell() {
        let (store, dispatcher) = dispatcher();
        store.update_train(|t| t.distance_km = 2.0).await;
        assert!(dispatcher.ingest(report()).await.is_ok());

        tokio::time::sleep(Duration::from_millis(7_900)).await;
        assert!(store.incident_active().await);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!store.incident_active().await);
        let train = store.train().await;
        assert!((train.distance_km - 10.0).abs() < f64::EPSILON);
        assert!((train.speed_kmh - 80.0).abs() < f64::EPSILON);
        assert_eq!(train.status, TrainStatus::Safe);
        assert!(dispatcher.pending_clear().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn latest_incident_governs_the_dwell() {
        let (store, dispatcher) = dispatcher();
        assert!(dispatcher.ingest(report()).await.is_ok());

        tokio::time::sleep(Duration::from_secs(5)).await;
        let second = dispatcher.ingest(report()).await.ok().map(|a| a.ack.incident_id);
        assert_eq!(dispatcher.pending_clear().await, second);

        // The first incident's clear would have fired at 8s.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(store.incident_active().await);
        assert_eq!(store.incident().await.incident_id, second);

        tokio::time::sleep(Duration::from_millis(3_100)).await;
        assert!(!store.incident_active().await);
        assert_eq!(dispatcher.history().len().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_pending_keeps_flag() {
        let (store, dispatcher) = dispatcher();
        assert!(dispatcher.ingest(report()).await.is_ok());
        dispatcher.cancel_pending().await;

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(store.incident_active().await);
        assert!(dispatcher.pending_clear().await.is_none());
    }

    #[tokio::test]
    async fn history_evicts_oldest() {
        let history = IncidentHistory::new(3);
        for i in 0..5_i64 {
            let mut r = report();
            r.object_id = Some(i);
            history.push(r).await;
        }
        assert_eq!(history.len().await, 3);
        let ids: Vec<Option<i64>> = history.recent(10).await.iter().map(|r| r.object_id).collect();
        assert_eq!(ids, vec![Some(2), Some(3), Some(4)]);
        let last: Vec<Option<i64>> = history.recent(1).await.iter().map(|r| r.object_id).collect();
        assert_eq!(last, vec![Some(4)]);
    }

    #[tokio::test]
    async fn zero_capacity_history_keeps_the_latest_report() {
        let history = IncidentHistory::new(0);
        for i in 0..3_i64 {
            let mut r = report();
            r.object_id = Some(i);
            tokio::time::timeout(Duration::from_secs(1), history.push(r))
                .await
                .unwrap_or_else(|_| panic!("push {i} did not return"));
        }
        assert_eq!(history.len().await, 1);
        let ids: Vec<Option<i64>> = history.recent(10).await.iter().map(|r| r.object_id).collect();
        assert_eq!(ids, vec![Some(2)]);
    }
}
