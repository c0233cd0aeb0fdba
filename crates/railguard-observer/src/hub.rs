//! Snapshot broadcast hub.
//!
//! The subscriber set is owned by a single actor task reached through a
//! bounded mailbox. [`SnapshotHub`] is the cloneable handle; every
//! operation is a [`Command`] processed in arrival order, so membership
//! needs no lock.
//!
//! Delivery never waits on a subscriber. Each [`SnapshotSink`] accepts a
//! batch without blocking: a full queue skips that batch for that
//! subscriber only, while a closed or failed sink is unregistered on the
//! spot and the fan-out carries on with the rest.
//!
//! [`SnapshotBroadcaster`] is the periodic producer. It copies a
//! [`Snapshot`] out of the store (one lock at a time, all released before
//! any send), encodes it once into an `Arc`-shared [`SnapshotBatch`] and
//! hands that to the hub.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::ws::Utf8Bytes;
use railguard_core::{Periodic, StateStore};
use railguard_types::{LiveMessage, Snapshot, SubscriberId};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Batches and sinks
// ---------------------------------------------------------------------------

/// One snapshot, pre-encoded as the live-update text frames to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotBatch {
    frames: Vec<Utf8Bytes>,
}

impl SnapshotBatch {
    /// Encode every live message for `snapshot`.
    ///
    /// # Errors
    ///
    /// Returns the JSON error if any message fails to serialize.
    pub fn encode(snapshot: &Snapshot) -> Result<Self, serde_json::Error> {
        let frames = LiveMessage::from_snapshot(snapshot)
            .iter()
            .map(|msg| serde_json::to_string(msg).map(Utf8Bytes::from))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { frames })
    }

    /// Encode a single out-of-band message, such as a detection.
    ///
    /// # Errors
    ///
    /// Returns the JSON error if the message fails to serialize.
    pub fn message(msg: &LiveMessage) -> Result<Self, serde_json::Error> {
        let frame = serde_json::to_string(msg).map(Utf8Bytes::from)?;
        Ok(Self {
            frames: vec![frame],
        })
    }

    /// Encoded frames in send order.
    pub fn frames(&self) -> &[Utf8Bytes] {
        &self.frames
    }
}

/// Outcome of a successful [`SnapshotSink::deliver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Batch queued for the subscriber.
    Queued,
    /// Subscriber is backed up; this batch was skipped.
    Skipped,
}

/// Why a sink can no longer accept batches.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The subscriber's connection task has gone away.
    #[error("subscriber closed")]
    Closed,

    /// The write itself failed.
    #[error("write failed: {0}")]
    Write(String),
}

/// Destination for snapshot batches. Implementations must not block.
pub trait SnapshotSink: Send + 'static {
    /// Offer one batch to the subscriber.
    fn deliver(&mut self, batch: &Arc<SnapshotBatch>) -> Result<Delivery, DeliveryError>;
}

/// Sink feeding a bounded queue drained by a connection task.
#[derive(Debug)]
pub struct QueueSink {
    tx: mpsc::Sender<Arc<SnapshotBatch>>,
}

impl QueueSink {
    /// Create a sink and the receiver its connection task drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Arc<SnapshotBatch>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl SnapshotSink for QueueSink {
    fn deliver(&mut self, batch: &Arc<SnapshotBatch>) -> Result<Delivery, DeliveryError> {
        match self.tx.try_send(Arc::clone(batch)) {
            Ok(()) => Ok(Delivery::Queued),
            Err(mpsc::error::TrySendError::Full(_)) => Ok(Delivery::Skipped),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(DeliveryError::Closed),
        }
    }
}

// ---------------------------------------------------------------------------
// Hub actor
// ---------------------------------------------------------------------------

/// The hub actor has stopped.
#[derive(Debug, thiserror::Error)]
#[error("snapshot hub is not running")]
pub struct HubClosed;

enum Command {
    Connect {
        id: SubscriberId,
        sink: Box<dyn SnapshotSink>,
        initial: Option<Arc<SnapshotBatch>>,
    },
    Disconnect(SubscriberId),
    Broadcast(Arc<SnapshotBatch>),
    Count(oneshot::Sender<usize>),
}

/// Cloneable handle to the snapshot hub actor.
#[derive(Debug, Clone)]
pub struct SnapshotHub {
    tx: mpsc::Sender<Command>,
}

impl SnapshotHub {
    /// Start the hub actor with a mailbox of `mailbox` commands.
    ///
    /// The actor exits once every handle has been dropped.
    pub fn spawn(mailbox: usize) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(mailbox.max(1));
        let join = tokio::spawn(run(rx));
        (Self { tx }, join)
    }

    /// Register `sink`, first handing it `initial` if given.
    ///
    /// A sink that fails the initial delivery is never registered.
    pub async fn connect(
        &self,
        sink: Box<dyn SnapshotSink>,
        initial: Option<Arc<SnapshotBatch>>,
    ) -> Result<SubscriberId, HubClosed> {
        let id = SubscriberId::new();
        self.tx
            .send(Command::Connect { id, sink, initial })
            .await
            .map_err(|_closed| HubClosed)?;
        Ok(id)
    }

    /// Unregister a subscriber. Unknown ids are ignored.
    pub async fn disconnect(&self, id: SubscriberId) {
        // Nothing to unregister from once the actor is gone.
        let _ = self.tx.send(Command::Disconnect(id)).await;
    }

    /// Fan `batch` out to every subscriber.
    pub async fn broadcast(&self, batch: Arc<SnapshotBatch>) -> Result<(), HubClosed> {
        self.tx
            .send(Command::Broadcast(batch))
            .await
            .map_err(|_closed| HubClosed)
    }

    /// Number of registered subscribers, after every earlier command has
    /// been applied.
    pub async fn subscriber_count(&self) -> usize {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Command::Count(reply)).await.is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

async fn run(mut rx: mpsc::Receiver<Command>) {
    let mut subscribers: BTreeMap<SubscriberId, Box<dyn SnapshotSink>> = BTreeMap::new();

    while let Some(command) = rx.recv().await {
        match command {
            Command::Connect {
                id,
                mut sink,
                initial,
            } => {
                if let Some(batch) = initial
                    && let Err(e) = sink.deliver(&batch)
                {
                    debug!(subscriber = %id, error = %e, "subscriber failed initial snapshot");
                    continue;
                }
                subscribers.insert(id, sink);
                debug!(subscriber = %id, subscribers = subscribers.len(), "subscriber connected");
            }
            Command::Disconnect(id) => {
                if subscribers.remove(&id).is_some() {
                    debug!(subscriber = %id, subscribers = subscribers.len(), "subscriber disconnected");
                }
            }
            Command::Broadcast(batch) => fan_out(&mut subscribers, &batch),
            Command::Count(reply) => {
                let _ = reply.send(subscribers.len());
            }
        }
    }

    debug!("snapshot hub stopped");
}

fn fan_out(subscribers: &mut BTreeMap<SubscriberId, Box<dyn SnapshotSink>>, batch: &Arc<SnapshotBatch>) {
    subscribers.retain(|id, sink| match sink.deliver(batch) {
        Ok(Delivery::Queued) => true,
        Ok(Delivery::Skipped) => {
            trace!(subscriber = %id, "subscriber backed up, snapshot skipped");
            true
        }
        Err(e) => {
            debug!(subscriber = %id, error = %e, "removing subscriber");
            false
        }
    });
}

// ---------------------------------------------------------------------------
// Broadcaster
// ---------------------------------------------------------------------------

/// Capture and encode the current state.
pub async fn capture(store: &StateStore) -> Result<Arc<SnapshotBatch>, serde_json::Error> {
    let snapshot = store.snapshot().await;
    SnapshotBatch::encode(&snapshot).map(Arc::new)
}

/// Periodic task pushing one snapshot per tick through the hub.
#[derive(Debug)]
pub struct SnapshotBroadcaster {
    store: Arc<StateStore>,
    hub: SnapshotHub,
}

impl SnapshotBroadcaster {
    /// Create a broadcaster reading `store` and feeding `hub`.
    pub const fn new(store: Arc<StateStore>, hub: SnapshotHub) -> Self {
        Self { store, hub }
    }
}

impl Periodic for SnapshotBroadcaster {
    fn name(&self) -> &'static str {
        "broadcast"
    }

    async fn tick(&mut self) {
        let batch = match capture(&self.store).await {
            Ok(batch) => batch,
            Err(e) => {
                warn!(error = %e, "failed to encode snapshot");
                return;
            }
        };
        if let Err(e) = self.hub.broadcast(batch).await {
            warn!(error = %e, "snapshot broadcast dropped");
        }
    }
}
