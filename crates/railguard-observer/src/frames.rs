//! Frame broadcast hub for the MJPEG camera feed.
//!
//! One actor task owns the latest frame and every subscriber queue. A
//! published frame replaces the latest one and is offered to each
//! subscriber with `try_send`: a full queue drops that frame for that
//! subscriber only, so the publisher never waits on a slow viewer. A new
//! subscriber is handed the latest frame straight away.

use std::collections::BTreeMap;

use axum::body::Bytes;
use railguard_types::SubscriberId;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// MIME boundary separating MJPEG parts.
pub const BOUNDARY: &str = "frame";

/// The frame hub actor has stopped.
#[derive(Debug, thiserror::Error)]
#[error("frame hub is not running")]
pub struct FrameHubClosed;

#[derive(Debug)]
enum FrameCommand {
    Subscribe {
        id: SubscriberId,
        tx: mpsc::Sender<Bytes>,
    },
    Unsubscribe(SubscriberId),
    Publish(Bytes),
    Latest(oneshot::Sender<Option<Bytes>>),
    Count(oneshot::Sender<usize>),
}

/// Cloneable handle to the frame hub actor.
#[derive(Debug, Clone)]
pub struct FrameHub {
    tx: mpsc::Sender<FrameCommand>,
    queue: usize,
}

impl FrameHub {
    /// Start the hub actor.
    ///
    /// `queue` bounds each subscriber's backlog, `mailbox` the command
    /// mailbox.
    pub fn spawn(queue: usize, mailbox: usize) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(mailbox.max(1));
        let join = tokio::spawn(run(rx));
        (
            Self {
                tx,
                queue: queue.max(1),
            },
            join,
        )
    }

    /// Subscribe to the feed. The latest frame, if any, arrives first.
    pub async fn subscribe(&self) -> Result<FrameSubscription, FrameHubClosed> {
        let id = SubscriberId::new();
        let (tx, rx) = mpsc::channel(self.queue);
        self.tx
            .send(FrameCommand::Subscribe { id, tx })
            .await
            .map_err(|_closed| FrameHubClosed)?;
        Ok(FrameSubscription {
            id,
            rx,
            hub: self.tx.clone(),
        })
    }

    /// Close a subscriber's queue. Unknown ids are ignored.
    pub async fn unsubscribe(&self, id: SubscriberId) {
        let _ = self.tx.send(FrameCommand::Unsubscribe(id)).await;
    }

    /// Replace the latest frame and offer it to every subscriber.
    pub async fn publish(&self, frame: Bytes) -> Result<(), FrameHubClosed> {
        self.tx
            .send(FrameCommand::Publish(frame))
            .await
            .map_err(|_closed| FrameHubClosed)
    }

    /// The most recently published frame.
    pub async fn latest(&self) -> Option<Bytes> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(FrameCommand::Latest(reply)).await.ok()?;
        rx.await.ok().flatten()
    }

    /// Number of live subscribers, after every earlier command has been
    /// applied.
    pub async fn subscriber_count(&self) -> usize {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(FrameCommand::Count(reply)).await.is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

/// One viewer's bounded frame queue.
///
/// Dropping the subscription unregisters it from the hub.
#[derive(Debug)]
pub struct FrameSubscription {
    id: SubscriberId,
    rx: mpsc::Receiver<Bytes>,
    hub: mpsc::Sender<FrameCommand>,
}

impl FrameSubscription {
    /// Subscriber id.
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next frame. `None` once the hub has closed the queue.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Take a queued frame without waiting.
    pub fn try_recv(&mut self) -> Option<Bytes> {
        self.rx.try_recv().ok()
    }
}

impl Drop for FrameSubscription {
    fn drop(&mut self) {
        // Best effort; a full mailbox leaves it to the next publish to prune.
        let _ = self.hub.try_send(FrameCommand::Unsubscribe(self.id));
    }
}

async fn run(mut rx: mpsc::Receiver<FrameCommand>) {
    let mut latest: Option<Bytes> = None;
    let mut subscribers: BTreeMap<SubscriberId, mpsc::Sender<Bytes>> = BTreeMap::new();

    while let Some(command) = rx.recv().await {
        match command {
            FrameCommand::Subscribe { id, tx } => {
                if let Some(frame) = &latest {
                    // Fresh queue, cannot be full.
                    let _ = tx.try_send(frame.clone());
                }
                subscribers.insert(id, tx);
                debug!(subscriber = %id, viewers = subscribers.len(), "frame viewer connected");
            }
            FrameCommand::Unsubscribe(id) => {
                if subscribers.remove(&id).is_some() {
                    debug!(subscriber = %id, viewers = subscribers.len(), "frame viewer disconnected");
                }
            }
            FrameCommand::Publish(frame) => {
                subscribers.retain(|id, tx| match tx.try_send(frame.clone()) {
                    Ok(()) => true,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        trace!(subscriber = %id, "viewer backed up, frame dropped");
                        true
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        debug!(subscriber = %id, "pruning closed frame viewer");
                        false
                    }
                });
                latest = Some(frame);
            }
            FrameCommand::Latest(reply) => {
                let _ = reply.send(latest.clone());
            }
            FrameCommand::Count(reply) => {
                let _ = reply.send(subscribers.len());
            }
        }
    }

    debug!("frame hub stopped");
}

/// Wrap one JPEG as a `multipart/x-mixed-replace` part.
pub fn encode_part(frame: &[u8]) -> Bytes {
    let header = format!(
        "--{BOUNDARY}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        frame.len()
    );
    let mut part = Vec::with_capacity(header.len().saturating_add(frame.len()).saturating_add(2));
    part.extend_from_slice(header.as_bytes());
    part.extend_from_slice(frame);
    part.extend_from_slice(b"\r\n");
    Bytes::from(part)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn frame(tag: u8) -> Bytes {
        Bytes::from(vec![0xFF, 0xD8, tag, 0xFF, 0xD9])
    }

    #[tokio::test]
    async fn full_queue_drops_frame_for_that_viewer_only() {
        let (hub, _join) = FrameHub::spawn(1, 8);
        let mut slow = hub.subscribe().await.ok();
        let mut fast = hub.subscribe().await.ok();
        assert!(slow.is_some() && fast.is_some());

        assert!(hub.publish(frame(1)).await.is_ok());
        let first = match fast.as_mut() {
            Some(sub) => sub.recv().await,
            None => None,
        };
        assert_eq!(first, Some(frame(1)));

        // `slow` still holds frame 1, so frame 2 is dropped for it.
        assert!(hub.publish(frame(2)).await.is_ok());
        assert_eq!(hub.subscriber_count().await, 2);

        assert_eq!(fast.as_mut().and_then(FrameSubscription::try_recv), Some(frame(2)));
        assert_eq!(slow.as_mut().and_then(FrameSubscription::try_recv), Some(frame(1)));
        assert_eq!(slow.as_mut().and_then(FrameSubscription::try_recv), None);
    }

    #[tokio::test]
    async fn publish_never_blocks_on_stuck_viewers() {
        let (hub, _join) = FrameHub::spawn(1, 8);
        let _stuck: Vec<_> = futures::future::join_all((0..4).map(|_| hub.subscribe())).await;

        let published = tokio::time::timeout(Duration::from_secs(1), async {
            for tag in 0..100_u8 {
                if hub.publish(frame(tag)).await.is_err() {
                    return false;
                }
            }
            true
        })
        .await;
        assert_eq!(published.ok(), Some(true));
        assert_eq!(hub.latest().await, Some(frame(99)));
    }

    #[tokio::test]
    async fn late_viewer_gets_latest_frame_immediately() {
        let (hub, _join) = FrameHub::spawn(4, 8);
        assert!(hub.latest().await.is_none());
        assert!(hub.publish(frame(7)).await.is_ok());

        let mut sub = hub.subscribe().await.ok();
        let got = match sub.as_mut() {
            Some(sub) => sub.recv().await,
            None => None,
        };
        assert_eq!(got, Some(frame(7)));
    }

    #[tokio::test]
    async fn dropping_subscription_unregisters() {
        let (hub, _join) = FrameHub::spawn(4, 8);
        let sub = hub.subscribe().await;
        assert_eq!(hub.subscriber_count().await, 1);
        drop(sub);
        assert_eq!(hub.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn unsubscribe_closes_the_queue() {
        let (hub, _join) = FrameHub::spawn(4, 8);
        let mut sub = hub.subscribe().await.ok();
        if let Some(id) = sub.as_ref().map(FrameSubscription::id) {
            hub.unsubscribe(id).await;
        }
        let next = match sub.as_mut() {
            Some(sub) => sub.recv().await,
            None => Some(frame(0)),
        };
        assert!(next.is_none());
    }

    #[test]
    fn part_framing() {
        let part = encode_part(b"JPEG");
        assert_eq!(
            &*part,
            b"--frame\r\nContent-Type: image/jpeg\r\nContent-Length: 4\r\n\r\nJPEG\r\n"
        );
    }
}
