//! `WebSocket` handler for live updates.
//!
//! Clients connect to `GET /ws` and receive a `welcome` message, then the
//! current state straight away, then one snapshot per broadcast tick.
//! Accepted incident reports arrive in between as `detection` messages.
//! Every message is a JSON object `{"type": ..., "data": ...}`.
//!
//! The connection owns a bounded queue registered with the snapshot hub.
//! The hub only ever `try_send`s into it; this task does the actual socket
//! writes, so a slow client can never stall the broadcaster.

use std::sync::Arc;

use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use chrono::Utc;
use railguard_types::{LiveMessage, Welcome};
use tracing::{debug, warn};

use crate::hub::{self, QueueSink};
use crate::state::AppState;

/// Greeting sent on connect.
pub const WELCOME_MESSAGE: &str = "Connected to RailGuard live updates";

/// Upgrade an HTTP request to a `WebSocket` connection and begin
/// streaming live updates.
///
/// # Route
///
/// `GET /ws`
pub async fn ws_live(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

fn welcome() -> Result<Utf8Bytes, serde_json::Error> {
    let msg = LiveMessage::Welcome(Welcome {
        message: WELCOME_MESSAGE.to_owned(),
        timestamp: Utc::now(),
    });
    serde_json::to_string(&msg).map(Utf8Bytes::from)
}

/// Handle the `WebSocket` lifecycle: greet, register with the hub, then
/// forward queued batches until either side goes away.
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    debug!("WebSocket client connected");

    match welcome() {
        Ok(text) => {
            if socket.send(Message::Text(text)).await.is_err() {
                debug!("WebSocket client disconnected (welcome failed)");
                return;
            }
        }
        Err(e) => warn!("Failed to serialize welcome message: {e}"),
    }

    let initial = match hub::capture(&state.store).await {
        Ok(batch) => Some(batch),
        Err(e) => {
            warn!("Failed to serialize initial snapshot: {e}");
            None
        }
    };

    let (sink, mut rx) = QueueSink::channel(state.subscriber_queue);
    let Ok(id) = state.snapshots.connect(Box::new(sink), initial).await else {
        warn!("Snapshot hub unavailable, closing WebSocket");
        return;
    };

    'conn: loop {
        tokio::select! {
            // Next batch from the hub; `None` means the hub dropped us.
            batch = rx.recv() => {
                let Some(batch) = batch else {
                    debug!(subscriber = %id, "unregistered by hub");
                    break 'conn;
                };
                for frame in batch.frames() {
                    if socket.send(Message::Text(frame.clone())).await.is_err() {
                        debug!(subscriber = %id, "WebSocket client disconnected (send failed)");
                        break 'conn;
                    }
                }
            }
            // Check if the client sent a close frame or disconnected.
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(subscriber = %id, "WebSocket client disconnected");
                        break 'conn;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            debug!(subscriber = %id, "WebSocket client disconnected (pong failed)");
                            break 'conn;
                        }
                    }
                    Some(Err(e)) => {
                        debug!(subscriber = %id, "WebSocket error: {e}");
                        break 'conn;
                    }
                    _ => {
                        // Client text and binary frames are ignored.
                    }
                }
            }
        }
    }

    state.snapshots.disconnect(id).await;
}
