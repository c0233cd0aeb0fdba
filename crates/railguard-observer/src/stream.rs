//! MJPEG camera stream and frame ingestion.
//!
//! `POST /api/internal/stream/cam1` takes one raw JPEG per request and
//! publishes it as the latest frame. `GET /stream/cam1` serves the feed as
//! `multipart/x-mixed-replace`, one part per frame, until the client goes
//! away; dropping the body drops the hub subscription with it.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::extract::rejection::BytesRejection;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use tracing::{debug, trace};

use crate::error::ObserverError;
use crate::frames::{self, FrameSubscription};
use crate::state::AppState;

/// Accept one encoded frame.
///
/// Empty bodies are rejected with 400, bodies over the configured limit
/// with 413; accepted frames answer 202.
pub async fn ingest_frame(
    State(state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<StatusCode, ObserverError> {
    let frame = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ObserverError::PayloadTooLarge {
                limit: state.max_frame_bytes,
            }
        } else {
            ObserverError::InvalidPayload(rejection.body_text())
        }
    })?;

    if frame.is_empty() {
        return Err(ObserverError::InvalidPayload(String::from("empty frame")));
    }
    if frame.len() > state.max_frame_bytes {
        return Err(ObserverError::PayloadTooLarge {
            limit: state.max_frame_bytes,
        });
    }

    trace!(bytes = frame.len(), "frame received");
    state
        .frames
        .publish(frame)
        .await
        .map_err(|e| ObserverError::Internal(e.to_string()))?;
    Ok(StatusCode::ACCEPTED)
}

/// Serve the camera feed as MJPEG.
pub async fn stream_mjpeg(State(state): State<Arc<AppState>>) -> Result<Response, ObserverError> {
    let subscription = state
        .frames
        .subscribe()
        .await
        .map_err(|e| ObserverError::Internal(e.to_string()))?;
    debug!(subscriber = %subscription.id(), "MJPEG viewer attached");

    let parts = futures::stream::unfold(subscription, |mut sub: FrameSubscription| async move {
        let frame = sub.recv().await?;
        Some((Ok::<_, Infallible>(frames::encode_part(&frame)), sub))
    });

    Ok((
        [
            (
                header::CONTENT_TYPE,
                format!("multipart/x-mixed-replace; boundary={}", frames::BOUNDARY),
            ),
            (
                header::CACHE_CONTROL,
                String::from("no-cache, no-store, must-revalidate"),
            ),
            (header::PRAGMA, String::from("no-cache")),
        ],
        Body::from_stream(parts),
    )
        .into_response())
}
