//! Error types for the observer API server.
//!
//! [`ObserverError`] unifies all failure modes into a single enum that
//! can be converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use railguard_core::IncidentError;

/// Errors that can occur in the observer API layer.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// A request body could not be accepted.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// An uploaded frame exceeded the configured limit.
    #[error("frame exceeds {limit} bytes")]
    PayloadTooLarge {
        /// Configured maximum frame size in bytes.
        limit: usize,
    },

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<IncidentError> for ObserverError {
    fn from(e: IncidentError) -> Self {
        match e {
            IncidentError::InvalidReport(msg) => Self::InvalidPayload(msg),
        }
    }
}

impl ObserverError {
    /// HTTP status this error maps to.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ObserverError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::InvalidPayload(msg) | Self::NotFound(msg) | Self::Internal(msg) => msg.clone(),
            Self::PayloadTooLarge { .. } => self.to_string(),
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
