//! Observer server startup helper for embedding in the engine binary.
//!
//! [`spawn_observer`] binds eagerly, so a port clash surfaces as an error
//! to the caller, then serves on a background task until the shutdown
//! signal fires.

use std::sync::Arc;

use railguard_core::config::HttpConfig;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::server::{self, ServerError};
use crate::state::AppState;

/// Errors that can occur when spawning the observer server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind or start.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),
}

/// A running observer server.
#[derive(Debug)]
pub struct ObserverHandle {
    shutdown: oneshot::Sender<()>,
    join: JoinHandle<Result<(), ServerError>>,
}

impl ObserverHandle {
    /// Stop accepting connections and wait for the server to drain.
    ///
    /// # Errors
    ///
    /// Returns the server's own error, if it failed while serving.
    pub async fn shutdown(self) -> Result<(), ServerError> {
        // Err only means the server already exited.
        let _ = self.shutdown.send(());
        self.join
            .await
            .map_err(|e| ServerError::Serve(format!("server task failed: {e}")))?
    }
}

/// Bind and spawn the observer HTTP server on a background Tokio task.
///
/// # Errors
///
/// Returns [`StartupError::Server`] if the address cannot be bound.
pub async fn spawn_observer(
    config: &HttpConfig,
    state: Arc<AppState>,
) -> Result<ObserverHandle, StartupError> {
    let listener = server::bind(config).await?;
    let (shutdown, signal) = oneshot::channel::<()>();

    let join = tokio::spawn(server::serve(listener, state, async move {
        // A dropped sender also counts as a shutdown request.
        let _ = signal.await;
    }));

    tracing::info!(host = %config.host, port = config.port, "Observer server spawned on background task");
    Ok(ObserverHandle { shutdown, join })
}
