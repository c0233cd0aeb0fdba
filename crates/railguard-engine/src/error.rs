//! Error types for the engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during engine startup and shutdown.

/// Top-level error for the engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: railguard_core::config::ConfigError,
    },

    /// The observer API server failed to start.
    #[error("observer startup error: {source}")]
    Startup {
        /// The underlying startup error.
        #[from]
        source: railguard_observer::StartupError,
    },

    /// The observer API server failed while serving.
    #[error("observer server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: railguard_observer::ServerError,
    },

    /// Waiting for the shutdown signal failed.
    #[error("signal error: {source}")]
    Signal {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}
