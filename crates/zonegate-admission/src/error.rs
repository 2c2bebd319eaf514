//! Typed errors for the admission service surface.
//!
//! Loader failures are not errors of the service: they are resolved into
//! rejection replies inside the drain worker and never reach these variants.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Configuration failed validation at construction time.
    #[error("invalid admission config: {reason}")]
    InvalidConfig {
        /// Human-readable validation failure.
        reason: String,
    },
    /// The drain worker thread could not be spawned.
    #[error("failed to spawn drain worker: {source}")]
    SpawnDrainWorker {
        /// I/O error returned by thread spawn.
        #[source]
        source: std::io::Error,
    },
    /// In-flight drains did not finish within the shutdown budget.
    #[error("drain worker did not stop within {timeout_ms}ms")]
    ShutdownTimedOut {
        /// Timeout budget used while waiting for the drain to finish.
        timeout_ms: u128,
    },
    /// The service no longer accepts entries.
    #[error("admission service is shutting down")]
    ShuttingDown,
}
