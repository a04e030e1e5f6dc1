//! Error types for bufsync-daemon.

use bufsync_core::ProcessError;

/// Main error type for bufsync-daemon operations.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    /// The editor event was rejected or produced nothing to do.
    #[error("event not processed: {0}")]
    Process(#[from] ProcessError),

    /// Event handling panicked; the panic was recovered.
    #[error("event handling panicked: {message}")]
    Panicked {
        /// Panic payload, if it was a string.
        message: String,
    },
}

impl DaemonError {
    /// True for steady-state outcomes (duplicate or unused events) that
    /// should not be reported as failures.
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::Process(err) if err.is_expected())
    }
}
