//! Error types for dispatch and verification.

use hvs_flavor::PolicyError;
use thiserror::Error;

/// Errors raised by collaborators or the service itself.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// Flavorgroup membership could not be resolved.
    #[error("Membership lookup failed for {id}: {message}")]
    Membership {
        /// Flavorgroup or host being resolved.
        id: String,
        /// Error message.
        message: String,
    },

    /// The already-queued filter could not be applied.
    #[error("Queue membership check failed: {message}")]
    QueueFilter {
        /// Error message.
        message: String,
    },

    /// Host status could not be updated.
    #[error("Status update failed for host {host_id}: {message}")]
    HostStatus {
        /// Host whose status was being set.
        host_id: String,
        /// Error message.
        message: String,
    },

    /// Host could not be submitted for verification.
    #[error("Enqueue failed for host {host_id}: {message}")]
    Enqueue {
        /// Host being enqueued.
        host_id: String,
        /// Error message.
        message: String,
    },

    /// Policy or ever-defined parts could not be loaded.
    #[error("Policy lookup failed for flavorgroup {flavorgroup_id}: {message}")]
    PolicyLookup {
        /// Flavorgroup whose policy was requested.
        flavorgroup_id: String,
        /// Error message.
        message: String,
    },

    /// Evidence could not be collected for a host.
    #[error("Evidence unavailable for host {host_id}: {message}")]
    Evidence {
        /// Host whose evidence was requested.
        host_id: String,
        /// Error message.
        message: String,
    },

    /// Trust report could not be published.
    #[error("Report publication failed for host {host_id}: {message}")]
    ReportSink {
        /// Host the report was for.
        host_id: String,
        /// Error message.
        message: String,
    },

    /// The verification queue is no longer accepting work.
    #[error("Verification queue closed")]
    QueueClosed,

    /// A background task panicked or was aborted.
    #[error("Background task failed: {message}")]
    TaskFailed {
        /// Error message.
        message: String,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config {
        /// Error message.
        message: String,
    },

    /// Invalid policy collection.
    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),

    /// Malformed JSON input.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VerifyError {
    /// Whether this error concerns a single host inside a batch.
    ///
    /// Host-scoped errors are logged and skipped during dispatch; any other
    /// error aborts the operation.
    #[must_use]
    pub fn is_host_scoped(&self) -> bool {
        matches!(
            self,
            Self::HostStatus { .. }
                | Self::Enqueue { .. }
                | Self::Evidence { .. }
                | Self::ReportSink { .. }
        )
    }

    /// Whether the host's evidence collection failed.
    #[must_use]
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, Self::Evidence { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let status = VerifyError::HostStatus {
            host_id: "h1".into(),
            message: "db down".into(),
        };
        assert!(status.is_host_scoped());
        assert!(!status.is_connection_failure());

        let membership = VerifyError::Membership {
            id: "fg".into(),
            message: "timeout".into(),
        };
        assert!(!membership.is_host_scoped());

        let evidence = VerifyError::Evidence {
            host_id: "h1".into(),
            message: "unreachable".into(),
        };
        assert!(evidence.is_connection_failure());
    }
}
