//! Error types for the Conveyor client

use thiserror::Error;

/// Result type alias for dispatch operations
pub type Result<T> = std::result::Result<T, DispatchError>;

/// Transient failure of the shared result store or object store.
///
/// Reads through [`crate::store::try_get`] fold this into "value absent";
/// it only surfaces where a store failure is genuinely terminal.
#[derive(Debug, Error)]
#[error("store error: {0}")]
pub struct StoreError(pub String);

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors that can occur while coordinating a remote job
#[derive(Debug, Error)]
pub enum DispatchError {
    /// HTTP transport failed before a status code was available
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// The submit request was rejected. Fatal and never retried here: a
    /// failed submit is distinguishable from an unknown outcome.
    #[error("job submission failed (status {status}): {body}")]
    SubmissionFailed {
        /// HTTP status code
        status: u16,
        /// Response body returned by the backend
        body: String,
    },

    /// A synchronous call returned a 4xx/5xx status
    #[error("remote request failed (status {status}): {body}")]
    RemoteRequestFailed {
        /// HTTP status code
        status: u16,
        /// Response body returned by the backend
        body: String,
    },

    /// The remote job reached a terminal state with the failure sentinel
    #[error("remote task failed: {message}")]
    RemoteTaskFailed {
        /// Remote exception message, or a placeholder when the backend
        /// never wrote one
        message: String,
    },

    /// The wall-clock poll budget was exhausted without a terminal value
    #[error("timed out after {elapsed_secs}s waiting for remote job")]
    PollTimeout {
        /// Seconds elapsed when the budget ran out
        elapsed_secs: u64,
    },

    /// A store operation failed where it could not be folded into "absent"
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Failed to decode a response body
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl DispatchError {
    /// Check if this error is a poll timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::PollTimeout { .. })
    }

    /// Check if this error reports a remote task failure
    pub fn is_remote_failure(&self) -> bool {
        matches!(self, Self::RemoteTaskFailed { .. })
    }
}
