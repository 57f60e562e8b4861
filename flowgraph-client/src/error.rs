//! Error types for the flowgraph clients

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Why a digest poll loop stopped waiting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The caller's cancellation token fired
    Cancelled,
    /// The overall polling deadline passed
    DeadlineExceeded,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelReason::Cancelled => f.write_str("operation cancelled"),
            CancelReason::DeadlineExceeded => f.write_str("deadline exceeded"),
        }
    }
}

/// Errors that can occur when talking to the digester or the job sink
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Remote service answered with a status the protocol does not allow
    #[error("unexpected response (status {status}): {body}")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
        /// Response body, as text
        body: String,
    },

    /// Polling was interrupted while waiting for the digest
    #[error("digest polling stopped after {attempts} attempt(s): {reason}")]
    PollCancelled { attempts: u32, reason: CancelReason },

    /// Every poll attempt reported the digest as not ready
    #[error("max digester poll attempts reached: {0}")]
    MaxPollAttempts(u32),

    /// The digest body was not valid gzip
    #[error("failed to decompress digest: {0}")]
    Decompress(#[source] std::io::Error),
}

impl ClientError {
    /// Create an unexpected status error from status code and body
    pub fn unexpected_status(status: u16, body: impl Into<String>) -> Self {
        Self::UnexpectedStatus {
            status,
            body: body.into(),
        }
    }
}
