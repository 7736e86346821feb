//! Error types for the notification layer.
//!
//! Only [`ClientError`] ever reaches subscribers. Everything else is handled
//! inside the connection manager and surfaces, at most, as a change of the
//! connection status.

use thiserror::Error;

/// Terminal failures reported once to every current subscriber.
///
/// After one of these the manager latches into the offline state and stops
/// retrying until the application asks for an explicit reconnect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("invalid endpoint `{endpoint}`: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("server unreachable after {attempts} reconnect attempts")]
    RetriesExhausted { attempts: u32 },
}

/// A frame that could not be turned into an event. Logged and dropped.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("`{kind}` frame has an unexpected payload: {source}")]
    Payload {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("binary frame is not valid UTF-8")]
    NotUtf8,
}

/// Outcome of a failed connection attempt.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The transport cannot be constructed at all. Never retried.
    #[error(transparent)]
    Terminal(#[from] ClientError),

    /// The server could not be reached this time. Retried with backoff.
    #[error("connection failed: {0}")]
    Transient(String),
}

impl ConnectError {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectError::Terminal(_))
    }
}
