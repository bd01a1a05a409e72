//! Error types for xapp-frame.

use crate::Transport::MsgState;
use thiserror::Error;

/// Errors surfaced by messages, the messenger and the xApp runner.
///
/// A receive timeout is not an error: receives report it as `Ok(None)`.
#[derive(Debug, Error)]
pub enum XappError {
    /// No transport session, or the session refused to hand out a buffer.
    #[error("transport unavailable")]
    TransportUnavailable,

    /// The requested length does not fit, even after trying to grow the buffer.
    #[error("capacity exceeded: requested {requested} bytes, {available} available")]
    CapacityExceeded { requested: usize, available: usize },

    /// The transport rejected a send or reply. The message still holds the
    /// returned buffer and may be resent.
    #[error("send failed: {0}")]
    SendFailed(MsgState),

    /// A receive ended with a transport error other than a timeout.
    #[error("receive failed: {0}")]
    ReceiveError(MsgState),

    /// The message no longer owns a buffer (it was moved out).
    #[error("message holds no buffer")]
    InvalidHandle,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A listener thread could not be started.
    #[error("failed to start listener {index}: {source}")]
    WorkerSpawn {
        index: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("signal handler error: {0}")]
    Signal(#[from] ctrlc::Error),
}

/// Result type alias using XappError.
pub type Result<T> = std::result::Result<T, XappError>;
