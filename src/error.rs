//! Error types for the remote-control core.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RemoteError>;

/// Errors raised by discovery, transport, and session internals.
///
/// The public session surface resolves these to boolean outcomes; callers
/// that need the cause get it from the emitted tracing events.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Local network reachability is down.
    #[error("network is not reachable")]
    NetworkUnreachable,

    /// No device with the given id in the current discovered set.
    #[error("unknown device id: {0}")]
    UnknownDevice(String),

    /// Transport-level failure while talking to a device.
    #[error("transport error: {0}")]
    Transport(String),

    /// Pairing handshake failed or was rejected.
    #[error("pairing failed: {0}")]
    Pairing(String),

    /// A scan was requested while another is still running.
    #[error("scan already in progress")]
    ScanInProgress,

    /// The operation exceeded its configured deadline.
    #[error("operation timed out")]
    Timeout,
}

impl RemoteError {
    /// Create a Transport error from any displayable cause.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a Pairing error from any displayable cause.
    pub fn pairing(msg: impl Into<String>) -> Self {
        Self::Pairing(msg.into())
    }
}

impl From<tokio::time::error::Elapsed> for RemoteError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Self::Timeout
    }
}
