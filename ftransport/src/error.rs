//! Error types for the transfer protocols.
//!
//! Recoverable kinds (`Timeout` at poll sites, `MalformedFrame` on parse)
//! are handled where they occur; every other kind ends the session.

use std::time::Duration;

/// Result type alias for transfer operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the transfer protocols.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A bounded receive elapsed without a datagram.
    #[error("timed out waiting for a datagram")]
    Timeout,

    /// No datagram arrived within the session's idle budget.
    #[error("no datagrams received for {0:?}")]
    IdleTimeout(Duration),

    /// A datagram did not parse as any known frame.
    #[error("malformed frame")]
    MalformedFrame,

    /// The recovery-protocol field named neither known protocol.
    #[error("unknown error-recovery protocol {0:?}")]
    UnknownProtocol(String),

    /// A frame exhausted its retransmission budget.
    #[error("frame {seq} exceeded the retransmission budget")]
    RetryExhausted { seq: u64 },

    /// The handshake could not be completed.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// The server does not have the requested file.
    #[error("file not found on server")]
    FileNotFound,

    /// File or socket I/O failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
