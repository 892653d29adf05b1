//! The two reliable-delivery protocols and their selection.
//!
//! Both protocols implement the same contract: a sender streams a file of
//! known size to a peer as sequenced data frames, a receiver writes the
//! frames to a sink in strict sequence order and acknowledges them. The
//! session worker and the client drivers pick an engine through
//! [`ProtocolKind`] and the [`send_file`]/[`receive_file`] entry points.

pub mod selective_repeat;
pub mod stop_and_wait;

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use tokio::fs::File;

use crate::config::TransferConfig;
use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::stats::TransferStats;

/// Data frames between two progress log lines.
const PROGRESS_INTERVAL: u64 = 100;

/// The selectable error-recovery protocols.
///
/// The wire names are the only accepted spellings, case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolKind {
    /// One frame in flight, 1-bit alternating sequence.
    StopAndWait,

    /// Windowed pipeline with per-frame retransmit timers and ACKs.
    SelectiveRepeat,
}

impl ProtocolKind {
    /// The protocol's name as it appears in handshake frames.
    pub const fn wire_name(&self) -> &'static str {
        match self {
            Self::StopAndWait => "stop-and-wait",
            Self::SelectiveRepeat => "selective-repeat",
        }
    }
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for ProtocolKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "stop-and-wait" => Ok(Self::StopAndWait),
            "selective-repeat" => Ok(Self::SelectiveRepeat),
            other => Err(Error::UnknownProtocol(other.to_owned())),
        }
    }
}

/// Streams `filesize` bytes of `file` to `peer` under the chosen protocol.
pub async fn send_file(
    kind: ProtocolKind,
    cfg: &TransferConfig,
    endpoint: &Endpoint,
    peer: SocketAddr,
    file: &mut File,
    filesize: u64,
) -> Result<TransferStats> {
    match kind {
        ProtocolKind::StopAndWait => {
            stop_and_wait::Sender::new(cfg.stop_and_wait.clone())
                .run(endpoint, peer, file, filesize)
                .await
        }
        ProtocolKind::SelectiveRepeat => {
            selective_repeat::Sender::new(cfg.selective_repeat.clone())
                .run(endpoint, peer, file, filesize)
                .await
        }
    }
}

/// Receives `filesize` bytes into `file` under the chosen protocol,
/// acknowledging each frame to its source address.
pub async fn receive_file(
    kind: ProtocolKind,
    cfg: &TransferConfig,
    endpoint: &Endpoint,
    file: &mut File,
    filesize: u64,
) -> Result<TransferStats> {
    match kind {
        ProtocolKind::StopAndWait => {
            stop_and_wait::Receiver::new(cfg.stop_and_wait.clone())
                .run(endpoint, file, filesize)
                .await
        }
        ProtocolKind::SelectiveRepeat => {
            selective_repeat::Receiver::new(cfg.selective_repeat.clone())
                .run(endpoint, file, filesize)
                .await
        }
    }
}
