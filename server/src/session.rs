//! Per-session worker.
//!
//! A session exclusively owns its private endpoint and its file handle and
//! moves through Opening (create or open the file), Transferring (the
//! chosen protocol's loop), Draining (the protocol's trailing re-ACK /
//! absorb phase) and Closed (endpoint and file released by drop). Any
//! failure short-circuits to Closed; the outcome is logged either way and
//! never reaches the dispatcher.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use tokio::fs::File;

use ftransport::config::TransferConfig;
use ftransport::{Endpoint, ProtocolKind, Result, TransferStats, protocol};

/// Transfer direction, named from the client's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The client sends; this worker receives into storage.
    Upload,

    /// The client receives; this worker serves from storage.
    Download,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Upload => "upload",
            Role::Download => "download",
        })
    }
}

/// State move-owned by one session worker at spawn time.
#[derive(Debug)]
pub struct Session {
    /// The client, as seen at initiation time.
    pub peer: SocketAddr,

    pub role: Role,
    pub protocol: ProtocolKind,

    /// Name as it appeared in the initiation.
    pub filename: String,

    /// Resolved path under the storage directory.
    pub path: PathBuf,

    /// Authoritative transfer length from the handshake.
    pub filesize: u64,

    /// The session's private endpoint.
    pub endpoint: Endpoint,

    pub transfer: TransferConfig,
}

impl Session {
    /// Runs the session to its outcome and logs it.
    pub async fn run(self) {
        match self.transfer().await {
            Ok(stats) => log::info!(
                "{} of {:?} with {} done: {} bytes in {:.2?} ({:.1}% retransmitted)",
                self.role,
                self.filename,
                self.peer,
                stats.bytes,
                stats.elapsed,
                stats.retransmit_rate(),
            ),
            Err(e) => log::error!(
                "{} of {:?} with {} failed: {e}",
                self.role,
                self.filename,
                self.peer,
            ),
        }
    }

    async fn transfer(&self) -> Result<TransferStats> {
        match self.role {
            Role::Upload => {
                let mut file = File::create(&self.path).await?;
                protocol::receive_file(
                    self.protocol,
                    &self.transfer,
                    &self.endpoint,
                    &mut file,
                    self.filesize,
                )
                .await
            }
            Role::Download => {
                let mut file = File::open(&self.path).await?;
                protocol::send_file(
                    self.protocol,
                    &self.transfer,
                    &self.endpoint,
                    self.peer,
                    &mut file,
                    self.filesize,
                )
                .await
            }
        }
    }
}
