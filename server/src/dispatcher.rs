//! Public-endpoint accept loop.
//!
//! The dispatcher has a single Listening state: it parses each datagram on
//! the well-known endpoint as a session initiation, allocates a fresh
//! private endpoint, replies from the public endpoint (clients correlate
//! replies by content, not source port), and spawns a session worker. It
//! keeps no per-client state, so duplicate initiations simply spawn fresh
//! sessions and the superseded worker dies by idle timeout.

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tokio::task::JoinSet;

use ftransport::config::{HANDSHAKE_BUFFER, TransferConfig};
use ftransport::frame::{Initiation, Reply};
use ftransport::{Endpoint, ProtocolKind, Result};

use crate::session::{Role, Session};

/// Server-wide settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address of the public endpoint.
    pub bind: SocketAddr,

    /// Directory uploads land in and downloads are served from.
    pub storage: PathBuf,

    /// Protocol tunables handed to every session.
    pub transfer: TransferConfig,

    /// How long live sessions get to finish after a shutdown request.
    pub shutdown_grace: Duration,
}

impl ServerConfig {
    pub fn new(bind: SocketAddr, storage: PathBuf) -> Self {
        Self {
            bind,
            storage,
            transfer: TransferConfig::default(),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

/// The accept loop on the public endpoint.
#[derive(Debug)]
pub struct Dispatcher {
    cfg: ServerConfig,
    endpoint: Endpoint,
}

impl Dispatcher {
    /// Binds the public endpoint and ensures the storage directory exists.
    pub async fn bind(cfg: ServerConfig) -> Result<Self> {
        tokio::fs::create_dir_all(&cfg.storage).await?;
        let endpoint = Endpoint::bind(cfg.bind).await?;
        Ok(Self { cfg, endpoint })
    }

    /// The bound public address (the port is resolved when binding to 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.endpoint.local_addr()
    }

    /// Accepts initiations until `shutdown` resolves, then gives live
    /// sessions a bounded grace period before aborting them.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        tokio::pin!(shutdown);
        let mut sessions: JoinSet<()> = JoinSet::new();
        let mut buf = vec![0u8; HANDSHAKE_BUFFER];

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                Some(_) = sessions.join_next(), if !sessions.is_empty() => {}
                received = self.endpoint.recv_from(&mut buf) => {
                    match received {
                        Ok((n, peer)) => self.accept(&mut sessions, &buf[..n], peer).await,
                        Err(e) => log::error!("receive on the public endpoint failed: {e}"),
                    }
                }
            }
        }

        if !sessions.is_empty() {
            log::info!(
                "waiting up to {:?} for {} active sessions",
                self.cfg.shutdown_grace,
                sessions.len()
            );
            let all_done = async {
                while sessions.join_next().await.is_some() {}
            };
            if tokio::time::timeout(self.cfg.shutdown_grace, all_done).await.is_err() {
                log::warn!("shutdown grace elapsed; unfinished sessions fail");
                sessions.abort_all();
            }
        }
        Ok(())
    }

    /// Validates one initiation datagram and spawns its session. An
    /// invalid initiation is logged and ignored; a session setup error is
    /// logged and the loop keeps listening.
    async fn accept(&self, sessions: &mut JoinSet<()>, datagram: &[u8], peer: SocketAddr) {
        let initiation = match Initiation::parse(datagram) {
            Ok(initiation) => initiation,
            Err(e) => {
                log::warn!("ignoring invalid initiation from {peer}: {e}");
                return;
            }
        };

        let outcome = match initiation {
            Initiation::Upload { protocol, filename, filesize } => {
                self.accept_upload(sessions, peer, protocol, filename, filesize).await
            }
            Initiation::Download { protocol, filename } => {
                self.accept_download(sessions, peer, protocol, filename).await
            }
        };
        if let Err(e) = outcome {
            log::error!("could not open a session for {peer}: {e}");
        }
    }

    async fn accept_upload(
        &self,
        sessions: &mut JoinSet<()>,
        peer: SocketAddr,
        protocol: ProtocolKind,
        filename: String,
        filesize: u64,
    ) -> Result<()> {
        if !valid_filename(&filename) {
            log::warn!("rejecting upload of unsafe filename {filename:?} from {peer}");
            return Ok(());
        }

        let endpoint = self.private_endpoint().await?;
        let port = endpoint.local_addr()?.port();
        log::info!(
            "upload of {filename:?} ({filesize} bytes, {protocol}) from {peer}, data port {port}"
        );
        self.endpoint.send_to(&Reply::UploadOk { port }.encode(), peer).await?;

        let path = self.cfg.storage.join(&filename);
        sessions.spawn(
            Session {
                peer,
                role: Role::Upload,
                protocol,
                filename,
                path,
                filesize,
                endpoint,
                transfer: self.cfg.transfer.clone(),
            }
            .run(),
        );
        Ok(())
    }

    async fn accept_download(
        &self,
        sessions: &mut JoinSet<()>,
        peer: SocketAddr,
        protocol: ProtocolKind,
        filename: String,
    ) -> Result<()> {
        if !valid_filename(&filename) {
            log::warn!("rejecting download of unsafe filename {filename:?} from {peer}");
            self.endpoint.send_to(&Reply::FileNotFound.encode(), peer).await?;
            return Ok(());
        }

        let path = self.cfg.storage.join(&filename);
        let filesize = match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => {
                log::info!("download of missing file {filename:?} requested by {peer}");
                self.endpoint.send_to(&Reply::FileNotFound.encode(), peer).await?;
                return Ok(());
            }
        };

        let endpoint = self.private_endpoint().await?;
        let port = endpoint.local_addr()?.port();
        log::info!(
            "download of {filename:?} ({filesize} bytes, {protocol}) to {peer}, data port {port}"
        );
        self.endpoint
            .send_to(&Reply::DownloadOk { port, filesize }.encode(), peer)
            .await?;

        sessions.spawn(
            Session {
                peer,
                role: Role::Download,
                protocol,
                filename,
                path,
                filesize,
                endpoint,
                transfer: self.cfg.transfer.clone(),
            }
            .run(),
        );
        Ok(())
    }

    /// A fresh ephemeral endpoint on the server's address, owned by one
    /// session.
    async fn private_endpoint(&self) -> Result<Endpoint> {
        let mut addr = self.cfg.bind;
        addr.set_port(0);
        Endpoint::bind(addr).await
    }
}

/// Rejects names that could escape the storage directory.
fn valid_filename(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}
