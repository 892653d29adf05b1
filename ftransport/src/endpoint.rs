//! Bound datagram endpoint.
//!
//! Owns one UDP socket. Every receive in the system goes through
//! [`Endpoint::recv_from_timeout`], which is the protocols' only bounded
//! suspension point besides the explicit flow-control yield.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{ToSocketAddrs, UdpSocket};

use crate::error::{Error, Result};

/// A bound unreliable message socket.
#[derive(Debug)]
pub struct Endpoint {
    socket: UdpSocket,
}

impl Endpoint {
    /// Binds a new endpoint. Port 0 requests an ephemeral port, used for
    /// the per-session private endpoints and the client side.
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self> {
        Ok(Self { socket: UdpSocket::bind(addr).await? })
    }

    /// The locally bound address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Sends one datagram to `peer`.
    pub async fn send_to(&self, buf: &[u8], peer: SocketAddr) -> Result<()> {
        self.socket.send_to(buf, peer).await?;
        Ok(())
    }

    /// Receives one datagram, waiting indefinitely.
    pub async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        Ok(self.socket.recv_from(buf).await?)
    }

    /// Receives one datagram, waiting at most `wait`.
    ///
    /// Returns [`Error::Timeout`] when the bound elapses first.
    pub async fn recv_from_timeout(
        &self,
        buf: &mut [u8],
        wait: Duration,
    ) -> Result<(usize, SocketAddr)> {
        match tokio::time::timeout(wait, self.socket.recv_from(buf)).await {
            Ok(received) => Ok(received?),
            Err(_) => Err(Error::Timeout),
        }
    }
}
