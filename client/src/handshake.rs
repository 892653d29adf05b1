//! Session initiation from the client side.
//!
//! The initiation datagram carries everything the dispatcher needs, so the
//! client simply re-sends it with a doubling wait until a reply arrives or
//! the retry budget runs out. Replies are correlated by content, not by
//! source port.

use std::net::SocketAddr;

use ftransport::config::{HANDSHAKE_BUFFER, HANDSHAKE_RETRIES, HANDSHAKE_TIMEOUT};
use ftransport::frame::{Initiation, Reply};
use ftransport::{Endpoint, Error, Result};

/// Sends `initiation` to the dispatcher until a reply arrives.
pub async fn request(
    endpoint: &Endpoint,
    server: SocketAddr,
    initiation: &Initiation,
) -> Result<Reply> {
    let wire = initiation.encode();
    let mut wait = HANDSHAKE_TIMEOUT;
    let mut buf = [0u8; HANDSHAKE_BUFFER];

    for attempt in 1..=HANDSHAKE_RETRIES {
        endpoint.send_to(&wire, server).await?;
        match endpoint.recv_from_timeout(&mut buf, wait).await {
            Err(Error::Timeout) => {
                log::debug!("no reply from {server} (attempt {attempt}/{HANDSHAKE_RETRIES})");
                wait *= 2;
            }
            Err(e) => return Err(e),
            Ok((n, _)) => {
                return Reply::parse(&buf[..n])
                    .map_err(|_| Error::Handshake("unparseable reply from server".into()));
            }
        }
    }
    Err(Error::Handshake(format!(
        "no reply from {server} after {HANDSHAKE_RETRIES} attempts"
    )))
}
