//! Stop-and-Wait: one frame in flight, 1-bit alternating sequence.
//!
//! The sender transmits a single frame and blocks until its ACK arrives,
//! adapting the wait to the measured round trip and backing off
//! multiplicatively on every expiry. The receiver delivers frames whose
//! sequence bit matches the expected one and re-ACKs the last delivered
//! frame on duplicates, so a lost ACK costs one retransmission and nothing
//! else.

use std::io::SeekFrom;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use crate::config::{ACK_BUFFER, DATA_BUFFER, MSS, StopAndWaitConfig};
use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::frame::{self, DataFrame};
use crate::rtt::RttEstimator;
use crate::stats::TransferStats;

use super::PROGRESS_INTERVAL;

/// Sending side of a Stop-and-Wait transfer.
#[derive(Debug)]
pub struct Sender {
    cfg: StopAndWaitConfig,
    rtt: RttEstimator,
    timeout: Duration,
    stats: TransferStats,
}

impl Sender {
    pub fn new(cfg: StopAndWaitConfig) -> Self {
        Self {
            timeout: cfg.initial_timeout,
            cfg,
            rtt: RttEstimator::new(),
            stats: TransferStats::default(),
        }
    }

    /// Streams `filesize` bytes of `file` to `peer`, one frame at a time.
    ///
    /// Completion is implicit: after the last ACK the sender simply stops;
    /// the receiver terminates by counting bytes against the handshake's
    /// filesize.
    pub async fn run(
        mut self,
        endpoint: &Endpoint,
        peer: SocketAddr,
        file: &mut File,
        filesize: u64,
    ) -> Result<TransferStats> {
        let started = Instant::now();
        let mut seq: u64 = 0;
        let mut sent: u64 = 0;

        while sent < filesize {
            let len = (filesize - sent).min(MSS as u64) as usize;
            self.transmit(endpoint, peer, file, sent, len, seq).await?;

            sent += len as u64;
            seq ^= 1;
            self.stats.frames += 1;
            self.stats.max_in_flight = 1;
            if self.stats.frames % PROGRESS_INTERVAL == 0 {
                log::debug!("sent {sent}/{filesize} bytes");
            }
        }

        self.stats.bytes = sent;
        self.stats.elapsed = started.elapsed();
        log::debug!(
            "stop-and-wait send done: {sent} bytes, {} retransmissions",
            self.stats.retransmissions
        );
        Ok(self.stats)
    }

    /// Sends the frame at `offset` and blocks until its ACK arrives,
    /// retransmitting on every timeout up to the retry budget.
    async fn transmit(
        &mut self,
        endpoint: &Endpoint,
        peer: SocketAddr,
        file: &mut File,
        offset: u64,
        len: usize,
        seq: u64,
    ) -> Result<()> {
        let mut payload = vec![0u8; len];
        let mut retries = 0u32;

        loop {
            // Re-read the frame's bytes from its remembered position; on a
            // retransmission the cursor has already moved past them.
            file.seek(SeekFrom::Start(offset)).await?;
            file.read_exact(&mut payload).await?;
            let wire = DataFrame { seq, payload: &payload }.encode();

            endpoint.send_to(&wire, peer).await?;
            let sent_at = Instant::now();

            if let Some(sample) = self.await_ack(endpoint, seq, sent_at).await? {
                self.rtt.record(sample);
                self.timeout = self.rtt.timeout(
                    self.cfg.rtt_multiplier,
                    self.cfg.initial_timeout,
                    self.cfg.max_timeout,
                );
                return Ok(());
            }

            retries += 1;
            if retries > self.cfg.max_retries {
                log::error!("frame {seq} lost after {} attempts", retries);
                return Err(Error::RetryExhausted { seq });
            }
            self.stats.retransmissions += 1;
            self.timeout = self.timeout.mul_f64(self.cfg.backoff).min(self.cfg.max_timeout);
        }
    }

    /// Waits for `ACK:<seq>` within the current timeout window.
    ///
    /// Stale ACKs and unparseable datagrams spend the window without
    /// restarting it. Returns the round-trip sample on success, `None` when
    /// the window elapses.
    async fn await_ack(
        &mut self,
        endpoint: &Endpoint,
        seq: u64,
        sent_at: Instant,
    ) -> Result<Option<Duration>> {
        let mut buf = [0u8; ACK_BUFFER];
        loop {
            let Some(remaining) = self.timeout.checked_sub(sent_at.elapsed()) else {
                return Ok(None);
            };
            match endpoint.recv_from_timeout(&mut buf, remaining).await {
                Err(Error::Timeout) => return Ok(None),
                Err(e) => return Err(e),
                Ok((n, _)) => match frame::parse_ack(&buf[..n]) {
                    Ok(acked) if acked == seq => return Ok(Some(sent_at.elapsed())),
                    Ok(stale) => {
                        self.stats.duplicates += 1;
                        log::debug!("stale ACK {stale} while waiting for {seq}");
                    }
                    Err(_) => {}
                },
            }
        }
    }
}

/// Receiving side of a Stop-and-Wait transfer.
#[derive(Debug)]
pub struct Receiver {
    cfg: StopAndWaitConfig,
    stats: TransferStats,
}

impl Receiver {
    pub fn new(cfg: StopAndWaitConfig) -> Self {
        Self { cfg, stats: TransferStats::default() }
    }

    /// Receives `filesize` bytes into `file`, ACKing each in-order frame
    /// to its source address, then drains trailing duplicates.
    pub async fn run(
        mut self,
        endpoint: &Endpoint,
        file: &mut File,
        filesize: u64,
    ) -> Result<TransferStats> {
        let started = Instant::now();
        let mut expected: u64 = 0;
        let mut last_delivered: Option<u64> = None;
        let mut received: u64 = 0;
        let mut buf = vec![0u8; DATA_BUFFER];

        while received < filesize {
            let (n, from) = match endpoint.recv_from_timeout(&mut buf, self.cfg.idle_timeout).await
            {
                Err(Error::Timeout) => return Err(Error::IdleTimeout(self.cfg.idle_timeout)),
                other => other?,
            };
            let Ok(data) = DataFrame::parse(&buf[..n]) else {
                continue;
            };

            if data.seq == expected {
                let take = data.payload.len().min((filesize - received) as usize);
                file.write_all(&data.payload[..take]).await?;
                received += take as u64;
                last_delivered = Some(data.seq);
                endpoint.send_to(&frame::encode_ack(data.seq), from).await?;
                expected ^= 1;

                self.stats.frames += 1;
                if self.stats.frames % PROGRESS_INTERVAL == 0 {
                    log::debug!("received {received}/{filesize} bytes");
                }
            } else if let Some(last) = last_delivered {
                // Duplicate of the previous frame: its ACK was lost.
                self.stats.duplicates += 1;
                endpoint.send_to(&frame::encode_ack(last), from).await?;
            }
            // A duplicate before the first in-order frame gets no ACK.
        }

        file.flush().await?;
        self.drain(endpoint, last_delivered).await?;

        self.stats.bytes = received;
        self.stats.elapsed = started.elapsed();
        Ok(self.stats)
    }

    /// Keeps re-ACKing duplicates of the last frame for the drain period,
    /// covering a lost final ACK.
    async fn drain(&mut self, endpoint: &Endpoint, last_delivered: Option<u64>) -> Result<()> {
        let Some(last) = last_delivered else {
            return Ok(());
        };
        let deadline = Instant::now() + self.cfg.drain;
        let mut buf = vec![0u8; DATA_BUFFER];

        while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
            match endpoint.recv_from_timeout(&mut buf, remaining).await {
                Err(Error::Timeout) => break,
                Err(e) => return Err(e),
                Ok((n, from)) => {
                    if DataFrame::parse(&buf[..n]).is_ok() {
                        self.stats.duplicates += 1;
                        endpoint.send_to(&frame::encode_ack(last), from).await?;
                    }
                }
            }
        }
        Ok(())
    }
}
