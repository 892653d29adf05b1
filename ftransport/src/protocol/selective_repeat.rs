//! Selective Repeat: a windowed pipeline with per-frame ACKs.
//!
//! The sender keeps up to `window` frames in flight, each with its own
//! retransmit timer and retry counter; an ACK settles exactly one frame,
//! and out-of-order ACKs punch holes that the window base slides over. The
//! receiver buffers in-window frames, flushes the in-order prefix to the
//! sink, re-ACKs frames below the window, and drops frames beyond it so a
//! fast sender cannot grow the buffer past `window` entries.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::config::{ACK_BUFFER, DATA_BUFFER, MSS, SelectiveRepeatConfig};
use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::frame::{self, DataFrame};
use crate::rtt::RttEstimator;
use crate::stats::TransferStats;

use super::PROGRESS_INTERVAL;

/// A sent frame awaiting its ACK.
#[derive(Debug)]
struct InFlight {
    /// Encoded frame bytes, re-sent verbatim on every retransmission.
    wire: Vec<u8>,

    /// When the frame was last sent.
    sent_at: Instant,

    /// How many times it has been retransmitted.
    retries: u32,
}

/// Sending side of a Selective Repeat transfer.
#[derive(Debug)]
pub struct Sender {
    cfg: SelectiveRepeatConfig,
    rtt: RttEstimator,
    timeout: Duration,
    stats: TransferStats,
}

impl Sender {
    pub fn new(cfg: SelectiveRepeatConfig) -> Self {
        Self {
            timeout: cfg.base_timeout,
            cfg,
            rtt: RttEstimator::new(),
            stats: TransferStats::default(),
        }
    }

    /// Streams `filesize` bytes of `file` to `peer`.
    ///
    /// The loop alternates four phases until the file is exhausted and the
    /// in-flight map is empty: fill the window, retransmit expired frames,
    /// poll for ACKs, and yield briefly when the window is full. A short
    /// drain then absorbs ACKs for retransmissions the receiver had
    /// already settled.
    pub async fn run(
        mut self,
        endpoint: &Endpoint,
        peer: SocketAddr,
        file: &mut File,
        filesize: u64,
    ) -> Result<TransferStats> {
        let started = Instant::now();
        let mut base: u64 = 0;
        let mut next: u64 = 0;
        let mut sent: u64 = 0;
        let mut inflight: HashMap<u64, InFlight> = HashMap::new();

        while sent < filesize || !inflight.is_empty() {
            // Fill the window with fresh frames.
            while next < base + self.cfg.window && sent < filesize {
                let len = (filesize - sent).min(MSS as u64) as usize;
                let mut payload = vec![0u8; len];
                file.read_exact(&mut payload).await?;
                let wire = DataFrame { seq: next, payload: &payload }.encode();

                endpoint.send_to(&wire, peer).await?;
                inflight.insert(next, InFlight { wire, sent_at: Instant::now(), retries: 0 });

                next += 1;
                sent += len as u64;
                self.stats.frames += 1;
                self.stats.max_in_flight = self.stats.max_in_flight.max(inflight.len());
                if self.stats.frames % PROGRESS_INTERVAL == 0 {
                    log::debug!("sent {sent}/{filesize} bytes, window [{base}, {next})");
                }
            }

            // Retransmit every frame whose timer expired.
            let now = Instant::now();
            for (&seq, entry) in inflight.iter_mut() {
                if now.duration_since(entry.sent_at) > self.timeout {
                    if entry.retries >= self.cfg.max_retries {
                        log::error!("frame {seq} lost after {} retransmissions", entry.retries);
                        return Err(Error::RetryExhausted { seq });
                    }
                    endpoint.send_to(&entry.wire, peer).await?;
                    entry.sent_at = now;
                    entry.retries += 1;
                    self.stats.retransmissions += 1;
                }
            }

            // Poll for one ACK.
            if let Some(acked) = self.poll_ack(endpoint).await? {
                if let Some(entry) = inflight.remove(&acked) {
                    // A retransmitted frame's ACK is ambiguous between
                    // transmissions and yields no sample.
                    if entry.retries == 0 {
                        self.rtt.record(entry.sent_at.elapsed());
                        self.timeout = self.rtt.timeout(
                            self.cfg.rtt_multiplier,
                            self.cfg.base_timeout,
                            self.cfg.max_timeout,
                        );
                    }
                    while !inflight.contains_key(&base) && base < next {
                        base += 1;
                    }
                } else {
                    self.stats.duplicates += 1;
                }
            }

            // Window full: give ACKs a moment to arrive before refilling.
            if inflight.len() >= self.cfg.window as usize {
                tokio::time::sleep(self.cfg.window_full_backoff).await;
            }
        }

        self.stats.bytes = sent;
        self.stats.elapsed = started.elapsed();
        log::debug!(
            "selective-repeat send done: {sent} bytes, {} retransmissions",
            self.stats.retransmissions
        );

        self.drain(endpoint).await?;
        Ok(self.stats)
    }

    /// Waits up to the poll bound for one parseable ACK.
    async fn poll_ack(&mut self, endpoint: &Endpoint) -> Result<Option<u64>> {
        let mut buf = [0u8; ACK_BUFFER];
        match endpoint.recv_from_timeout(&mut buf, self.cfg.ack_poll).await {
            Err(Error::Timeout) => Ok(None),
            Err(e) => Err(e),
            Ok((n, _)) => Ok(frame::parse_ack(&buf[..n]).ok()),
        }
    }

    /// Absorbs stale ACKs for the drain period so the receiver's trailing
    /// re-ACKs do not linger in the socket buffer.
    async fn drain(&mut self, endpoint: &Endpoint) -> Result<()> {
        let deadline = Instant::now() + self.cfg.drain;
        let mut buf = [0u8; ACK_BUFFER];

        while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
            match endpoint.recv_from_timeout(&mut buf, remaining).await {
                Err(Error::Timeout) => break,
                Err(e) => return Err(e),
                Ok(_) => self.stats.duplicates += 1,
            }
        }
        Ok(())
    }
}

/// Receiving side of a Selective Repeat transfer.
#[derive(Debug)]
pub struct Receiver {
    cfg: SelectiveRepeatConfig,
    stats: TransferStats,
}

impl Receiver {
    pub fn new(cfg: SelectiveRepeatConfig) -> Self {
        Self { cfg, stats: TransferStats::default() }
    }

    /// Receives `filesize` bytes into `file`, ACKing every in-window and
    /// below-window frame to its source address, then drains trailing
    /// duplicates.
    pub async fn run(
        mut self,
        endpoint: &Endpoint,
        file: &mut File,
        filesize: u64,
    ) -> Result<TransferStats> {
        let started = Instant::now();
        let mut base: u64 = 0;
        let mut received: u64 = 0;
        let mut pending: HashMap<u64, Vec<u8>> = HashMap::new();
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

            if data.seq >= base && data.seq < base + self.cfg.window {
                if pending.contains_key(&data.seq) {
                    self.stats.duplicates += 1;
                } else {
                    pending.insert(data.seq, data.payload.to_vec());
                    self.stats.frames += 1;
                    self.stats.max_in_flight = self.stats.max_in_flight.max(pending.len());
                }

                // Flush the in-order prefix to the sink.
                while let Some(chunk) = pending.remove(&base) {
                    let take = chunk.len().min((filesize - received) as usize);
                    file.write_all(&chunk[..take]).await?;
                    received += take as u64;
                    base += 1;
                }

                endpoint.send_to(&frame::encode_ack(data.seq), from).await?;
                if self.stats.frames % PROGRESS_INTERVAL == 0 {
                    log::debug!("received {received}/{filesize} bytes, base {base}");
                }
            } else if data.seq < base {
                // Already delivered; the sender missed the ACK.
                self.stats.duplicates += 1;
                endpoint.send_to(&frame::encode_ack(data.seq), from).await?;
            }
            // seq >= base + window: too far ahead, dropped without an ACK.
        }

        file.flush().await?;
        self.drain(endpoint, base).await?;

        self.stats.bytes = received;
        self.stats.elapsed = started.elapsed();
        Ok(self.stats)
    }

    /// Keeps re-ACKing late duplicates below the window base for the drain
    /// period.
    async fn drain(&mut self, endpoint: &Endpoint, base: u64) -> Result<()> {
        let deadline = Instant::now() + self.cfg.drain;
        let mut buf = vec![0u8; DATA_BUFFER];

        while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
            match endpoint.recv_from_timeout(&mut buf, remaining).await {
                Err(Error::Timeout) => break,
                Err(e) => return Err(e),
                Ok((n, from)) => {
                    if let Ok(data) = DataFrame::parse(&buf[..n]) {
                        if data.seq < base {
                            self.stats.duplicates += 1;
                            endpoint.send_to(&frame::encode_ack(data.seq), from).await?;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
