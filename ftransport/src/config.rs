//! Protocol constants and per-protocol tunables.

use std::time::Duration;

/// Largest payload byte count placed in a single data frame.
pub const MSS: usize = 1024;

/// Receive buffer for data frames: MSS plus slack for the ASCII header.
pub const DATA_BUFFER: usize = MSS + 32;

/// Receive buffer for ACK frames.
pub const ACK_BUFFER: usize = 64;

/// Receive buffer for handshake datagrams.
pub const HANDSHAKE_BUFFER: usize = 512;

/// First wait for a handshake reply; doubles on every re-send.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(1);

/// How many times an initiation is sent before the client gives up.
pub const HANDSHAKE_RETRIES: u32 = 5;

/// Tunables for the Stop-and-Wait protocol.
#[derive(Debug, Clone)]
pub struct StopAndWaitConfig {
    /// ACK wait before the first RTT measurement, and the timeout floor.
    pub initial_timeout: Duration,

    /// Timeout ceiling.
    pub max_timeout: Duration,

    /// Multiplier applied to the timeout after each expiry.
    pub backoff: f64,

    /// Multiplier applied to the RTT estimate to derive the timeout.
    pub rtt_multiplier: f64,

    /// Retransmissions allowed per frame before the session aborts.
    pub max_retries: u32,

    /// Receiver-side idle budget; expiry fails the session.
    pub idle_timeout: Duration,

    /// How long the receiver keeps re-ACKing trailing duplicates.
    pub drain: Duration,
}

impl Default for StopAndWaitConfig {
    fn default() -> Self {
        Self {
            initial_timeout: Duration::from_millis(20),
            max_timeout: Duration::from_millis(500),
            backoff: 1.3,
            rtt_multiplier: 2.5,
            max_retries: 20,
            idle_timeout: Duration::from_secs(30),
            drain: Duration::from_secs(2),
        }
    }
}

/// Tunables for the Selective Repeat protocol.
#[derive(Debug, Clone)]
pub struct SelectiveRepeatConfig {
    /// Cap on sequence numbers in flight: `next - base <= window`.
    pub window: u64,

    /// Timeout floor, used before the first RTT measurement.
    pub base_timeout: Duration,

    /// Timeout ceiling.
    pub max_timeout: Duration,

    /// Multiplier applied to the RTT estimate to derive the timeout.
    pub rtt_multiplier: f64,

    /// Retransmissions allowed per frame before the session aborts.
    pub max_retries: u32,

    /// Bound on each non-blocking ACK poll.
    pub ack_poll: Duration,

    /// Yield when the in-flight map is at capacity.
    pub window_full_backoff: Duration,

    /// Receiver-side idle budget; expiry fails the session.
    pub idle_timeout: Duration,

    /// Post-completion interval for re-ACKing duplicates (receiver)
    /// and absorbing stale ACKs (sender).
    pub drain: Duration,
}

impl Default for SelectiveRepeatConfig {
    fn default() -> Self {
        Self {
            window: 32,
            base_timeout: Duration::from_millis(50),
            max_timeout: Duration::from_millis(500),
            rtt_multiplier: 3.0,
            max_retries: 20,
            ack_poll: Duration::from_millis(50),
            window_full_backoff: Duration::from_millis(10),
            idle_timeout: Duration::from_secs(60),
            drain: Duration::from_secs(2),
        }
    }
}

/// Config bundle for both protocols, as carried by a session.
#[derive(Debug, Clone, Default)]
pub struct TransferConfig {
    pub stop_and_wait: StopAndWaitConfig,
    pub selective_repeat: SelectiveRepeatConfig,
}
