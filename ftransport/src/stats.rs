//! Per-transfer counters.

use std::time::Duration;

/// Counters accumulated over one protocol run and returned to the caller.
#[derive(Debug, Default, Clone, Copy)]
pub struct TransferStats {
    /// Payload bytes delivered (sender: read and acknowledged; receiver:
    /// written to the sink).
    pub bytes: u64,

    /// Distinct data frames sent or delivered in order.
    pub frames: u64,

    /// Frames sent more than once (sender side).
    pub retransmissions: u64,

    /// Duplicate or stale frames observed.
    pub duplicates: u64,

    /// High-water mark of the in-flight map (sender) or the out-of-order
    /// buffer (receiver).
    pub max_in_flight: usize,

    /// Wall-clock duration of the transfer, drain excluded.
    pub elapsed: Duration,
}

impl TransferStats {
    /// Retransmitted share of all transmissions, as a percentage.
    pub fn retransmit_rate(&self) -> f64 {
        if self.frames == 0 {
            0.0
        } else {
            self.retransmissions as f64 / (self.frames + self.retransmissions) as f64 * 100.0
        }
    }

    /// Mean payload throughput in bytes per second.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 { 0.0 } else { self.bytes as f64 / secs }
    }
}
