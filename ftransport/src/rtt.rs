//! Adaptive round-trip-time estimation.
//!
//! Both protocols derive their retransmission timeout from a smoothed RTT
//! estimate: the first sample initializes the estimate, and every later
//! sample is blended in with weight `1 - ALPHA`.

use std::time::Duration;

/// Weight of the previous estimate in the exponential average.
const ALPHA: f64 = 0.7;

/// Exponentially smoothed RTT estimator.
#[derive(Debug, Default, Clone, Copy)]
pub struct RttEstimator {
    estimate: Option<Duration>,
}

impl RttEstimator {
    /// Creates an estimator with no samples yet.
    pub const fn new() -> Self {
        Self { estimate: None }
    }

    /// Folds one measured round trip into the estimate.
    pub fn record(&mut self, sample: Duration) {
        self.estimate = Some(match self.estimate {
            None => sample,
            Some(est) => est.mul_f64(ALPHA) + sample.mul_f64(1.0 - ALPHA),
        });
    }

    /// Returns the current estimate, if any sample has been recorded.
    pub const fn estimate(&self) -> Option<Duration> {
        self.estimate
    }

    /// Derives the next timeout: `estimate * multiplier`, clamped to
    /// `[floor, ceil]`. Returns `floor` before the first sample.
    pub fn timeout(&self, multiplier: f64, floor: Duration, ceil: Duration) -> Duration {
        match self.estimate {
            None => floor,
            Some(est) => est.mul_f64(multiplier).clamp(floor, ceil),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_initializes_estimate() {
        let mut rtt = RttEstimator::new();
        assert_eq!(rtt.estimate(), None);

        rtt.record(Duration::from_millis(40));
        assert_eq!(rtt.estimate(), Some(Duration::from_millis(40)));
    }

    #[test]
    fn later_samples_are_smoothed() {
        let mut rtt = RttEstimator::new();
        rtt.record(Duration::from_millis(100));
        rtt.record(Duration::from_millis(200));

        // 0.7 * 100ms + 0.3 * 200ms
        assert_eq!(rtt.estimate(), Some(Duration::from_millis(130)));
    }

    #[test]
    fn timeout_is_clamped() {
        let floor = Duration::from_millis(50);
        let ceil = Duration::from_millis(500);

        let mut rtt = RttEstimator::new();
        assert_eq!(rtt.timeout(3.0, floor, ceil), floor);

        rtt.record(Duration::from_millis(10));
        assert_eq!(rtt.timeout(3.0, floor, ceil), floor);

        rtt.record(Duration::from_secs(2));
        assert_eq!(rtt.timeout(3.0, floor, ceil), ceil);
    }
}
