//! Block-rate estimation from device timestamps.
//!
//! The device stamps every frame with a free-running millisecond tick that
//! wraps at 2^32. Host arrival times are useless for rate measurement (USB
//! scheduling adds milliseconds of jitter), so the estimator works purely on
//! device ticks: consecutive deltas over a sliding window, wraparound
//! corrected, reduced with the median so isolated outliers do not move the
//! estimate.

use std::collections::VecDeque;

/// Default sliding-window capacity, in timestamps.
pub const DEFAULT_RATE_WINDOW: usize = 400;

/// Windowed, median-based rate estimator over 32-bit millisecond ticks.
#[derive(Debug, Clone)]
pub struct RateEstimator {
    window: VecDeque<u32>,
    capacity: usize,
}

impl Default for RateEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_RATE_WINDOW)
    }
}

impl RateEstimator {
    /// Create an estimator holding at most `capacity` timestamps.
    /// A capacity below 2 is raised to 2, the minimum that yields a delta.
    pub fn new(capacity: usize) -> Self {
        Self { window: VecDeque::new(), capacity: capacity.max(2) }
    }

    /// Record one device timestamp, evicting the oldest beyond capacity.
    pub fn observe(&mut self, timestamp: u32) {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(timestamp);
    }

    /// Current estimate in Hz, or `None` with fewer than two samples or a
    /// zero median delta.
    pub fn estimate(&self) -> Option<f64> {
        if self.window.len() < 2 {
            return None;
        }
        let mut deltas: Vec<i64> = self
            .window
            .iter()
            .zip(self.window.iter().skip(1))
            .map(|(&a, &b)| {
                let dt = b as i64 - a as i64;
                // The tick wrapped between the two frames.
                if dt < 0 { dt + (1i64 << 32) } else { dt }
            })
            .collect();
        deltas.sort_unstable();
        let median_ms = deltas[deltas.len() / 2];
        if median_ms <= 0 {
            return None;
        }
        Some(1000.0 / median_ms as f64)
    }

    /// Number of buffered timestamps.
    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Forget all samples.
    pub fn clear(&mut self) {
        self.window.clear();
    }
}
