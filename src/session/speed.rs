//! Moving-average throughput estimation.

use std::collections::VecDeque;
use std::time::Instant;

/// Smooths instantaneous rates over a sliding window of recent samples.
///
/// Each [`sample`](SpeedWindow::sample) call derives one instantaneous rate
/// from the counter delta since the previous call, pushes it into the window
/// (evicting the oldest at capacity), and returns the arithmetic mean of the
/// window. The estimator is cadence-agnostic: any positive sampling interval
/// yields a correct rate, the controller just happens to drive it at a fixed
/// tick.
#[derive(Debug)]
pub struct SpeedWindow {
    capacity: usize,
    samples: VecDeque<f64>,
    last_total: u64,
    last_at: Instant,
}

impl SpeedWindow {
    /// `started_at` primes the first delta, so the first sample measures from
    /// session start.
    pub fn new(capacity: usize, started_at: Instant) -> Self {
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
            last_total: 0,
            last_at: started_at,
        }
    }

    /// Record a counter snapshot and return the smoothed rate in bytes/sec.
    pub fn sample(&mut self, current_total: u64, now: Instant) -> f64 {
        let delta_bytes = current_total.saturating_sub(self.last_total) as f64;
        let delta_secs = now.saturating_duration_since(self.last_at).as_secs_f64();

        // A zero-length interval cannot produce a rate; it contributes 0
        // instead of dividing by zero.
        let instant_rate = if delta_secs > 0.0 {
            delta_bytes / delta_secs
        } else {
            0.0
        };

        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(instant_rate);
        self.last_total = current_total;
        self.last_at = now;

        self.average().unwrap_or(0.0)
    }

    /// Mean of the current window; `None` before the first sample.
    pub fn average(&self) -> Option<f64> {
        if self.samples.is_empty() {
            None
        } else {
            Some(self.samples.iter().sum::<f64>() / self.samples.len() as f64)
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
