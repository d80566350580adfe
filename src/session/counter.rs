//! Shared traffic counter.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonically increasing byte counter for one session.
///
/// `add` returns the new total so the caller can check the traffic budget in
/// the same step that recorded the bytes.
#[derive(Debug, Default)]
pub struct TrafficCounter {
    total: AtomicU64,
}

impl TrafficCounter {
    pub fn new() -> Self {
        Self {
            total: AtomicU64::new(0),
        }
    }

    /// Record `n` received bytes and return the new total.
    pub fn add(&self, n: u64) -> u64 {
        self.total.fetch_add(n, Ordering::Relaxed) + n
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Zero the counter. Only valid between sessions.
    pub fn reset(&self) {
        self.total.store(0, Ordering::Relaxed);
    }
}
