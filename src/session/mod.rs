//! Throughput test sessions: traffic counter, speed estimation, transfer
//! workers, and the orchestrating controller.

pub mod controller;
pub mod counter;
pub mod events;
pub mod speed;
pub mod worker;

pub use controller::TestController;
pub use counter::TrafficCounter;
pub use events::{EventKind, EventLog, EventRecord};
pub use speed::SpeedWindow;

use std::fmt;
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::endpoint::EndpointError;

/// Sampling period for the speed/progress tick loop.
pub const TICK_PERIOD: Duration = Duration::from_millis(100);

/// Delay between a natural end-of-body and the slot's next connection.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Moving-average window capacity, in ticks.
pub const SPEED_WINDOW: usize = 10;

/// Inclusive bounds on concurrent transfer slots.
pub const MIN_THREADS: u32 = 1;
pub const MAX_THREADS: u32 = 16;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("thread count must be between 1 and 16, got {0}")]
    InvalidThreadCount(u32),

    #[error("traffic budget must be at least one byte")]
    InvalidBudget,

    #[error(transparent)]
    Endpoint(#[from] EndpointError),
}

// ---------------------------------------------------------------------------
// SessionParams
// ---------------------------------------------------------------------------

/// Validated parameters for one test session.
#[derive(Debug, Clone)]
pub struct SessionParams {
    pub url: Url,
    pub thread_count: u32,
    pub target_bytes: u64,
}

impl SessionParams {
    /// Parse and validate raw inputs.
    pub fn new(url: &str, thread_count: u32, target_bytes: u64) -> Result<Self, SessionError> {
        let params = Self {
            url: crate::endpoint::parse_custom_url(url)?,
            thread_count,
            target_bytes,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        if !(MIN_THREADS..=MAX_THREADS).contains(&self.thread_count) {
            return Err(SessionError::InvalidThreadCount(self.thread_count));
        }
        if self.target_bytes == 0 {
            return Err(SessionError::InvalidBudget);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Outcome types
// ---------------------------------------------------------------------------

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The traffic budget was consumed.
    TargetReached,
    /// Operator-initiated stop.
    UserStopped,
    /// Every transfer slot failed before the budget was met.
    AllWorkersFailed,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::TargetReached => write!(f, "target reached"),
            StopReason::UserStopped => write!(f, "stopped by user"),
            StopReason::AllWorkersFailed => write!(f, "all threads interrupted"),
        }
    }
}

/// Final accounting for a completed session.
///
/// `total_bytes` reports actual bytes moved; it may exceed the target by up
/// to one chunk per in-flight worker and is never clamped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub reason: StopReason,
    pub total_bytes: u64,
    pub elapsed_secs: f64,
    /// Mean throughput over the whole session, bytes per second.
    pub mean_bytes_per_sec: f64,
    /// The chronological lifecycle log.
    pub events: Vec<EventRecord>,
}

/// Live metrics published once per tick.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub smoothed_bytes_per_sec: f64,
    pub total_bytes: u64,
    /// 0.0 to 100.0, capped.
    pub progress_pct: f64,
    pub elapsed_secs: f64,
}
