//! Session lifecycle event log.
//!
//! Every lifecycle transition (connections, completions, errors, stop
//! conditions) is appended as a timestamped record, kept in order for the
//! final summary and forwarded to live subscribers.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::units::format_bytes;

// ---------------------------------------------------------------------------
// EventKind
// ---------------------------------------------------------------------------

/// Categories of lifecycle events recorded during a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum EventKind {
    SessionStarted { threads: u32, target_bytes: u64 },
    ThreadConnected { id: u32 },
    /// The stream ended naturally before the budget was met; the slot
    /// reconnects after a fixed delay.
    ThreadCompleted { id: u32 },
    ThreadFailed { id: u32, reason: String },
    ThreadStopped { id: u32 },
    TargetReached { total_bytes: u64 },
    StoppedByUser,
    AllThreadsInterrupted,
}

// ---------------------------------------------------------------------------
// EventRecord
// ---------------------------------------------------------------------------

/// One entry in the append-only session log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl fmt::Display for EventRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ", self.timestamp.format("%H:%M:%S"))?;
        match &self.kind {
            EventKind::SessionStarted {
                threads,
                target_bytes,
            } => write!(
                f,
                "test started: {} threads, target {}",
                threads,
                format_bytes(*target_bytes)
            ),
            EventKind::ThreadConnected { id } => write!(f, "thread {id} connected"),
            EventKind::ThreadCompleted { id } => {
                write!(f, "thread {id} completed, reconnecting")
            }
            EventKind::ThreadFailed { id, reason } => write!(f, "thread {id} error: {reason}"),
            EventKind::ThreadStopped { id } => write!(f, "thread {id} stopped"),
            EventKind::TargetReached { total_bytes } => {
                write!(f, "target reached: {}", format_bytes(*total_bytes))
            }
            EventKind::StoppedByUser => write!(f, "stopped by user"),
            EventKind::AllThreadsInterrupted => write!(f, "all threads interrupted"),
        }
    }
}

// ---------------------------------------------------------------------------
// EventLog
// ---------------------------------------------------------------------------

/// Append-only event log owned by the controller run task.
#[derive(Debug)]
pub struct EventLog {
    entries: Vec<EventRecord>,
    live: broadcast::Sender<EventRecord>,
}

impl EventLog {
    pub fn new(live: broadcast::Sender<EventRecord>) -> Self {
        Self {
            entries: Vec::new(),
            live,
        }
    }

    /// Stamp and append an event, forwarding it to any live subscribers.
    pub fn push(&mut self, kind: EventKind) {
        let record = EventRecord {
            timestamp: Utc::now(),
            kind,
        };
        debug!(event = %record, "session event");
        // A send error just means nobody is subscribed right now.
        let _ = self.live.send(record.clone());
        self.entries.push(record);
    }

    pub fn entries(&self) -> &[EventRecord] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<EventRecord> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_log() -> (EventLog, broadcast::Receiver<EventRecord>) {
        let (tx, rx) = broadcast::channel(16);
        (EventLog::new(tx), rx)
    }

    #[test]
    fn test_entries_are_append_only_in_order() {
        let (mut log, _rx) = make_log();
        log.push(EventKind::ThreadConnected { id: 0 });
        log.push(EventKind::ThreadCompleted { id: 0 });
        log.push(EventKind::StoppedByUser);

        let kinds: Vec<_> = log.entries().iter().map(|e| e.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::ThreadConnected { id: 0 },
                EventKind::ThreadCompleted { id: 0 },
                EventKind::StoppedByUser,
            ]
        );
    }

    #[test]
    fn test_live_subscriber_receives_pushes() {
        let (mut log, mut rx) = make_log();
        log.push(EventKind::TargetReached {
            total_bytes: 1_048_576,
        });

        let record = rx.try_recv().unwrap();
        assert_eq!(
            record.kind,
            EventKind::TargetReached {
                total_bytes: 1_048_576
            }
        );
    }

    #[test]
    fn test_display_is_timestamped_to_the_second() {
        let (mut log, _rx) = make_log();
        log.push(EventKind::ThreadConnected { id: 3 });

        let line = log.entries()[0].to_string();
        // "[HH:MM:SS] thread 3 connected"
        assert_eq!(line.len(), "[HH:MM:SS] thread 3 connected".len());
        assert!(line.starts_with('['));
        assert!(line.ends_with("thread 3 connected"));
    }

    #[test]
    fn test_serialization_carries_kind_tag() {
        let (mut log, _rx) = make_log();
        log.push(EventKind::ThreadFailed {
            id: 1,
            reason: "connection refused".into(),
        });

        let json = serde_json::to_string(&log.entries()[0]).unwrap();
        assert!(json.contains("\"kind\":\"thread_failed\""));
        assert!(json.contains("\"reason\":\"connection refused\""));

        let parsed: EventRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.kind, log.entries()[0].kind);
    }
}
