//! Transfer worker: one logical download stream with reconnect-on-completion.
//!
//! A worker owns a slot id that is stable across reconnects, so a restarted
//! connection still appears as the same thread to observers. Test endpoints
//! are finite resources; chaining fresh connections under one slot
//! approximates the unbounded stream a sustained throughput test needs.

use futures::StreamExt;
use reqwest::{header, Client, Url};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::RECONNECT_DELAY;
use crate::endpoint;

// ---------------------------------------------------------------------------
// WorkerEvent
// ---------------------------------------------------------------------------

/// Reports from a worker to the controller run task. Workers never touch
/// session state directly.
#[derive(Debug)]
pub(crate) enum WorkerEvent {
    /// A connection attempt succeeded (first connection or a reconnect).
    Connected { id: u32 },
    /// One body chunk arrived; `len` bytes to attribute to the session.
    Bytes { id: u32, len: u64 },
    /// The response body ended naturally before cancellation.
    Completed { id: u32 },
    /// Terminal transport failure; the slot will not reconnect.
    Failed { id: u32, error: String },
}

enum StreamOutcome {
    Completed,
    Cancelled,
    Failed(String),
}

// ---------------------------------------------------------------------------
// TransferWorker
// ---------------------------------------------------------------------------

/// One logical download slot.
pub(crate) struct TransferWorker {
    id: u32,
    client: Client,
    base_url: Url,
    events: mpsc::UnboundedSender<WorkerEvent>,
    cancel: CancellationToken,
}

impl TransferWorker {
    pub(crate) fn spawn(
        id: u32,
        client: Client,
        base_url: Url,
        events: mpsc::UnboundedSender<WorkerEvent>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let worker = Self {
            id,
            client,
            base_url,
            events,
            cancel,
        };
        tokio::spawn(worker.run())
    }

    /// Supervisory loop: stream until the body ends, wait out the reconnect
    /// delay, then open a fresh connection under the same id. Ends on
    /// cancellation or terminal failure.
    async fn run(self) {
        loop {
            match self.stream_once().await {
                StreamOutcome::Completed => {
                    let _ = self.events.send(WorkerEvent::Completed { id: self.id });
                    // A stop during the delay suppresses the reconnect.
                    tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                    }
                }
                StreamOutcome::Cancelled => break,
                StreamOutcome::Failed(error) => {
                    warn!(id = self.id, error = error.as_str(), "transfer slot failed");
                    let _ = self.events.send(WorkerEvent::Failed {
                        id: self.id,
                        error,
                    });
                    break;
                }
            }
        }
        debug!(id = self.id, "transfer slot exited");
    }

    /// Drive a single connection until end-of-body, failure, or cancellation.
    ///
    /// Cancellation is checked before the request is issued, while awaiting
    /// each chunk, and again after a chunk arrives: a cancel that lands
    /// mid-read must not be reported as bytes.
    async fn stream_once(&self) -> StreamOutcome {
        if self.cancel.is_cancelled() {
            return StreamOutcome::Cancelled;
        }

        let url = endpoint::connection_url(&self.base_url, self.id);
        debug!(id = self.id, url = %url, "opening connection");

        let request = self
            .client
            .get(url)
            .header(header::CACHE_CONTROL, "no-cache")
            .send();

        let response = tokio::select! {
            _ = self.cancel.cancelled() => return StreamOutcome::Cancelled,
            result = request => match result {
                Ok(resp) => resp,
                Err(e) => return StreamOutcome::Failed(e.to_string()),
            },
        };

        if !response.status().is_success() {
            return StreamOutcome::Failed(format!("unexpected status {}", response.status()));
        }

        let _ = self.events.send(WorkerEvent::Connected { id: self.id });

        let mut stream = response.bytes_stream();
        loop {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => return StreamOutcome::Cancelled,
                next = stream.next() => next,
            };
            match next {
                Some(Ok(chunk)) => {
                    if self.cancel.is_cancelled() {
                        return StreamOutcome::Cancelled;
                    }
                    let _ = self.events.send(WorkerEvent::Bytes {
                        id: self.id,
                        len: chunk.len() as u64,
                    });
                }
                Some(Err(e)) => return StreamOutcome::Failed(e.to_string()),
                None => return StreamOutcome::Completed,
            }
        }
    }
}
