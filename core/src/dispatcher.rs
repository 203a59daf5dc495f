//! Single-lane request queue.
//!
//! # Design
//! Callers on any number of tasks `push` descriptors; the dispatcher runs
//! them against the transport strictly one at a time, in arrival order.
//!
//! The lane is an `idle` flag plus a FIFO of `QueueEntry`, both guarded by
//! one mutex that is never held across an await. The push that finds the
//! lane idle flips it to busy and spawns a drain task; later pushes only
//! enqueue. The drain task pops the head, runs it to completion, settles the
//! caller's oneshot, and repeats until it finds the queue empty, at which
//! point it marks the lane idle under the same lock.
//!
//! A dropped caller does not withdraw its request: the entry still runs and
//! its settlement is discarded.
//!
//! If the drain task stops without reaching an empty queue (the transport
//! panicked, or the runtime shut down mid-call), a drop guard returns the
//! lane to idle and settles every stranded entry with
//! `SdkError::DispatcherClosed`, so later pushes start a fresh drain.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::SdkError;
use crate::http::HttpRequest;
use crate::transport::Transport;

type Completion = oneshot::Sender<Result<Value, SdkError>>;

struct QueueEntry {
    request: HttpRequest,
    completion: Completion,
}

struct Lane {
    idle: bool,
    queue: VecDeque<QueueEntry>,
}

struct Shared {
    transport: Arc<dyn Transport>,
    lane: Mutex<Lane>,
}

impl Shared {
    fn lane(&self) -> MutexGuard<'_, Lane> {
        self.lane.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    shared: Arc<Shared>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            shared: Arc::new(Shared {
                transport,
                lane: Mutex::new(Lane {
                    idle: true,
                    queue: VecDeque::new(),
                }),
            }),
        }
    }

    /// Queue `request` and wait for its parsed JSON body.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn push(&self, request: HttpRequest) -> Result<Value, SdkError> {
        let (completion, settled) = oneshot::channel();
        let method = request.method;
        let url = request.url.clone();

        let start_drain = {
            let mut lane = self.shared.lane();
            lane.queue.push_back(QueueEntry { request, completion });
            tracing::debug!(%method, %url, depth = lane.queue.len(), "request queued");
            if lane.idle {
                lane.idle = false;
                true
            } else {
                false
            }
        };
        if start_drain {
            tokio::spawn(drain(Arc::clone(&self.shared)));
        }

        settled.await.map_err(|_| SdkError::DispatcherClosed)?
    }

    /// Requests waiting behind the one in flight.
    pub fn pending(&self) -> usize {
        self.shared.lane().queue.len()
    }

    pub fn is_idle(&self) -> bool {
        self.shared.lane().idle
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lane = self.shared.lane();
        f.debug_struct("Dispatcher")
            .field("idle", &lane.idle)
            .field("pending", &lane.queue.len())
            .finish()
    }
}

/// Owned by the drain task; frees the lane if the task ends early.
struct Release {
    shared: Arc<Shared>,
    armed: bool,
}

impl Release {
    /// Pops the head, or marks the lane idle and disarms once the queue is empty.
    fn next(&mut self) -> Option<QueueEntry> {
        let mut lane = self.shared.lane();
        let entry = lane.queue.pop_front();
        if entry.is_none() {
            lane.idle = true;
            self.armed = false;
        }
        entry
    }
}

impl Drop for Release {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let stranded: Vec<QueueEntry> = {
            let mut lane = self.shared.lane();
            lane.idle = true;
            lane.queue.drain(..).collect()
        };
        tracing::warn!(stranded = stranded.len(), "request lane stopped before draining");
        for entry in stranded {
            let _ = entry.completion.send(Err(SdkError::DispatcherClosed));
        }
    }
}

async fn drain(shared: Arc<Shared>) {
    let mut release = Release { shared, armed: true };
    while let Some(entry) = release.next() {
        let result = handle(release.shared.transport.as_ref(), &entry.request).await;
        if entry.completion.send(result).is_err() {
            tracing::debug!(url = %entry.request.url, "caller went away before its request settled");
        }
    }
}

async fn handle(transport: &dyn Transport, request: &HttpRequest) -> Result<Value, SdkError> {
    tracing::debug!(method = %request.method, url = %request.url, "dispatching request");
    let response = transport.execute(request).await?;

    if !response.is_ok() {
        tracing::debug!(method = %request.method, url = %request.url, status = response.status, "request failed");
        return Err(SdkError::http_status(response.status, request.method.as_str(), &request.url));
    }

    tracing::debug!(method = %request.method, url = %request.url, status = response.status, "request settled");
    response.json().map_err(|source| SdkError::Decode {
        url: request.url.clone(),
        source,
    })
}
