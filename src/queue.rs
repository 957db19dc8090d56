use std::{
    collections::VecDeque,
    sync::{Mutex, MutexGuard},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{doc_path::DocPath, store::DocumentStore};

/// Failed refresh attempts after which a queued document is given up on.
pub const MAX_ATTEMPTS: u32 = 5;

/// Why a document was queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reason {
    Force,
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    pub path: DocPath,
    pub enqueued_at: DateTime<Utc>,
    pub reason: Reason,
    #[serde(default)]
    pub attempts: u32,
}

/// Outcome of one [`UpdateQueue::drain`] cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub refreshed: Vec<DocPath>,
    /// Items that failed and stay queued, with the error text.
    pub failed: Vec<(DocPath, String)>,
    /// Items that hit [`MAX_ATTEMPTS`] and were removed.
    pub dropped: Vec<DocPath>,
}

/// De-duplicated FIFO of documents waiting to be re-downloaded.
///
/// At most one item per path is outstanding. An item taken by
/// [`drain`](Self::drain) is in flight rather than outstanding, so the
/// same path may be queued again while its download runs. In-flight items
/// still count towards [`len`](Self::len) and [`items`](Self::items) until
/// their download finishes, and go back to the front of the queue if the
/// drain is abandoned.
#[derive(Debug, Default)]
pub struct UpdateQueue {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    pending: VecDeque<QueueItem>,
    in_flight: Vec<QueueItem>,
}

impl Inner {
    fn is_pending(&self, path: &DocPath) -> bool {
        self.pending.iter().any(|item| &item.path == path)
    }

    /// In-flight items first, then pending ones, one per path.
    fn snapshot(&self) -> Vec<QueueItem> {
        let mut items: Vec<QueueItem> = Vec::new();
        for item in self.in_flight.iter().chain(self.pending.iter()) {
            if !items.iter().any(|i| i.path == item.path) {
                items.push(item.clone());
            }
        }
        items
    }
}

/// An item whose download is running. Dropping it without
/// [`land`](Self::land) puts the item back at the front of the queue.
struct InFlight<'a> {
    queue: &'a UpdateQueue,
    item: QueueItem,
    landed: bool,
}

impl InFlight<'_> {
    fn path(&self) -> &DocPath {
        &self.item.path
    }

    /// The download finished; take the item out of flight.
    fn land(mut self) -> QueueItem {
        self.landed = true;
        let mut inner = self.queue.lock();
        if let Some(pos) = inner.in_flight.iter().position(|i| *i == self.item) {
            inner.in_flight.remove(pos);
        }
        self.item.clone()
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.landed {
            return;
        }
        let mut inner = self.queue.lock();
        if let Some(pos) = inner.in_flight.iter().position(|i| *i == self.item) {
            let item = inner.in_flight.remove(pos);
            if !inner.is_pending(&item.path) {
                inner.pending.push_front(item);
            }
        }
    }
}

impl UpdateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a persisted queue, keeping the first item for each path.
    pub fn from_items(items: Vec<QueueItem>) -> Self {
        let queue = Self::new();
        {
            let mut inner = queue.lock();
            for item in items {
                if !inner.is_pending(&item.path) {
                    inner.pending.push_back(item);
                }
            }
        }
        queue
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Append `path` unless it is already outstanding. Returns whether an
    /// item was added.
    pub fn enqueue(&self, path: DocPath, reason: Reason) -> bool {
        let mut inner = self.lock();
        if inner.is_pending(&path) {
            return false;
        }
        inner.pending.push_back(QueueItem {
            path,
            enqueued_at: Utc::now(),
            reason,
            attempts: 0,
        });
        true
    }

    pub fn len(&self) -> usize {
        self.lock().snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        let inner = self.lock();
        inner.pending.is_empty() && inner.in_flight.is_empty()
    }

    pub fn contains(&self, path: &DocPath) -> bool {
        self.lock().is_pending(path)
    }

    /// Snapshot of the queue for display and persistence: in-flight items
    /// first, then outstanding items oldest first.
    pub fn items(&self) -> Vec<QueueItem> {
        self.lock().snapshot()
    }

    fn take_front(&self) -> Option<InFlight<'_>> {
        let mut inner = self.lock();
        let item = inner.pending.pop_front()?;
        inner.in_flight.push(item.clone());
        Some(InFlight {
            queue: self,
            item,
            landed: false,
        })
    }

    /// Refresh every item queued at the start of the cycle, front to back.
    ///
    /// Successful items are removed. Failed items go to the back of the
    /// queue for the next cycle until they reach [`MAX_ATTEMPTS`].
    pub async fn drain<S>(&self, store: &S) -> DrainReport
    where
        S: DocumentStore + ?Sized,
    {
        let mut report = DrainReport::default();
        let cycle = self.lock().pending.len();

        for _ in 0..cycle {
            let Some(flight) = self.take_front() else {
                break;
            };

            let result = store.refresh(flight.path()).await;
            let mut item = flight.land();

            match result {
                Ok(()) => report.refreshed.push(item.path),
                Err(e) => {
                    item.attempts += 1;
                    if item.attempts >= MAX_ATTEMPTS {
                        tracing::warn!(
                            path = %item.path,
                            attempts = item.attempts,
                            error = %e,
                            "giving up on queued document"
                        );
                        report.dropped.push(item.path);
                        continue;
                    }
                    tracing::debug!(path = %item.path, error = %e, "refresh failed");
                    report.failed.push((item.path.clone(), e.to_string()));

                    let mut inner = self.lock();
                    // A fresher request for the same path supersedes this one.
                    if !inner.is_pending(&item.path) {
                        inner.pending.push_back(item);
                    }
                }
            }
        }

        report
    }
}
