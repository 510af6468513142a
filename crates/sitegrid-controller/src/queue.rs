//! Keyed work queue — the scheduling heart of the controller.
//!
//! Semantics the reconciler's correctness depends on:
//!
//! - **Dedup**: adding a key already waiting in the queue is a no-op.
//! - **Per-key serialization**: a key being processed is never handed
//!   to a second worker. Re-adding it marks it dirty; `done` re-queues
//!   it once the in-flight pass finishes.
//! - **Backoff**: failed keys come back after `base * 2^attempt`,
//!   capped at a maximum interval, or after the server's throttle hint
//!   when that is larger. `forget` resets the attempt counter.
//!
//! Different keys are handed out to as many workers as are asking;
//! cross-key parallelism is unrestricted.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tracing::trace;

use sitegrid_core::GridId;

/// Exponent cap keeping the backoff shift well-defined.
const MAX_BACKOFF_EXP: u32 = 16;

#[derive(Default)]
struct Inner {
    queue: VecDeque<GridId>,
    queued: HashSet<GridId>,
    processing: HashSet<GridId>,
    dirty: HashSet<GridId>,
    retries: HashMap<GridId, u32>,
}

/// Shared work queue keyed by grid identity.
pub struct WorkQueue {
    inner: Mutex<Inner>,
    notify: Notify,
    stopped: AtomicBool,
    backoff_base: Duration,
    backoff_max: Duration,
}

impl WorkQueue {
    pub fn new(backoff_base: Duration, backoff_max: Duration) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner::default()),
            notify: Notify::new(),
            stopped: AtomicBool::new(false),
            backoff_base,
            backoff_max,
        })
    }

    /// Add a key. Deduplicated against waiting keys; deferred (dirty)
    /// if the key is currently being processed.
    pub fn add(&self, key: impl Into<GridId>) {
        let key = key.into();
        let mut inner = self.inner.lock().expect("queue lock");
        if inner.processing.contains(&key) {
            trace!(%key, "key in flight, marked dirty");
            inner.dirty.insert(key);
            return;
        }
        if inner.queued.insert(key.clone()) {
            inner.queue.push_back(key);
            drop(inner);
            self.notify.notify_one();
        }
    }

    /// Wait for the next key. Returns `None` after `shutdown`.
    pub async fn next(&self) -> Option<GridId> {
        loop {
            let notified = self.notify.notified();
            if self.stopped.load(Ordering::SeqCst) {
                return None;
            }
            {
                let mut inner = self.inner.lock().expect("queue lock");
                if let Some(key) = inner.queue.pop_front() {
                    inner.queued.remove(&key);
                    inner.processing.insert(key.clone());
                    return Some(key);
                }
            }
            notified.await;
        }
    }

    /// Mark a key's in-flight pass finished. A key that went dirty
    /// while in flight is immediately re-queued.
    pub fn done(&self, key: &str) {
        let mut inner = self.inner.lock().expect("queue lock");
        inner.processing.remove(key);
        if inner.dirty.remove(key) && inner.queued.insert(key.to_string()) {
            inner.queue.push_back(key.to_string());
            drop(inner);
            self.notify.notify_one();
        }
    }

    /// Reset the retry counter for a key (after a clean pass, or when
    /// dropping a fatally failed key).
    pub fn forget(&self, key: &str) {
        let mut inner = self.inner.lock().expect("queue lock");
        inner.retries.remove(key);
    }

    /// Schedule a failed key to come back after its backoff delay.
    /// Returns the delay chosen (the exponential backoff, or the
    /// server's hint when that is larger).
    pub fn requeue_after(self: &Arc<Self>, key: GridId, hint: Option<Duration>) -> Duration {
        let attempts = {
            let mut inner = self.inner.lock().expect("queue lock");
            let counter = inner.retries.entry(key.clone()).or_insert(0);
            *counter += 1;
            *counter
        };

        let exp = attempts.saturating_sub(1).min(MAX_BACKOFF_EXP);
        let backoff_ms = (self.backoff_base.as_millis() as u64)
            .saturating_mul(1u64 << exp)
            .min(self.backoff_max.as_millis() as u64);
        let mut delay = Duration::from_millis(backoff_ms);
        if let Some(hint) = hint {
            delay = delay.max(hint);
        }

        let queue = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if !queue.stopped.load(Ordering::SeqCst) {
                queue.add(key);
            }
        });
        delay
    }

    /// Stop the queue: pending waiters wake up and receive `None`.
    pub fn shutdown(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Number of keys waiting (not counting in-flight ones).
    pub fn len(&self) -> usize {
        self.inner.lock().expect("queue lock").queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
