//! Action lock - per-resource FIFO single-flight queue
//!
//! Callers that need read-modify-write safety on a shared document wrap the
//! whole sequence in `ActionLock::enqueue`. Actions offered to one lock run
//! one at a time in the order `enqueue` was called, each starting only after
//! the previous one has settled. Locks are obtained from a `LockRegistry`
//! keyed by resource id, usually the document identifier.
//!
//! The queue position is taken synchronously inside `enqueue`, before the
//! returned future is first polled. Each position holds a oneshot receiver
//! completed by its predecessor. Dropping a queued future forwards its own
//! predecessor to the successor, so cancellation never lets two actions
//! overlap and needs no runtime to do so.

use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::oneshot;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    /// The lock was drained while this action was still waiting its turn
    #[error("Action was discarded because its lock was drained")]
    Drained,
}

#[derive(Debug, Default)]
pub struct ActionLock {
    tail: Mutex<Option<oneshot::Receiver<Handoff>>>,
    generation: AtomicU64,
    queued: AtomicUsize,
}

impl ActionLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `action` behind every action already enqueued on this lock
    pub fn enqueue<'a, F, Fut, T>(
        &'a self,
        action: F,
    ) -> impl Future<Output = Result<T, LockError>> + Send + 'a
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = T> + Send + 'a,
        T: Send + 'a,
    {
        let (done, finished) = oneshot::channel();
        let previous = self.tail.lock().replace(finished);
        let generation = self.generation.load(Ordering::Acquire);
        self.queued.fetch_add(1, Ordering::AcqRel);

        let mut turn = Turn {
            previous,
            done: Some(done),
            queued: &self.queued,
        };

        async move {
            turn.wait().await;
            if self.generation.load(Ordering::Acquire) != generation {
                tracing::debug!("discarding action queued before drain");
                return Err(LockError::Drained);
            }
            let output = action().await;
            drop(turn);
            Ok(output)
        }
    }

    /// Discard every action still waiting and return once the action in
    /// flight, if any, has settled
    pub async fn drain(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        // Runs after everything queued so far; discarded actions settle at once.
        let _ = self.enqueue(|| async {}).await;
    }

    /// No action running or waiting
    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }

    /// Actions running or waiting
    pub fn pending(&self) -> usize {
        self.queued.load(Ordering::Acquire)
    }
}

/// Completion signal of one queue position
#[derive(Debug)]
enum Handoff {
    Settled,
    /// Abandoned before its turn; wait on its predecessor instead
    Forward(oneshot::Receiver<Handoff>),
}

/// One position in a lock's queue
struct Turn<'a> {
    previous: Option<oneshot::Receiver<Handoff>>,
    done: Option<oneshot::Sender<Handoff>>,
    queued: &'a AtomicUsize,
}

impl Turn<'_> {
    async fn wait(&mut self) {
        while let Some(previous) = self.previous.as_mut() {
            self.previous = match previous.await {
                Ok(Handoff::Forward(next)) => Some(next),
                // A dropped sender also means the predecessor has settled.
                Ok(Handoff::Settled) | Err(_) => None,
            };
        }
    }
}

impl Drop for Turn<'_> {
    fn drop(&mut self) {
        self.queued.fetch_sub(1, Ordering::AcqRel);

        let Some(done) = self.done.take() else {
            return;
        };
        let handoff = match self.previous.take() {
            Some(previous) => Handoff::Forward(previous),
            None => Handoff::Settled,
        };
        // Nobody left to notify when the successor is gone too.
        let _ = done.send(handoff);
    }
}

/// Process-wide map from resource key to its lock
#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: DashMap<String, Arc<ActionLock>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock for `key`; the same instance for as long as it is held
    pub fn lock_for(&self, key: &str) -> Arc<ActionLock> {
        if let Some(lock) = self.locks.get(key) {
            return lock.clone();
        }
        self.locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(ActionLock::new()))
            .clone()
    }

    /// Forget idle locks nobody else holds
    pub fn prune(&self) {
        self.locks
            .retain(|_, lock| Arc::strong_count(lock) > 1 || !lock.is_idle());
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
