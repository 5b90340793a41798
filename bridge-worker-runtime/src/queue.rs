//! The per-unit queue manager (`spec.md` §4.E, invariant I1): guarantees
//! that work items sharing a serialization key run one at a time, in
//! submission order, while work for different keys proceeds fully
//! concurrently — no unit's queue blocks behind another's.
//!
//! By the time a work item reaches this manager it is already a
//! self-contained `() -> ()` future: the command processor has already
//! wrapped the handler invocation with its own timeout and panic handling
//! and routed any resulting error through the action result context, so
//! this manager only has to worry about ordering, not failure reporting.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{self, Sender};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::Error;

/// One item of per-unit work.
pub type UnitWork = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Bounded so a stuck handler for one unit can only ever back up that
/// unit's own backlog, never the worker's memory (`spec.md` §5).
const QUEUE_CAPACITY: usize = 100;

struct Inner {
    queues: RwLock<HashMap<String, Sender<UnitWork>>>,
    idle_timeout: Duration,
    cancellation: CancellationToken,
}

/// Cheap to clone: every clone shares the same queue table, the same way
/// a reflector's `Store` shares one underlying cache (`spec.md` §5).
#[derive(Clone)]
pub struct UnitQueueManager {
    inner: Arc<Inner>,
}

impl UnitQueueManager {
    #[must_use]
    pub fn new(idle_timeout: Duration, cancellation: CancellationToken) -> Self {
        Self {
            inner: Arc::new(Inner {
                queues: RwLock::new(HashMap::new()),
                idle_timeout,
                cancellation,
            }),
        }
    }

    /// Submits `work` to run after everything already queued under `key`.
    /// Non-blocking: a full per-unit queue is reported back to the caller
    /// rather than applying backpressure to the whole worker (`spec.md`
    /// §9 "backpressure vs blocking").
    pub fn enqueue(&self, key: impl Into<String>, work: UnitWork) -> Result<(), Error> {
        let key = key.into();
        let mut work = work;
        loop {
            let existing = self.inner.queues.read().get(&key).cloned();
            if let Some(sender) = existing {
                match sender.try_send(work) {
                    Ok(()) => return Ok(()),
                    Err(TrySendError::Full(_)) => return Err(Error::QueueFull(key)),
                    Err(TrySendError::Closed(returned)) => {
                        // The consumer evicted this queue between our read
                        // and our send. Loop around and spawn a fresh one.
                        work = returned;
                        continue;
                    }
                }
            }

            let mut queues = self.inner.queues.write();
            if queues.contains_key(&key) {
                // Someone else created it while we waited for the write
                // lock; fall back to the read path.
                continue;
            }
            let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
            queues.insert(key.clone(), tx);
            drop(queues);
            self.spawn_consumer(key.clone(), rx);
        }
    }

    fn spawn_consumer(&self, key: String, mut rx: mpsc::Receiver<UnitWork>) {
        let manager = self.clone();
        tokio::spawn(async move {
            debug!(unit = %key, "unit queue consumer started");
            loop {
                tokio::select! {
                    biased;

                    () = manager.inner.cancellation.cancelled() => {
                        break;
                    }
                    received = timeout(manager.inner.idle_timeout, rx.recv()) => {
                        match received {
                            Ok(Some(work)) => work.await,
                            Ok(None) => break,
                            Err(_elapsed) => {
                                // Close the channel before dropping the map
                                // entry: any enqueue racing us against the
                                // stale `Sender` then observes `Closed` and
                                // retries onto a freshly spawned consumer,
                                // rather than silently depositing work into
                                // a queue nobody will ever drain again.
                                drop(rx);
                                manager.inner.queues.write().remove(&key);
                                trace!(unit = %key, "evicting idle unit queue");
                                break;
                            }
                        }
                    }
                }
            }
            debug!(unit = %key, "unit queue consumer stopped");
        });
    }

    /// Number of units with a live queue. Exposed for tests and metrics.
    #[must_use]
    pub fn active_units(&self) -> usize {
        self.inner.queues.read().len()
    }
}
