//! The watcher pool (`spec.md` §4.F): a bounded pool of long-lived tasks
//! draining a shared queue of post-action watch futures, each of which
//! polls a handler's `watch_for_apply`/`watch_for_destroy` until it
//! reports success, a permanent failure, or this worker shuts down.
//!
//! Retry pacing follows the same exponential schedule `kube-runtime`'s
//! reflector uses for its own watch reconnects: an initial 30s delay,
//! ×1.5 growth, half-width jitter, capped at 5 minutes, with no bound on
//! the number of attempts — a target that never settles is watched for as
//! long as this worker runs.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder};
use bridge_worker_core::{ActionResultKind, BridgePayload, Status};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::handler::{WatchStep, WatchableBridgeHandler};
use crate::result_context::ActionResultContext;
use crate::Error;

const MIN_DELAY: Duration = Duration::from_secs(30);
const MAX_DELAY: Duration = Duration::from_secs(300);
const BACKOFF_FACTOR: f32 = 1.5;
const BACKOFF_JITTER: bool = true;

type WatchTask = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Clone, Copy, Debug)]
enum WatchKind {
    Apply,
    Destroy,
}

impl WatchKind {
    fn wait_failed(self) -> ActionResultKind {
        match self {
            WatchKind::Apply => ActionResultKind::ApplyWaitFailed,
            WatchKind::Destroy => ActionResultKind::DestroyWaitFailed,
        }
    }

    fn completed(self) -> ActionResultKind {
        match self {
            WatchKind::Apply => ActionResultKind::ApplyCompleted,
            WatchKind::Destroy => ActionResultKind::DestroyCompleted,
        }
    }

    fn failed(self) -> ActionResultKind {
        match self {
            WatchKind::Apply => ActionResultKind::ApplyFailed,
            WatchKind::Destroy => ActionResultKind::DestroyFailed,
        }
    }
}

pub struct WatcherPool {
    sender: mpsc::Sender<WatchTask>,
}

impl WatcherPool {
    /// `pool_size` long-lived workers share one `capacity`-deep queue of
    /// watch tasks.
    #[must_use]
    pub fn new(pool_size: usize, capacity: usize, cancellation: CancellationToken) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        let receiver = Arc::new(Mutex::new(receiver));

        for worker in 0..pool_size {
            let receiver = receiver.clone();
            let cancellation = cancellation.clone();
            tokio::spawn(async move {
                info!(worker, "watcher pool worker started");
                loop {
                    let task = {
                        let mut receiver = receiver.lock().await;
                        tokio::select! {
                            biased;
                            () = cancellation.cancelled() => None,
                            task = receiver.recv() => task,
                        }
                    };
                    match task {
                        Some(task) => task.await,
                        None => break,
                    }
                }
                info!(worker, "watcher pool worker stopped");
            });
        }

        Self { sender }
    }

    pub fn submit_apply_watch(
        &self,
        handler: Arc<dyn WatchableBridgeHandler>,
        ctx: ActionResultContext,
        payload: BridgePayload,
    ) -> Result<(), Error> {
        self.submit(watch_loop(handler, ctx, payload, WatchKind::Apply))
    }

    pub fn submit_destroy_watch(
        &self,
        handler: Arc<dyn WatchableBridgeHandler>,
        ctx: ActionResultContext,
        payload: BridgePayload,
    ) -> Result<(), Error> {
        self.submit(watch_loop(handler, ctx, payload, WatchKind::Destroy))
    }

    fn submit(&self, task: WatchTask) -> Result<(), Error> {
        self.sender
            .try_send(task)
            .map_err(|_| Error::WatcherPoolSaturated)
    }
}

fn backoff_schedule() -> impl Iterator<Item = Duration> {
    let mut builder = ExponentialBuilder::default()
        .with_min_delay(MIN_DELAY)
        .with_max_delay(MAX_DELAY)
        .with_factor(BACKOFF_FACTOR)
        .without_max_times();
    if BACKOFF_JITTER {
        builder = builder.with_jitter();
    }
    builder.build()
}

fn watch_loop(
    handler: Arc<dyn WatchableBridgeHandler>,
    ctx: ActionResultContext,
    payload: BridgePayload,
    kind: WatchKind,
) -> WatchTask {
    Box::pin(async move {
        let mut schedule = backoff_schedule();
        loop {
            if ctx.is_cancelled() {
                return;
            }

            let step = match kind {
                WatchKind::Apply => handler.watch_for_apply(&ctx, &payload).await,
                WatchKind::Destroy => handler.watch_for_destroy(&ctx, &payload).await,
            };

            let delay = match step {
                Ok(WatchStep::Done) => {
                    ctx.safe_send_status(
                        Status::Completed,
                        kind.completed(),
                        format!("{kind:?} watch reached a terminal state"),
                        Vec::new(),
                        Vec::new(),
                        Vec::new(),
                    )
                    .await;
                    return;
                }
                Ok(WatchStep::Permanent(reason)) => {
                    ctx.safe_send_status(
                        Status::Failed,
                        kind.failed(),
                        reason,
                        Vec::new(),
                        Vec::new(),
                        Vec::new(),
                    )
                    .await;
                    return;
                }
                Ok(WatchStep::Retry { after: Some(after) }) => after,
                Ok(WatchStep::Retry { after: None }) => schedule.next().unwrap_or(MAX_DELAY),
                Err(err) => {
                    warn!(error = %err, ?kind, "watch attempt failed, will retry");
                    ctx.safe_send_status(
                        Status::Progressing,
                        kind.wait_failed(),
                        format!("{kind:?} watch attempt failed: {err}"),
                        Vec::new(),
                        Vec::new(),
                        Vec::new(),
                    )
                    .await;
                    schedule.next().unwrap_or(MAX_DELAY)
                }
            };

            tokio::select! {
                () = ctx.cancellation_token().cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }
        }
    })
}
