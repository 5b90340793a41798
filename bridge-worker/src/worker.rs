//! The worker bootstrap and main event loop (`spec.md` §4.I). Builds the
//! transport connection and the runtime's dispatcher/queue/watcher-pool/
//! command-processor stack from a set of registered handlers, then drives
//! the stream-read loop until cancellation or the control plane closes the
//! stream.
//!
//! The lifecycle this follows — construct, connect, advertise capability,
//! stream until cancellation, tear down — is the same shape
//! `kube_runtime::Controller::run` takes: a `graceful_shutdown_on` future
//! raced against the work loop, with in-flight work drained rather than
//! dropped when the trigger fires.

use std::sync::Arc;
use std::time::Duration;

use bridge_worker_client::{heartbeat, ServerEvent, TransportClient, TransportConfig};
use bridge_worker_core::toolchain::{HandlerKey, Toolchain};
use bridge_worker_core::{WorkerEvent, WorkerIdentity};
use bridge_worker_runtime::{
    BridgeHandler, CommandProcessor, Dispatcher, FunctionHandler, UnitQueueManager,
    WatchableBridgeHandler, WatcherPool,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Result;

/// Minimum number of long-lived watcher-pool workers (`spec.md` §4.F
/// "min 10 workers").
const DEFAULT_WATCHER_POOL_SIZE: usize = 10;
/// Maximum queued-but-not-yet-running watch jobs (`spec.md` §4.F "max 50
/// queued").
const DEFAULT_WATCHER_POOL_CAPACITY: usize = 50;
/// Unit queues idle longer than this are evicted (`spec.md` §4.E "default 5
/// min").
const DEFAULT_QUEUE_IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);
/// Bounded so a stalled result-poster can only ever back up pending
/// results, never the event-stream reader (`spec.md` §5).
const RESULT_CHANNEL_CAPACITY: usize = 256;

/// Collects handler registrations and tunables before the transport
/// connection is actually opened.
pub struct WorkerBuilder {
    identity: WorkerIdentity,
    transport_config: TransportConfig,
    dispatcher: Dispatcher,
    handler_timeout: Option<Duration>,
    queue_idle_timeout: Duration,
    watcher_pool_size: usize,
    watcher_pool_capacity: usize,
}

impl WorkerBuilder {
    #[must_use]
    pub fn new(identity: WorkerIdentity) -> Self {
        Self {
            identity,
            transport_config: TransportConfig::default(),
            dispatcher: Dispatcher::new(),
            handler_timeout: None,
            queue_idle_timeout: DEFAULT_QUEUE_IDLE_TIMEOUT,
            watcher_pool_size: DEFAULT_WATCHER_POOL_SIZE,
            watcher_pool_capacity: DEFAULT_WATCHER_POOL_CAPACITY,
        }
    }

    #[must_use]
    pub fn with_bridge_handler(self, key: HandlerKey, handler: Arc<dyn BridgeHandler>) -> Self {
        self.dispatcher.register_bridge_handler(key, handler);
        self
    }

    #[must_use]
    pub fn with_watchable_bridge_handler(self, key: HandlerKey, handler: Arc<dyn WatchableBridgeHandler>) -> Self {
        self.dispatcher.register_watchable_bridge_handler(key, handler);
        self
    }

    #[must_use]
    pub fn with_function_handler(self, toolchain: Toolchain, handler: Arc<dyn FunctionHandler>) -> Self {
        self.dispatcher.register_function_handler(toolchain, handler);
        self
    }

    #[must_use]
    pub fn with_transport_config(mut self, config: TransportConfig) -> Self {
        self.transport_config = config;
        self
    }

    /// Disables provider target-name prefixing on the dispatcher
    /// (`spec.md` §4.D, §9's `disable_prefixes`). Off by default — only
    /// needed for compatibility with targets registered before prefixing
    /// existed.
    #[must_use]
    pub fn with_prefixes_disabled(self) -> Self {
        self.dispatcher.set_disable_prefixes(true);
        self
    }

    #[must_use]
    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_queue_idle_timeout(mut self, timeout: Duration) -> Self {
        self.queue_idle_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_watcher_pool(mut self, size: usize, capacity: usize) -> Self {
        self.watcher_pool_size = size;
        self.watcher_pool_capacity = capacity;
        self
    }

    /// Validates the worker secret, opens the transport connection and
    /// wires the runtime components together. `cancellation` must be
    /// supplied here rather than at [`Worker::run`] time: the queue
    /// manager and watcher pool each spawn long-lived tasks that need it
    /// at construction.
    pub fn build(self, cancellation: CancellationToken) -> Result<Worker> {
        let transport = TransportClient::new(&self.identity, &self.transport_config)?;
        let dispatcher = Arc::new(self.dispatcher);
        let queue_manager = UnitQueueManager::new(self.queue_idle_timeout, cancellation.clone());
        let watcher_pool = Arc::new(WatcherPool::new(
            self.watcher_pool_size,
            self.watcher_pool_capacity,
            cancellation.clone(),
        ));
        let (result_tx, result_rx) = mpsc::channel(RESULT_CHANNEL_CAPACITY);

        let mut command_processor = CommandProcessor::new(
            dispatcher.clone(),
            queue_manager,
            watcher_pool,
            result_tx,
            cancellation.clone(),
        );
        if let Some(timeout) = self.handler_timeout {
            command_processor = command_processor.with_handler_timeout(timeout);
        }

        Ok(Worker {
            identity: self.identity,
            transport,
            dispatcher,
            command_processor,
            result_rx,
            cancellation,
        })
    }
}

/// A fully wired worker, one handshake away from streaming events.
pub struct Worker {
    identity: WorkerIdentity,
    transport: TransportClient,
    dispatcher: Arc<Dispatcher>,
    command_processor: CommandProcessor,
    result_rx: mpsc::Receiver<bridge_worker_core::ActionResult>,
    cancellation: CancellationToken,
}

impl Worker {
    /// Runs the worker to completion: handshake, capability advertisement,
    /// then the event-stream loop, until the control plane closes the
    /// stream or `cancellation` fires. Returns once every spawned task this
    /// worker owns has had a chance to observe the shutdown.
    pub async fn run(mut self) -> Result<()> {
        let slug = self.transport.handshake().await?;
        self.identity.worker_slug = Some(slug.clone());
        info!(worker_slug = %slug, "handshake complete");

        let capability = self.dispatcher.aggregate_capability(&slug).await?;
        info!(
            config_types = capability.config_types.len(),
            functions = capability.functions.len(),
            "advertising capability"
        );

        let result_poster = spawn_result_poster(self.transport.clone(), self.result_rx);

        let mut stream = self.transport.open_stream(&capability).await?;
        let cancellation = self.cancellation.clone();

        loop {
            tokio::select! {
                biased;

                () = cancellation.cancelled() => {
                    info!("cancellation requested, stopping event stream loop");
                    break;
                }
                event = stream.next_event() => {
                    match event? {
                        None => {
                            info!("event stream closed by the control plane");
                            break;
                        }
                        Some(ServerEvent::Worker(WorkerEvent::Heartbeat { sent_at })) => {
                            self.reply_to_heartbeat(sent_at);
                        }
                        Some(ServerEvent::Bridge(event)) => {
                            if let Err(err) = self.command_processor.process_bridge(event) {
                                warn!(%err, "failed to enqueue bridge event");
                            }
                        }
                        Some(ServerEvent::Function(event)) => {
                            if let Err(err) = self.command_processor.process_function(event) {
                                warn!(%err, "failed to enqueue function event");
                            }
                        }
                    }
                }
            }
        }

        self.cancellation.cancel();
        drop(self.command_processor);
        let _ = result_poster.await;
        Ok(())
    }

    /// Posts a heartbeat reply without blocking the stream-read loop: the
    /// control plane measures latency from `sent_at` to when this reply
    /// lands, so the reply itself must not queue behind unit work.
    fn reply_to_heartbeat(&self, sent_at: chrono::DateTime<chrono::Utc>) {
        let reply = heartbeat::reply(sent_at, chrono::Utc::now());
        let transport = self.transport.clone();
        tokio::spawn(async move {
            if let Err(err) = transport.post_result(&reply).await {
                warn!(%err, "failed to post heartbeat reply");
            }
        });
    }
}

/// Drains the command processor's result channel onto the transport for as
/// long as any sender (held by in-flight unit work) is alive. Ends on its
/// own once every unit queue has drained and the last sender clone is
/// dropped, the same way the watcher pool's workers end once their task
/// channel is closed.
fn spawn_result_poster(
    transport: TransportClient,
    mut result_rx: mpsc::Receiver<bridge_worker_core::ActionResult>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(result) = result_rx.recv().await {
            debug!(unit_id = %result.unit_id, result = ?result.result, "posting action result");
            if let Err(err) = transport.post_result(&result).await {
                warn!(%err, unit_id = %result.unit_id, "failed to post action result");
            }
        }
    })
}
