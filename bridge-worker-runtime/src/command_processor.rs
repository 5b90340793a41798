//! The command processor (`spec.md` §4.H): turns an incoming bridge or
//! function event into a unit of work on the per-unit queue, guards the
//! handler invocation it contains with a timeout and panic boundary, and
//! hands post-apply/destroy targets off to the watcher pool.

use std::sync::Arc;
use std::time::Duration;

use bridge_worker_core::{
    ActionResultKind, BridgeAction, BridgeEvent, BridgePayload, FunctionAction, FunctionEvent, Status,
};
use tokio::task::JoinError;
use tracing::error;

use crate::dispatcher::{Dispatcher, RegisteredBridgeHandler};
use crate::handler::HandlerResult;
use crate::queue::{UnitQueueManager, UnitWork};
use crate::result_context::ActionResultContext;
use crate::watcher_pool::WatcherPool;
use crate::Error;

/// How long a single handler invocation (not counting any subsequent
/// watch loop) may run before it is treated as stuck and aborted
/// (`spec.md` §5, §7 category 3).
const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(120);

pub struct CommandProcessor {
    dispatcher: Arc<Dispatcher>,
    queue_manager: UnitQueueManager,
    watcher_pool: Arc<WatcherPool>,
    result_sink: tokio::sync::mpsc::Sender<bridge_worker_core::ActionResult>,
    cancellation: tokio_util::sync::CancellationToken,
    handler_timeout: Duration,
}

impl CommandProcessor {
    #[must_use]
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        queue_manager: UnitQueueManager,
        watcher_pool: Arc<WatcherPool>,
        result_sink: tokio::sync::mpsc::Sender<bridge_worker_core::ActionResult>,
        cancellation: tokio_util::sync::CancellationToken,
    ) -> Self {
        Self {
            dispatcher,
            queue_manager,
            watcher_pool,
            result_sink,
            cancellation,
            handler_timeout: DEFAULT_HANDLER_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = timeout;
        self
    }

    /// Routes a bridge event's payload to its handler and enqueues the
    /// work under the payload's `unit_id` (invariant I1). An event whose
    /// action the control plane sent under a name this worker doesn't
    /// recognize is never handed to the dispatcher: it is enqueued as a
    /// one-shot unit of work that reports `None`/`None` with an
    /// "unknown operation name" message (`spec.md` §4.H, §8 scenario 3).
    pub fn process_bridge(&self, event: BridgeEvent) -> Result<(), Error> {
        // Namespaced so a function invocation for the same unit never
        // shares a consumer with this bridge queue: the two are
        // independently ordered (`spec.md` §4.E "two maps", §5 "across
        // kinds for the same unit there are no ordering guarantees").
        let key = format!("bridge:{}", event.payload.unit_id);

        if let BridgeAction::Unknown(name) = &event.action {
            let name = name.clone();
            let ctx = ActionResultContext::new(
                &event.payload,
                event.action.clone(),
                self.result_sink.clone(),
                self.cancellation.clone(),
            );
            let work: UnitWork = Box::pin(async move {
                ctx.safe_send_status(
                    Status::None,
                    ActionResultKind::None,
                    format!("unknown operation name: {name}"),
                    Vec::new(),
                    Vec::new(),
                    Vec::new(),
                )
                .await;
            });
            return self.queue_manager.enqueue(key, work);
        }

        let handler = self.dispatcher.route_bridge(&event.payload.handler_key())?;
        let action = event.action.clone();
        let ctx = ActionResultContext::new(
            &event.payload,
            event.action,
            self.result_sink.clone(),
            self.cancellation.clone(),
        );
        let watcher_pool = self.watcher_pool.clone();
        let timeout = self.handler_timeout;
        let payload = event.payload.clone();

        let work: UnitWork = Box::pin(async move {
            ctx.safe_send_status(Status::Submitted, ActionResultKind::None, format!("{action} submitted"), Vec::new(), Vec::new(), Vec::new())
                .await;
            run_bridge_action(&handler, &ctx, &payload, action, &watcher_pool, timeout).await;
        });

        self.queue_manager.enqueue(key, work)
    }

    /// Routes a function event to its handler and enqueues it under the
    /// invocation request's serialization key (`spec.md` §4.E).
    pub fn process_function(&self, event: FunctionEvent) -> Result<(), Error> {
        let toolchain = event
            .invocation_request
            .toolchain
            .clone()
            .ok_or_else(|| Error::NoFunctionHandlerRegistered("unspecified".into()))?;
        let handler = self.dispatcher.route_function(&toolchain)?;
        let key = format!("function:{}", event.invocation_request.serialization_key());
        let timeout = self.handler_timeout;
        let cancellation = self.cancellation.clone();
        let result_sink = self.result_sink.clone();

        let work: UnitWork = Box::pin(async move {
            match event.action {
                FunctionAction::InvokeFunctions => {
                    run_function_invocation(handler, event, result_sink, cancellation, timeout).await;
                }
                FunctionAction::ListFunctions => {
                    run_function_listing(handler, event, result_sink, cancellation, timeout).await;
                }
            }
        });

        self.queue_manager.enqueue(key, work)
    }
}

/// A `BridgePayload`-shaped stand-in used to build an action result
/// context for a function invocation, which has no unit in the usual
/// sense. Only the identity fields the context stamps onto every result
/// are populated.
fn function_payload_stub(event: &FunctionEvent) -> BridgePayload {
    BridgePayload {
        queued_op_id: event.queued_op_id,
        toolchain: event.invocation_request.toolchain.clone().unwrap_or_default(),
        provider: "Function".into(),
        unit_id: event.invocation_request.unit_id.unwrap_or_default(),
        unit_slug: event.invocation_request.unit_slug.clone().unwrap_or_default(),
        space_id: event.invocation_request.space_id.unwrap_or_default(),
        revision_num: 0,
        data: Vec::new(),
        live_state: Vec::new(),
        target_params: Vec::new(),
        extra_params: Vec::new(),
    }
}

/// Runs one bridge handler invocation under a timeout/cancellation guard,
/// reports the terminal result, and — for `Apply`/`Destroy` on a
/// watchable registration — hands the target off to the watcher pool
/// instead of reporting completion immediately.
async fn run_bridge_action(
    handler: &RegisteredBridgeHandler,
    ctx: &ActionResultContext,
    payload: &BridgePayload,
    action: BridgeAction,
    watcher_pool: &WatcherPool,
    timeout: Duration,
) {
    ctx.safe_send_status(Status::Progressing, ActionResultKind::None, format!("running {action}"), Vec::new(), Vec::new(), Vec::new())
        .await;

    let outcome = invoke_guarded(ctx, timeout, {
        let handler = handler.clone();
        let ctx = ctx.clone();
        let payload = payload.clone();
        let action = action.clone();
        move || async move {
            match action {
                BridgeAction::Apply => handler.apply(&ctx, &payload).await,
                BridgeAction::Refresh => handler.refresh(&ctx, &payload).await,
                BridgeAction::Import => handler.import(&ctx, &payload).await,
                BridgeAction::Destroy => handler.destroy(&ctx, &payload).await,
                BridgeAction::Finalize => handler.finalize(&ctx, &payload).await,
                BridgeAction::Unknown(name) => unreachable!("unknown action {name:?} is intercepted before reaching run_bridge_action"),
            }
        }
    })
    .await;

    match outcome {
        Ok(()) => {
            // A terminal Completed/RefreshAnd* result is the handler's own
            // responsibility: it is expected to have called
            // `ctx.safe_send_status` with the right outcome before
            // returning `Ok` (`spec.md` §7 category 4, `handler.rs`'s
            // `BridgeHandler` doc comment). The one exception is a
            // watchable `Apply`/`Destroy`, where true completion isn't
            // known until the watcher pool observes convergence — the
            // hand-off, and that eventual terminal report, happen here and
            // in `watcher_pool` instead.
            let watchable = matches!(action, BridgeAction::Apply | BridgeAction::Destroy)
                .then(|| handler.watchable())
                .flatten();

            if let Some(watchable_handler) = watchable {
                ctx.safe_send_status(Status::Progressing, ActionResultKind::None, format!("{action} issued, watching for convergence"), Vec::new(), Vec::new(), Vec::new())
                    .await;
                let submitted = match action {
                    BridgeAction::Apply => watcher_pool.submit_apply_watch(watchable_handler, ctx.clone(), payload.clone()),
                    BridgeAction::Destroy => watcher_pool.submit_destroy_watch(watchable_handler, ctx.clone(), payload.clone()),
                    _ => unreachable!("guarded by the watchable match above"),
                };
                if let Err(err) = submitted {
                    error!(unit_id = %ctx.unit_id(), %err, "failed to submit watch, reporting completion without convergence check");
                    let completed_kind = match action {
                        BridgeAction::Apply => ActionResultKind::ApplyCompleted,
                        BridgeAction::Destroy => ActionResultKind::DestroyCompleted,
                        _ => unreachable!("guarded by the watchable match above"),
                    };
                    ctx.safe_send_status(Status::Completed, completed_kind, format!("{action} completed ({err})"), Vec::new(), Vec::new(), Vec::new())
                        .await;
                }
            }
        }
        Err(Error::Handler(_)) => {
            // The handler already recorded its own terminal `Failed`
            // result via `safe_send_status` before returning this error
            // (`spec.md` §7 category 4); nothing to synthesize.
        }
        Err(err) => {
            // Category 6: the handler never ran to completion (it
            // panicked, timed out, or was cancelled), so it never got a
            // chance to record its own result. This is the one case the
            // Command Processor synthesizes a terminal result on the
            // handler's behalf.
            let failed_kind = match action {
                BridgeAction::Apply => ActionResultKind::ApplyFailed,
                BridgeAction::Destroy | BridgeAction::Finalize => ActionResultKind::DestroyFailed,
                BridgeAction::Refresh => ActionResultKind::RefreshFailed,
                BridgeAction::Import => ActionResultKind::ImportFailed,
                BridgeAction::Unknown(_) => unreachable!("unknown action is intercepted before reaching run_bridge_action"),
            };
            ctx.safe_send_status(Status::Failed, failed_kind, err.to_string(), Vec::new(), Vec::new(), Vec::new())
                .await;
        }
    }
}

async fn run_function_invocation(
    handler: Arc<dyn crate::handler::FunctionHandler>,
    event: FunctionEvent,
    result_sink: tokio::sync::mpsc::Sender<bridge_worker_core::ActionResult>,
    cancellation: tokio_util::sync::CancellationToken,
    timeout: Duration,
) {
    let payload_stub = function_payload_stub(&event);
    let ctx = ActionResultContext::new(&payload_stub, BridgeAction::Apply, result_sink, cancellation);

    ctx.safe_send_status(Status::Progressing, ActionResultKind::None, format!("invoking function {}", event.invocation_request.function_name), Vec::new(), Vec::new(), Vec::new())
        .await;

    let request = event.invocation_request.clone();
    let outcome = invoke_guarded(&ctx, timeout, {
        let handler = handler.clone();
        let ctx = ctx.clone();
        move || async move { handler.invoke(&ctx, &request).await }
    })
    .await;

    match outcome {
        Ok(response) => {
            let outputs = serde_json::to_vec(&response.value).unwrap_or_default();
            ctx.safe_send_status(Status::Completed, ActionResultKind::FunctionInvocationCompleted, "function invocation completed", Vec::new(), Vec::new(), outputs)
                .await;
        }
        Err(err) => {
            ctx.safe_send_status(Status::Failed, ActionResultKind::FunctionInvocationFailed, err.to_string(), Vec::new(), Vec::new(), Vec::new())
                .await;
        }
    }
}

async fn run_function_listing(
    handler: Arc<dyn crate::handler::FunctionHandler>,
    event: FunctionEvent,
    result_sink: tokio::sync::mpsc::Sender<bridge_worker_core::ActionResult>,
    cancellation: tokio_util::sync::CancellationToken,
    timeout: Duration,
) {
    let payload_stub = function_payload_stub(&event);
    let ctx = ActionResultContext::new(&payload_stub, BridgeAction::Apply, result_sink, cancellation);

    let outcome = invoke_guarded(&ctx, timeout, {
        let handler = handler.clone();
        move || async move { handler.info().await }
    })
    .await;

    match outcome {
        Ok(capability) => {
            let outputs = serde_json::to_vec(&capability).unwrap_or_default();
            ctx.safe_send_status(Status::Completed, ActionResultKind::FunctionInvocationCompleted, "function listing completed", Vec::new(), Vec::new(), outputs)
                .await;
        }
        Err(err) => {
            ctx.safe_send_status(Status::Failed, ActionResultKind::FunctionInvocationFailed, err.to_string(), Vec::new(), Vec::new(), Vec::new())
                .await;
        }
    }
}

/// Runs `make_future` to completion on its own task, enforcing `timeout`
/// and the context's cancellation token, and translating a handler panic
/// into [`Error::HandlerPanicked`] instead of letting it escape to (and
/// kill) the unit queue's own consumer task (`spec.md` §7 category 3,
/// §9 "shutdown ordering").
async fn invoke_guarded<F, Fut, T>(ctx: &ActionResultContext, timeout: Duration, make_future: F) -> Result<T, Error>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = HandlerResult<T>> + Send + 'static,
    T: Send + 'static,
{
    let join_handle = tokio::spawn(make_future());

    tokio::select! {
        biased;

        () = ctx.cancellation_token().cancelled() => {
            join_handle.abort();
            Err(Error::Cancelled)
        }
        () = tokio::time::sleep(timeout) => {
            join_handle.abort();
            Err(Error::Timeout(timeout))
        }
        joined = join_handle => match joined {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(handler_err)) => Err(Error::Handler(handler_err)),
            Err(join_err) => Err(translate_join_error(join_err)),
        },
    }
}

fn translate_join_error(join_err: JoinError) -> Error {
    if join_err.is_panic() {
        let panic = join_err.into_panic();
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "handler panicked with a non-string payload".to_string());
        error!(%message, "handler invocation panicked");
        Error::HandlerPanicked(message)
    } else {
        Error::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use bridge_worker_core::toolchain::HandlerKey;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::handler::{BridgeHandler, HandlerResult as HR, InfoOptions};

    struct PanickingHandler;

    #[async_trait]
    impl BridgeHandler for PanickingHandler {
        async fn info(&self, _options: &InfoOptions) -> HR<bridge_worker_core::Capability> {
            unimplemented!()
        }
        async fn apply(&self, _ctx: &ActionResultContext, _payload: &BridgePayload) -> HR {
            panic!("boom");
        }
        async fn refresh(&self, _ctx: &ActionResultContext, _payload: &BridgePayload) -> HR {
            Ok(())
        }
        async fn import(&self, _ctx: &ActionResultContext, _payload: &BridgePayload) -> HR {
            Ok(())
        }
        async fn destroy(&self, _ctx: &ActionResultContext, _payload: &BridgePayload) -> HR {
            Ok(())
        }
        async fn finalize(&self, _ctx: &ActionResultContext, _payload: &BridgePayload) -> HR {
            Ok(())
        }
    }

    struct CountingHandler {
        applies: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl BridgeHandler for CountingHandler {
        async fn info(&self, _options: &InfoOptions) -> HR<bridge_worker_core::Capability> {
            unimplemented!()
        }
        async fn apply(&self, ctx: &ActionResultContext, _payload: &BridgePayload) -> HR {
            self.applies.fetch_add(1, Ordering::SeqCst);
            ctx.safe_send_status(Status::Completed, ActionResultKind::ApplyCompleted, "apply completed", Vec::new(), Vec::new(), Vec::new())
                .await;
            Ok(())
        }
        async fn refresh(&self, ctx: &ActionResultContext, _payload: &BridgePayload) -> HR {
            ctx.safe_send_status(Status::Completed, ActionResultKind::RefreshAndNoDrift, "refresh completed", Vec::new(), Vec::new(), Vec::new())
                .await;
            Ok(())
        }
        async fn import(&self, ctx: &ActionResultContext, _payload: &BridgePayload) -> HR {
            ctx.safe_send_status(Status::Completed, ActionResultKind::ImportCompleted, "import completed", Vec::new(), Vec::new(), Vec::new())
                .await;
            Ok(())
        }
        async fn destroy(&self, ctx: &ActionResultContext, _payload: &BridgePayload) -> HR {
            ctx.safe_send_status(Status::Completed, ActionResultKind::DestroyCompleted, "destroy completed", Vec::new(), Vec::new(), Vec::new())
                .await;
            Ok(())
        }
        async fn finalize(&self, ctx: &ActionResultContext, _payload: &BridgePayload) -> HR {
            ctx.safe_send_status(Status::Completed, ActionResultKind::DestroyCompleted, "finalize completed", Vec::new(), Vec::new(), Vec::new())
                .await;
            Ok(())
        }
    }

    fn payload() -> BridgePayload {
        BridgePayload {
            queued_op_id: uuid::Uuid::new_v4(),
            toolchain: "Kubernetes/YAML".into(),
            provider: "Kubernetes".into(),
            unit_id: uuid::Uuid::new_v4(),
            unit_slug: "my-unit".into(),
            space_id: uuid::Uuid::new_v4(),
            revision_num: 1,
            data: vec![],
            live_state: vec![],
            target_params: vec![],
            extra_params: vec![],
        }
    }

    fn processor_with(dispatcher: Arc<Dispatcher>) -> (CommandProcessor, tokio::sync::mpsc::Receiver<bridge_worker_core::ActionResult>) {
        let (tx, rx) = tokio::sync::mpsc::channel(16);
        let queue_manager = UnitQueueManager::new(Duration::from_secs(60), CancellationToken::new());
        let watcher_pool = Arc::new(WatcherPool::new(1, 8, CancellationToken::new()));
        let processor = CommandProcessor::new(dispatcher, queue_manager, watcher_pool, tx, CancellationToken::new())
            .with_handler_timeout(Duration::from_millis(200));
        (processor, rx)
    }

    #[tokio::test]
    async fn a_panicking_handler_reports_a_failed_result_instead_of_crashing() {
        let dispatcher = Arc::new(Dispatcher::new());
        let key = HandlerKey::new("Kubernetes/YAML", "Kubernetes");
        dispatcher.register_bridge_handler(key, Arc::new(PanickingHandler));
        let (processor, mut rx) = processor_with(dispatcher);

        processor
            .process_bridge(BridgeEvent { action: BridgeAction::Apply, payload: payload() })
            .unwrap();

        let mut saw_failed = false;
        while let Some(record) = rx.recv().await {
            if record.result == ActionResultKind::ApplyFailed {
                saw_failed = true;
                break;
            }
        }
        assert!(saw_failed);
    }

    #[tokio::test]
    async fn a_successful_non_watchable_apply_reports_completed() {
        let dispatcher = Arc::new(Dispatcher::new());
        let key = HandlerKey::new("Kubernetes/YAML", "Kubernetes");
        let applies = Arc::new(AtomicUsize::new(0));
        dispatcher.register_bridge_handler(key, Arc::new(CountingHandler { applies: applies.clone() }));
        let (processor, mut rx) = processor_with(dispatcher);

        processor
            .process_bridge(BridgeEvent { action: BridgeAction::Apply, payload: payload() })
            .unwrap();

        let mut saw_completed = false;
        while let Some(record) = rx.recv().await {
            if record.result == ActionResultKind::ApplyCompleted {
                saw_completed = true;
                break;
            }
        }
        assert!(saw_completed);
        assert_eq!(applies.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn an_unknown_action_reports_none_none_without_touching_the_dispatcher() {
        let dispatcher = Arc::new(Dispatcher::new());
        let key = HandlerKey::new("Kubernetes/YAML", "Kubernetes");
        let applies = Arc::new(AtomicUsize::new(0));
        dispatcher.register_bridge_handler(key, Arc::new(CountingHandler { applies: applies.clone() }));
        let (processor, mut rx) = processor_with(dispatcher);

        processor
            .process_bridge(BridgeEvent { action: BridgeAction::Unknown("Frobnicate".to_string()), payload: payload() })
            .unwrap();

        let record = rx.recv().await.expect("expected exactly one result");
        assert_eq!(record.status, Status::None);
        assert_eq!(record.result, ActionResultKind::None);
        assert!(record.message.starts_with("unknown operation name: Frobnicate"), "{}", record.message);
        assert_eq!(applies.load(Ordering::SeqCst), 0, "handler must not be invoked for an unknown action");

        assert!(
            tokio::time::timeout(Duration::from_millis(50), rx.recv()).await.is_err(),
            "no further results should follow the unknown-action report"
        );
    }

    struct BlockingApplyHandler {
        gate: Arc<tokio::sync::Notify>,
    }

    #[async_trait]
    impl BridgeHandler for BlockingApplyHandler {
        async fn info(&self, _options: &InfoOptions) -> HR<bridge_worker_core::Capability> {
            unimplemented!()
        }
        async fn apply(&self, ctx: &ActionResultContext, _payload: &BridgePayload) -> HR {
            self.gate.notified().await;
            ctx.safe_send_status(Status::Completed, ActionResultKind::ApplyCompleted, "apply completed", Vec::new(), Vec::new(), Vec::new())
                .await;
            Ok(())
        }
        async fn refresh(&self, _ctx: &ActionResultContext, _payload: &BridgePayload) -> HR {
            Ok(())
        }
        async fn import(&self, _ctx: &ActionResultContext, _payload: &BridgePayload) -> HR {
            Ok(())
        }
        async fn destroy(&self, _ctx: &ActionResultContext, _payload: &BridgePayload) -> HR {
            Ok(())
        }
        async fn finalize(&self, _ctx: &ActionResultContext, _payload: &BridgePayload) -> HR {
            Ok(())
        }
    }

    struct CountingFunctionHandler {
        invocations: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl crate::handler::FunctionHandler for CountingFunctionHandler {
        async fn info(&self) -> HR<bridge_worker_core::FunctionCapability> {
            Ok(Default::default())
        }
        async fn invoke(
            &self,
            _ctx: &ActionResultContext,
            _request: &bridge_worker_core::InvocationRequest,
        ) -> HR<crate::handler::InvocationResponse> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            Ok(crate::handler::InvocationResponse { value: serde_json::Value::Null })
        }
    }

    #[tokio::test]
    async fn a_function_invocation_is_not_blocked_by_a_stuck_bridge_apply_for_the_same_unit() {
        let dispatcher = Arc::new(Dispatcher::new());
        let bridge_key = HandlerKey::new("Kubernetes/YAML", "Kubernetes");
        let gate = Arc::new(tokio::sync::Notify::new());
        dispatcher.register_bridge_handler(bridge_key, Arc::new(BlockingApplyHandler { gate: gate.clone() }));

        let toolchain = bridge_worker_core::Toolchain::from("Kubernetes/YAML");
        let invocations = Arc::new(AtomicUsize::new(0));
        dispatcher.register_function_handler(
            toolchain.clone(),
            Arc::new(CountingFunctionHandler { invocations: invocations.clone() }),
        );

        let (processor, mut rx) = processor_with(dispatcher);
        let p = payload();

        processor
            .process_bridge(BridgeEvent { action: BridgeAction::Apply, payload: p.clone() })
            .unwrap();

        let invocation_request = bridge_worker_core::InvocationRequest {
            toolchain: Some(toolchain),
            unit_id: Some(p.unit_id),
            space_id: Some(p.space_id),
            unit_slug: Some(p.unit_slug.clone()),
            function_name: "len".to_string(),
            arguments: serde_json::Value::Null,
            data: vec![],
        };
        processor
            .process_function(FunctionEvent {
                action: FunctionAction::InvokeFunctions,
                queued_op_id: uuid::Uuid::new_v4(),
                invocation_request,
            })
            .unwrap();

        let mut saw_function_completion = false;
        let wait = async {
            while let Some(record) = rx.recv().await {
                if record.result == ActionResultKind::FunctionInvocationCompleted {
                    saw_function_completion = true;
                    break;
                }
            }
        };
        tokio::time::timeout(Duration::from_millis(500), wait)
            .await
            .expect("function invocation should complete even though the bridge apply for the same unit is still blocked");

        assert!(saw_function_completion);
        assert_eq!(invocations.load(Ordering::SeqCst), 1);

        gate.notify_one();
    }
}
