//! Handler contracts (`spec.md` §4.C): the abstract capability sets a
//! bridge/function handler implementation must expose. The core treats
//! concrete handlers (Kubernetes, OCI, OpenTofu, ...) as opaque — they are
//! plugged in by the embedder, not part of this crate.

use std::time::Duration;

use async_trait::async_trait;
use bridge_worker_core::{BridgePayload, Capability, FunctionCapability, InvocationRequest};
use serde_json::Value;

use crate::result_context::ActionResultContext;

/// Handlers report failures as a boxed error so the dispatcher can hold a
/// heterogeneous set of handler implementations behind one trait object,
/// the same way the rest of a handler's invocation is reported through
/// [`ActionResultContext::send_status`] rather than through this return
/// value (`spec.md` §7, category 4).
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type HandlerResult<T = ()> = Result<T, HandlerError>;

/// Parameters passed into a handler's `info` call. The dispatcher
/// overrides `slug` with a provider-prefixed value before forwarding
/// (`spec.md` §4.D).
#[derive(Debug, Clone, Default)]
pub struct InfoOptions {
    pub slug: String,
}

/// The five core bridge operations, plus an `info` call used for
/// capability advertisement. Any handler may additionally implement
/// [`WatchableBridgeHandler`]; which one a given registration provides is
/// recorded by the dispatcher at registration time (via
/// [`crate::dispatcher::RegisteredBridgeHandler`]) rather than probed on
/// the trait object, since a handler isn't required to implement watch
/// methods at all (`spec.md` §4.C, §9 "polymorphic handler capabilities").
#[async_trait]
pub trait BridgeHandler: Send + Sync {
    async fn info(&self, options: &InfoOptions) -> HandlerResult<Capability>;

    async fn apply(&self, ctx: &ActionResultContext, payload: &BridgePayload) -> HandlerResult;
    async fn refresh(&self, ctx: &ActionResultContext, payload: &BridgePayload) -> HandlerResult;
    async fn import(&self, ctx: &ActionResultContext, payload: &BridgePayload) -> HandlerResult;
    async fn destroy(&self, ctx: &ActionResultContext, payload: &BridgePayload) -> HandlerResult;
    async fn finalize(&self, ctx: &ActionResultContext, payload: &BridgePayload) -> HandlerResult;
}

/// One step of a watch loop's progress (`spec.md` §4.F). Returning `Err`
/// from the call that produces this (a transport hiccup reaching the
/// target, say) is treated the same as `Retry { after: None }` except that
/// it is reported upstream as a wait failure — the watch attempt itself
/// failed, but the handler invocation that kicked off the watch already
/// returned, so watching continues (`spec.md` I3).
#[derive(Debug)]
pub enum WatchStep {
    /// The target reached a terminal state; stop watching successfully.
    Done,
    /// Not yet terminal; keep retrying. `after` overrides the pool's own
    /// exponential schedule for this one step when the handler knows a
    /// more precise wait (e.g. a reported reconciliation ETA); `None`
    /// defers to the pool's backoff policy.
    Retry { after: Option<Duration> },
    /// The handler has decided this target will never reach a terminal
    /// state; stop watching and report a terminal failure.
    Permanent(String),
}

pub type WatchResult = HandlerResult<WatchStep>;

/// Optional capability: a bridge handler that also performs post-action
/// reconciliation polling.
#[async_trait]
pub trait WatchableBridgeHandler: BridgeHandler {
    async fn watch_for_apply(&self, ctx: &ActionResultContext, payload: &BridgePayload) -> WatchResult;
    async fn watch_for_destroy(&self, ctx: &ActionResultContext, payload: &BridgePayload) -> WatchResult;
}

/// The response to a function invocation. The function-body execution
/// engine is an external collaborator (`spec.md` §1); this crate only
/// carries whatever JSON value it produced back to the command processor.
#[derive(Debug, Clone)]
pub struct InvocationResponse {
    pub value: Value,
}

/// `info` plus `invoke` for a function handler (`spec.md` §4.C).
#[async_trait]
pub trait FunctionHandler: Send + Sync {
    async fn info(&self) -> HandlerResult<FunctionCapability>;
    async fn invoke(
        &self,
        ctx: &ActionResultContext,
        request: &InvocationRequest,
    ) -> HandlerResult<InvocationResponse>;
}
