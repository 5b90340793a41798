//! The dispatcher (`spec.md` §4.D): a routing table from `(toolchain,
//! provider)` to a registered bridge handler, and from `toolchain` to a
//! registered function handler, plus the capability aggregation used to
//! answer the control plane's `info` exchange.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bridge_worker_core::toolchain::{HandlerKey, Provider, Toolchain};
use bridge_worker_core::{BridgePayload, Capability};
use parking_lot::RwLock;

use crate::handler::{BridgeHandler, FunctionHandler, HandlerResult, InfoOptions, WatchableBridgeHandler};
use crate::result_context::ActionResultContext;
use crate::Error;

/// Fixed prefixes for providers this worker ships bridge handlers for out
/// of the box. Any other provider falls back to a slugified version of its
/// own name, so a newly-added handler never needs a dispatcher change to
/// get a collision-free target namespace (an open question in the
/// distilled spec, resolved here — see `DESIGN.md`).
fn provider_prefix(provider: &Provider) -> String {
    match provider.as_str() {
        "Kubernetes" => "k8s".to_string(),
        "ConfigMap" => "cm".to_string(),
        "Flux" | "FluxOCIWriter" => "flux".to_string(),
        "AWS" => "aws".to_string(),
        other => slugify(other),
    }
}

fn slugify(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect()
}

/// A registered bridge handler, carrying along whichever of the two
/// handler capability sets it was registered with. Rust has no stable way
/// to recover a `dyn WatchableBridgeHandler` from a `dyn BridgeHandler`
/// trait object, so the dispatcher keeps both views of the same
/// underlying `Arc` rather than trying to probe for one after the fact
/// (`spec.md` §9 "polymorphic handler capabilities").
#[derive(Clone)]
pub enum RegisteredBridgeHandler {
    Core(Arc<dyn BridgeHandler>),
    Watchable(Arc<dyn WatchableBridgeHandler>),
}

impl RegisteredBridgeHandler {
    pub async fn info(&self, options: &InfoOptions) -> HandlerResult<Capability> {
        match self {
            Self::Core(h) => h.info(options).await,
            Self::Watchable(h) => h.info(options).await,
        }
    }

    pub async fn apply(&self, ctx: &ActionResultContext, payload: &BridgePayload) -> HandlerResult {
        match self {
            Self::Core(h) => h.apply(ctx, payload).await,
            Self::Watchable(h) => h.apply(ctx, payload).await,
        }
    }

    pub async fn refresh(&self, ctx: &ActionResultContext, payload: &BridgePayload) -> HandlerResult {
        match self {
            Self::Core(h) => h.refresh(ctx, payload).await,
            Self::Watchable(h) => h.refresh(ctx, payload).await,
        }
    }

    pub async fn import(&self, ctx: &ActionResultContext, payload: &BridgePayload) -> HandlerResult {
        match self {
            Self::Core(h) => h.import(ctx, payload).await,
            Self::Watchable(h) => h.import(ctx, payload).await,
        }
    }

    pub async fn destroy(&self, ctx: &ActionResultContext, payload: &BridgePayload) -> HandlerResult {
        match self {
            Self::Core(h) => h.destroy(ctx, payload).await,
            Self::Watchable(h) => h.destroy(ctx, payload).await,
        }
    }

    pub async fn finalize(&self, ctx: &ActionResultContext, payload: &BridgePayload) -> HandlerResult {
        match self {
            Self::Core(h) => h.finalize(ctx, payload).await,
            Self::Watchable(h) => h.finalize(ctx, payload).await,
        }
    }

    /// `Some` when this registration can also watch for post-action
    /// convergence.
    #[must_use]
    pub fn watchable(&self) -> Option<Arc<dyn WatchableBridgeHandler>> {
        match self {
            Self::Watchable(h) => Some(h.clone()),
            Self::Core(_) => None,
        }
    }
}

/// Holds every bridge and function handler this worker process was built
/// with. Registration happens once at startup (`spec.md` §4.I); after
/// that the dispatcher is read-only from the hot path, so lookups take a
/// shared read lock rather than contending on a single mutex.
#[derive(Default)]
pub struct Dispatcher {
    bridge_handlers: RwLock<HashMap<HandlerKey, RegisteredBridgeHandler>>,
    function_handlers: RwLock<HashMap<Toolchain, Arc<dyn FunctionHandler>>>,
    disable_prefixes: AtomicBool,
}

impl Dispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Turns off provider target-name prefixing (`spec.md` §4.D, §9's
    /// `disable_prefixes`) — a compatibility switch for deployments that
    /// registered targets before prefixing existed. New deployments should
    /// leave this alone; prefixes are enabled by default.
    pub fn set_disable_prefixes(&self, disable: bool) {
        self.disable_prefixes.store(disable, Ordering::Relaxed);
    }

    pub fn register_bridge_handler(&self, key: HandlerKey, handler: Arc<dyn BridgeHandler>) {
        self.bridge_handlers.write().insert(key, RegisteredBridgeHandler::Core(handler));
    }

    pub fn register_watchable_bridge_handler(&self, key: HandlerKey, handler: Arc<dyn WatchableBridgeHandler>) {
        self.bridge_handlers.write().insert(key, RegisteredBridgeHandler::Watchable(handler));
    }

    pub fn register_function_handler(&self, toolchain: Toolchain, handler: Arc<dyn FunctionHandler>) {
        self.function_handlers.write().insert(toolchain, handler);
    }

    pub fn route_bridge(&self, key: &HandlerKey) -> Result<RegisteredBridgeHandler, Error> {
        self.bridge_handlers
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NoHandlerRegistered(key.clone()))
    }

    pub fn route_function(&self, toolchain: &Toolchain) -> Result<Arc<dyn FunctionHandler>, Error> {
        self.function_handlers
            .read()
            .get(toolchain)
            .cloned()
            .ok_or_else(|| Error::NoFunctionHandlerRegistered(toolchain.clone()))
    }

    /// Queries every registered bridge handler's `info` and every
    /// registered function handler's `info`, merging the results into a
    /// single advertisement (`spec.md` §3 "Capability Advertisement",
    /// §4.D). Each bridge handler is called with its provider prefix so it
    /// can namespace its own target names.
    pub async fn aggregate_capability(&self, worker_slug: &str) -> Result<Capability, Error> {
        let bridge_handlers: Vec<(HandlerKey, RegisteredBridgeHandler)> = self
            .bridge_handlers
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let disable_prefixes = self.disable_prefixes.load(Ordering::Relaxed);
        let mut capability = Capability::default();
        for (key, handler) in bridge_handlers {
            let slug = if disable_prefixes {
                worker_slug.to_string()
            } else {
                format!("{}-{worker_slug}", provider_prefix(&key.provider))
            };
            let options = InfoOptions { slug };
            let handler_capability = handler.info(&options).await.map_err(Error::Handler)?;
            capability = capability.merge(handler_capability);
        }

        let function_handlers: Vec<Arc<dyn FunctionHandler>> =
            self.function_handlers.read().values().cloned().collect();
        for handler in function_handlers {
            let functions = handler.info().await.map_err(Error::Handler)?;
            for (toolchain, signatures) in functions {
                capability
                    .functions
                    .entry(toolchain)
                    .or_default()
                    .extend(signatures);
            }
        }

        Ok(capability)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use bridge_worker_core::{ConfigType, Target};

    use super::*;
    use crate::handler::{HandlerResult as HR, InfoOptions as IO};

    struct StubBridgeHandler {
        toolchain: Toolchain,
    }

    #[async_trait]
    impl BridgeHandler for StubBridgeHandler {
        async fn info(&self, options: &IO) -> HR<Capability> {
            Ok(Capability {
                config_types: vec![ConfigType {
                    toolchain: self.toolchain.clone(),
                    provider: "Kubernetes".into(),
                    available_targets: vec![Target::new(format!("{}-apply", options.slug))],
                }],
                functions: HashMap::new(),
            })
        }

        async fn apply(&self, _ctx: &ActionResultContext, _payload: &BridgePayload) -> HR {
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

    #[test]
    fn known_providers_get_fixed_prefixes() {
        assert_eq!(provider_prefix(&Provider::from("Kubernetes")), "k8s");
        assert_eq!(provider_prefix(&Provider::from("ConfigMap")), "cm");
        assert_eq!(provider_prefix(&Provider::from("FluxOCIWriter")), "flux");
        assert_eq!(provider_prefix(&Provider::from("AWS")), "aws");
    }

    #[test]
    fn unlisted_providers_fall_back_to_a_slug() {
        assert_eq!(provider_prefix(&Provider::from("Acme Cloud!")), "acme-cloud-");
    }

    #[test]
    fn routing_an_unregistered_key_fails() {
        let dispatcher = Dispatcher::new();
        let key = HandlerKey::new("Kubernetes/YAML", "Kubernetes");
        assert!(matches!(dispatcher.route_bridge(&key), Err(Error::NoHandlerRegistered(_))));
    }

    #[tokio::test]
    async fn aggregate_capability_merges_across_handlers_and_applies_prefixes() {
        let dispatcher = Dispatcher::new();
        dispatcher.register_bridge_handler(
            HandlerKey::new("Kubernetes/YAML", "Kubernetes"),
            Arc::new(StubBridgeHandler {
                toolchain: "Kubernetes/YAML".into(),
            }),
        );
        dispatcher.register_bridge_handler(
            HandlerKey::new("Kubernetes/YAML", "ConfigMap"),
            Arc::new(StubBridgeHandler {
                toolchain: "Kubernetes/YAML".into(),
            }),
        );

        let capability = dispatcher.aggregate_capability("my-worker").await.unwrap();
        assert_eq!(capability.config_types.len(), 2);
        let target_names: Vec<_> = capability
            .config_types
            .iter()
            .flat_map(|ct| ct.available_targets.iter().map(|t| t.name.clone()))
            .collect();
        assert!(target_names.contains(&"k8s-my-worker-apply".to_string()));
        assert!(target_names.contains(&"cm-my-worker-apply".to_string()));
    }

    #[tokio::test]
    async fn disabling_prefixes_leaves_the_slug_untouched() {
        let dispatcher = Dispatcher::new();
        dispatcher.set_disable_prefixes(true);
        dispatcher.register_bridge_handler(
            HandlerKey::new("Kubernetes/YAML", "Kubernetes"),
            Arc::new(StubBridgeHandler {
                toolchain: "Kubernetes/YAML".into(),
            }),
        );

        let capability = dispatcher.aggregate_capability("my-worker").await.unwrap();
        let target_names: Vec<_> = capability
            .config_types
            .iter()
            .flat_map(|ct| ct.available_targets.iter().map(|t| t.name.clone()))
            .collect();
        assert!(target_names.contains(&"my-worker-apply".to_string()));
    }
}
