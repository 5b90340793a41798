//! The worker runtime: the dispatcher, per-unit queue manager, watcher
//! pool and command processor that turn registered handlers and an
//! incoming event stream into action results (`spec.md` §2, components
//! D–H).
//!
//! `bridge-worker-client` owns the transport; this crate is transport-
//! agnostic and only needs a stream of [`bridge_worker_core::BridgeEvent`]/
//! [`bridge_worker_core::FunctionEvent`] values in and a channel of
//! [`bridge_worker_core::ActionResult`] values out.

pub mod command_processor;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod queue;
pub mod result_context;
pub mod status_writer;
pub mod watcher_pool;

pub use command_processor::CommandProcessor;
pub use dispatcher::{Dispatcher, RegisteredBridgeHandler};
pub use error::Error;
pub use handler::{
    BridgeHandler, FunctionHandler, HandlerError, HandlerResult, InfoOptions, InvocationResponse,
    WatchResult, WatchStep, WatchableBridgeHandler,
};
pub use queue::{UnitQueueManager, UnitWork};
pub use result_context::ActionResultContext;
pub use status_writer::StatusWriter;
pub use watcher_pool::WatcherPool;

pub type Result<T, E = Error> = std::result::Result<T, E>;
