//! Runtime-level errors: dispatch failures, handler invocation failures and
//! the bookkeeping around them (`spec.md` §7).

use std::time::Duration;

use bridge_worker_core::toolchain::{HandlerKey, Toolchain};
use thiserror::Error;

use crate::handler::HandlerError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("no bridge handler registered for {0}")]
    NoHandlerRegistered(HandlerKey),

    #[error("no function handler registered for toolchain {0}")]
    NoFunctionHandlerRegistered(Toolchain),

    #[error("unit queue for {0} is full")]
    QueueFull(String),

    #[error("watcher pool queue is saturated")]
    WatcherPoolSaturated,

    #[error("handler invocation failed")]
    Handler(#[source] HandlerError),

    #[error("handler invocation timed out after {0:?}")]
    Timeout(Duration),

    #[error("handler invocation panicked: {0}")]
    HandlerPanicked(String),

    #[error("event cancelled before completion")]
    Cancelled,

    #[error("result channel closed")]
    ResultChannelClosed,
}
