//! Wire data model shared by the bridge worker's transport and runtime
//! crates: toolchain/provider tags, worker identity, events sent down the
//! control channel, capability advertisements, and the action result record
//! every handler invocation produces.
//!
//! This crate has no I/O. It exists so `bridge-worker-client` and
//! `bridge-worker-runtime` can agree on the wire shapes without either
//! depending on the other.

pub mod capability;
pub(crate) mod bytes_as_base64;
pub mod error;
pub mod event;
pub mod identity;
pub mod result;
pub mod toolchain;

pub use capability::{Capability, ConfigType, FunctionCapability, FunctionSignature, Target};
pub use error::Error;
pub use event::{
    BridgeAction, BridgeEvent, BridgePayload, FunctionAction, FunctionEvent, InvocationRequest,
    WorkerEvent,
};
pub use identity::WorkerIdentity;
pub use result::{ActionResult, ActionResultKind, Status};
pub use toolchain::{HandlerKey, Provider, Toolchain};

pub type Result<T, E = Error> = std::result::Result<T, E>;
