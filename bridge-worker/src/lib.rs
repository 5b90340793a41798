//! The bridge worker façade (`spec.md` §2 component I/J, §4.I): wires
//! `bridge-worker-client`'s transport to `bridge-worker-runtime`'s
//! dispatcher, unit-queue manager, watcher pool and command processor, and
//! drives the worker process's event-stream loop end to end.
//!
//! This crate owns process bootstrap only. Handler implementations are an
//! external collaborator (`spec.md` §4.C "handler contracts") — this
//! library is generic over whatever `BridgeHandler`/`WatchableBridgeHandler`/
//! `FunctionHandler` impls an embedder registers with [`WorkerBuilder`],
//! the same way `kube::Client` is generic over whatever `Api<K>` resource
//! type a caller builds on top of it.

pub mod error;
pub mod settings;
pub mod worker;

pub use error::Error;
pub use settings::{AuthMethod, Settings};
pub use worker::{Worker, WorkerBuilder};

pub type Result<T, E = Error> = std::result::Result<T, E>;
