//! The transport client (`spec.md` §2 component G, §4.G): the worker's
//! single outbound HTTP/2 connection to the control plane — startup
//! handshake, the inbound server-sent-event stream, result posting, and
//! the bearer-auth layer all three share.
//!
//! This crate owns transport only. It has no knowledge of the dispatcher,
//! unit queues, or handlers — those live in `bridge-worker-runtime` and
//! are wired together by the façade crate, the same separation
//! `kube-client` keeps from `kube-runtime`.

pub mod auth;
pub mod config;
pub mod error;
pub mod heartbeat;
pub mod transport;
pub mod wire;

pub use auth::AuthLayer;
pub use config::{parse_server_url, TransportConfig};
pub use error::Error;
pub use transport::{EventStream, TransportClient};
pub use wire::ServerEvent;

pub type Result<T, E = Error> = std::result::Result<T, E>;
