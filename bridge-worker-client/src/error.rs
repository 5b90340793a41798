//! Transport error taxonomy (`spec.md` §7 category 2). Configuration errors
//! (category 1) live alongside these since the config that builds the
//! client is this crate's responsibility; routing and handler errors
//! (categories 3-4) belong to `bridge-worker-runtime`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid server url {0:?}")]
    InvalidServerUrl(String),

    #[error("worker secret must be at least 8 characters")]
    SecretTooShort,

    #[error("failed to build https connector: {0}")]
    TlsSetup(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("request build failed: {0}")]
    RequestBuild(#[source] http::Error),

    #[error("request failed: {0}")]
    Request(#[source] tower::BoxError),

    #[error("handshake with the control plane failed with status {0}")]
    HandshakeFailed(http::StatusCode),

    #[error("opening the event stream failed with status {0}")]
    StreamOpenFailed(http::StatusCode),

    #[error("result post rejected with status {0}")]
    ResultRejected(http::StatusCode),

    #[error("response body is not valid utf-8: {0}")]
    InvalidUtf8(#[source] std::string::FromUtf8Error),

    #[error("failed to decode json: {0}")]
    Serde(#[source] serde_json::Error),

    #[error("failed to read response body: {0}")]
    ReadBody(#[source] std::io::Error),

    #[error("event stream line exceeded the maximum length")]
    LineTooLong,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
