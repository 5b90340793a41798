//! Errors that can arise while working with the wire data model itself, as
//! opposed to transport or dispatch errors (those live in
//! `bridge-worker-client` and `bridge-worker-runtime` respectively).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to (de)serialize wire payload: {0}")]
    Serde(#[from] serde_json::Error),
}
