//! Façade-level errors: a transport failure and a runtime failure are both
//! fatal to the worker process at the points this crate calls them
//! (`spec.md` §7 "category 1/2 errors are fatal; category 3/4 are scoped to
//! one unit").

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] bridge_worker_client::Error),

    #[error(transparent)]
    Runtime(#[from] bridge_worker_runtime::Error),

    #[error("missing required environment variable {0}")]
    MissingEnvVar(&'static str),

    #[error("environment variable {0} is not valid: {1}")]
    InvalidEnvVar(&'static str, String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
