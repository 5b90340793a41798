//! Worker identity: who the worker is and which control plane it talks to.

use secrecy::SecretString;

/// `(worker_id, worker_secret, worker_slug, server_url)` from `spec.md` §3.
///
/// `worker_id` and `server_url` come from configuration; `worker_secret` is
/// the bearer token the worker authenticates with; `worker_slug` is filled
/// in after the startup handshake (`GET /me`) and used to name advertised
/// default targets.
#[derive(Debug, Clone)]
pub struct WorkerIdentity {
    pub worker_id: String,
    pub worker_secret: SecretString,
    pub server_url: String,
    pub worker_slug: Option<String>,
}

impl WorkerIdentity {
    #[must_use]
    pub fn new(worker_id: impl Into<String>, worker_secret: impl Into<String>, server_url: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            worker_secret: SecretString::from(worker_secret.into()),
            server_url: server_url.into(),
            worker_slug: None,
        }
    }

    /// The slug to use for default target names, falling back to the
    /// worker id when the handshake hasn't completed yet.
    #[must_use]
    pub fn slug(&self) -> &str {
        self.worker_slug.as_deref().unwrap_or(&self.worker_id)
    }
}
