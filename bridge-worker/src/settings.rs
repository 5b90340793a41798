//! Process configuration, read straight from the environment (`spec.md`
//! §6 "Environment variables consumed"). There is no config-file layer
//! here: `kube_client::Config::infer` reads its own ambient environment
//! (in-cluster service-account files, `$KUBECONFIG`) the same direct way
//! rather than through a generic config crate, and a bridge worker's
//! identity is exactly as small.

use secrecy::SecretString;

use crate::error::{Error, Result};

/// How this worker authenticates to whatever backend its handlers talk to
/// (Kubernetes, a cloud provider API, a local Docker config, an OS
/// keychain). The bridge worker core only threads this value through to
/// handler registration; it never branches on it itself (`spec.md` §4.I
/// "auth_method is an external collaborator").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Kubernetes,
    Cloud,
    DockerConfig,
    Keychain,
}

impl AuthMethod {
    fn parse(raw: &str) -> Result<Self> {
        match raw {
            "kubernetes" => Ok(Self::Kubernetes),
            "cloud" => Ok(Self::Cloud),
            "docker-config" => Ok(Self::DockerConfig),
            "keychain" => Ok(Self::Keychain),
            other => Err(Error::InvalidEnvVar("AUTH_METHOD", other.to_string())),
        }
    }
}

/// Everything the worker process needs at startup, gathered from its
/// environment in one place so `main` can fail fast with one clear error
/// instead of discovering a missing variable deep inside a handler
/// (`spec.md` §7 "category 1 — fatal at startup").
#[derive(Debug, Clone)]
pub struct Settings {
    pub server_url: String,
    pub worker_id: String,
    pub worker_secret: SecretString,
    pub worker_port: Option<u16>,
    pub auth_method: AuthMethod,
    pub in_cluster: bool,
    pub kubernetes_secret_path: Option<String>,
    pub worker_master_secret: Option<SecretString>,
}

impl Settings {
    /// Reads every field `spec.md` §6 lists. `CONFIGHUB_WORKER_PORT`,
    /// `KUBERNETES_SECRET_PATH` and `WORKER_MASTER_SECRET` are optional;
    /// everything else is required.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            server_url: require("CONFIGHUB_URL")?,
            worker_id: require("CONFIGHUB_WORKER_ID")?,
            worker_secret: SecretString::from(require("CONFIGHUB_WORKER_SECRET")?),
            worker_port: optional("CONFIGHUB_WORKER_PORT")
                .map(|raw| raw.parse().map_err(|_| Error::InvalidEnvVar("CONFIGHUB_WORKER_PORT", raw)))
                .transpose()?,
            auth_method: AuthMethod::parse(&require("AUTH_METHOD")?)?,
            in_cluster: optional("IN_CLUSTER").is_some_and(|raw| raw == "true" || raw == "1"),
            kubernetes_secret_path: optional("KUBERNETES_SECRET_PATH"),
            worker_master_secret: optional("WORKER_MASTER_SECRET").map(SecretString::from),
        })
    }
}

fn require(name: &'static str) -> Result<String> {
    std::env::var(name).map_err(|_| Error::MissingEnvVar(name))
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognized_auth_method_is_rejected() {
        assert!(matches!(AuthMethod::parse("ssh-agent"), Err(Error::InvalidEnvVar("AUTH_METHOD", _))));
    }

    #[test]
    fn recognized_auth_methods_parse() {
        assert_eq!(AuthMethod::parse("kubernetes").unwrap(), AuthMethod::Kubernetes);
        assert_eq!(AuthMethod::parse("cloud").unwrap(), AuthMethod::Cloud);
        assert_eq!(AuthMethod::parse("docker-config").unwrap(), AuthMethod::DockerConfig);
        assert_eq!(AuthMethod::parse("keychain").unwrap(), AuthMethod::Keychain);
    }
}
