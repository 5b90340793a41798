//! Transport configuration: the control plane URL and the connection
//! tunables from `spec.md` §4.G. Settings that come from the environment
//! (`CONFIGHUB_URL`, `CONFIGHUB_WORKER_ID`, …) are read by the façade
//! crate's `Settings`; this module only validates and parses the values it
//! is handed, the way `kube_client::config::incluster_config` parses the
//! cluster URL it's given rather than reading env vars itself.

use std::time::Duration;

use http::Uri;

use crate::error::{Error, Result};

/// HTTP/2 connection tunables (`spec.md` §4.G "Transport setup").
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub max_frame_size: u32,
    pub read_idle_timeout: Duration,
    pub ping_timeout: Duration,
    pub idle_conn_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_frame_size: 1024 * 1024,
            read_idle_timeout: Duration::from_secs(120),
            ping_timeout: Duration::from_secs(20),
            idle_conn_timeout: Duration::from_secs(90),
        }
    }
}

/// Parses and validates a control-plane base URL, picking `https` (TLS,
/// ALPN h2) or cleartext `http` (h2 via upgrade) as the scheme dictates.
pub fn parse_server_url(server_url: &str) -> Result<Uri> {
    let uri: Uri = server_url
        .parse()
        .map_err(|_| Error::InvalidServerUrl(server_url.to_string()))?;
    match uri.scheme_str() {
        Some("http") | Some("https") => {}
        _ => return Err(Error::InvalidServerUrl(server_url.to_string())),
    }
    if uri.authority().is_none() {
        return Err(Error::InvalidServerUrl(server_url.to_string()));
    }
    Ok(uri)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_https_urls() {
        assert!(parse_server_url("https://confighub.example.com").is_ok());
    }

    #[test]
    fn rejects_missing_scheme() {
        assert!(parse_server_url("confighub.example.com").is_err());
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert!(parse_server_url("ftp://confighub.example.com").is_err());
    }
}
