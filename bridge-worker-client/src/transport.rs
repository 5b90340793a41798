//! The HTTP/2 transport (`spec.md` §4.G): handshake, the inbound
//! server-sent-event stream, and result posting, all over one long-lived
//! connection to the control plane.
//!
//! The service stack — `tower::ServiceBuilder` layering bearer auth over a
//! `hyper-util` legacy client built on a `hyper-rustls` connector, wrapped
//! in `Buffer`+`BoxService` for a cheaply-cloneable, type-erased handle —
//! mirrors `kube_client::Client::new` and the stack built in
//! `examples/custom_client_retry.rs`. The SSE body is decoded line-by-line
//! with `tokio_util::codec::{FramedRead, LinesCodec}` over a
//! `tokio_util::io::StreamReader`, the same shape
//! `kube_client::Client::request_events` uses for its NDJSON watch stream.

use bytes::Bytes;
use http::{HeaderValue, Method, Request, Response, StatusCode, Uri};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::{connect::HttpConnector, Client as LegacyClient};
use hyper_util::rt::TokioExecutor;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::io::StreamReader;
use tower::buffer::Buffer;
use tower::util::BoxService;
use tower::{BoxError, Layer, Service, ServiceBuilder, ServiceExt};

use bridge_worker_core::{ActionResult, Capability, WorkerIdentity};
use secrecy::ExposeSecret;
use serde::Deserialize;

use crate::auth::AuthLayer;
use crate::config::{parse_server_url, TransportConfig};
use crate::error::{Error, Result};
use crate::wire::ServerEvent;

/// Shortest `worker_secret` this worker will authenticate with (`spec.md`
/// §4.I "fail fast on an unusably short secret").
const MIN_SECRET_LEN: usize = 8;

type Svc = Buffer<BoxService<Request<Full<Bytes>>, Response<Incoming>, BoxError>, Request<Full<Bytes>>>;

/// The transport's single outbound connection. Cheap to clone (the
/// `Buffer` handle is an mpsc sender to the driver task `Buffer::new`
/// spawns), so it can be handed to the heartbeat reply path and the
/// command processor's result-posting path independently.
#[derive(Clone)]
pub struct TransportClient {
    service: Svc,
    server_url: String,
    worker_id: String,
}

impl TransportClient {
    /// Builds the connection. Picks `https` (TLS, ALPN-negotiated h2) or
    /// cleartext `http` (h2 by prior knowledge, no upgrade dance) per
    /// `server_url`'s scheme, exactly as `spec.md` §4.G directs.
    pub fn new(identity: &WorkerIdentity, config: &TransportConfig) -> Result<Self> {
        if identity.worker_secret.expose_secret().len() < MIN_SECRET_LEN {
            return Err(Error::SecretTooShort);
        }
        let uri = parse_server_url(&identity.server_url)?;
        let use_tls = uri.scheme_str() == Some("https");

        let connector = build_connector(use_tls)?;

        let mut client_builder = LegacyClient::builder(TokioExecutor::new());
        client_builder
            .http2_keep_alive_interval(Some(config.read_idle_timeout))
            .http2_keep_alive_timeout(config.ping_timeout)
            .http2_max_frame_size(Some(config.max_frame_size))
            .pool_idle_timeout(config.idle_conn_timeout);
        let hyper_client = client_builder.build(connector);

        let service = ServiceBuilder::new()
            .layer(AuthLayer::bearer(&identity.worker_secret))
            .map_err(BoxError::from)
            .service(hyper_client);

        Ok(Self {
            service: Buffer::new(BoxService::new(service), 1024),
            server_url: identity.server_url.clone(),
            worker_id: identity.worker_id.clone(),
        })
    }

    fn endpoint(&self, suffix: &str) -> Result<Uri> {
        format!("{}/api/bridge_worker/{}{suffix}", self.server_url, self.worker_id)
            .parse()
            .map_err(|_| Error::InvalidServerUrl(self.server_url.clone()))
    }

    async fn call(&self, request: Request<Full<Bytes>>) -> Result<Response<Incoming>> {
        let mut service = self.service.clone();
        service
            .ready()
            .await
            .map_err(Error::Request)?
            .call(request)
            .await
            .map_err(Error::Request)
    }

    /// `GET /api/bridge_worker/{id}/me`. Any non-200 is fatal (`spec.md`
    /// §7 category 2).
    pub async fn handshake(&self) -> Result<String> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(self.endpoint("/me")?)
            .body(Full::new(Bytes::new()))
            .map_err(Error::RequestBuild)?;

        let response = self.call(request).await?;
        let status = response.status();
        let body = read_body(response).await?;
        if status != StatusCode::OK {
            return Err(Error::HandshakeFailed(status));
        }

        #[derive(Deserialize)]
        struct MeResponse {
            #[serde(rename = "Slug")]
            slug: String,
        }
        let parsed: MeResponse = serde_json::from_slice(&body).map_err(Error::Serde)?;
        Ok(parsed.slug)
    }

    /// `POST /api/bridge_worker/{id}/stream`. The response is a long-lived
    /// SSE stream; this returns once the headers come back and handshake
    /// status is confirmed, handing the still-open body to an
    /// [`EventStream`] for line-by-line consumption.
    pub async fn open_stream(&self, capability: &Capability) -> Result<EventStream> {
        let body = serde_json::to_vec(capability).map_err(Error::Serde)?;
        let request = Request::builder()
            .method(Method::POST)
            .uri(self.endpoint("/stream")?)
            .header(http::header::ACCEPT, HeaderValue::from_static("text/event-stream"))
            .header(http::header::CACHE_CONTROL, HeaderValue::from_static("no-cache"))
            .header(http::header::CONNECTION, HeaderValue::from_static("keep-alive"))
            .header(http::header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .body(Full::new(Bytes::from(body)))
            .map_err(Error::RequestBuild)?;

        let response = self.call(request).await?;
        if response.status() != StatusCode::OK {
            return Err(Error::StreamOpenFailed(response.status()));
        }

        use futures::{StreamExt, TryStreamExt};

        let reader = StreamReader::new(
            response
                .into_body()
                .into_data_stream()
                .map_err(|err| {
                    if err.is_timeout() {
                        std::io::Error::new(std::io::ErrorKind::TimedOut, err)
                    } else if err.to_string().contains("unexpected EOF during chunk") {
                        std::io::Error::new(std::io::ErrorKind::UnexpectedEof, err)
                    } else {
                        std::io::Error::other(err)
                    }
                })
                .boxed(),
        );
        let frames = FramedRead::new(reader, LinesCodec::new_with_max_length(1024 * 1024));

        Ok(EventStream { frames })
    }

    /// `POST /api/bridge_worker/{id}/action_result`. Non-200 propagates to
    /// the caller — the handler sees its `send_status` call fail
    /// (`spec.md` §4.G "Result posting").
    pub async fn post_result(&self, result: &ActionResult) -> Result<()> {
        let body = serde_json::to_vec(result).map_err(Error::Serde)?;
        let request = Request::builder()
            .method(Method::POST)
            .uri(self.endpoint("/action_result")?)
            .header(http::header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .body(Full::new(Bytes::from(body)))
            .map_err(Error::RequestBuild)?;

        let response = self.call(request).await?;
        let status = response.status();
        let _ = read_body(response).await?;
        if status != StatusCode::OK {
            return Err(Error::ResultRejected(status));
        }
        Ok(())
    }
}

async fn read_body(response: Response<Incoming>) -> Result<Vec<u8>> {
    let collected = response.into_body().collect().await.map_err(|err| Error::ReadBody(std::io::Error::other(err)))?;
    Ok(collected.to_bytes().to_vec())
}

fn build_connector(use_tls: bool) -> Result<HttpsConnector<HttpConnector>> {
    let builder = hyper_rustls::HttpsConnectorBuilder::new()
        .with_native_roots()
        .map_err(|err| Error::TlsSetup(Box::new(err)))?;
    Ok(if use_tls {
        builder.https_only().enable_http1().enable_http2().build()
    } else {
        builder.https_or_http().enable_http1().enable_http2().build()
    })
}

/// The decoded, still-live SSE stream returned by
/// [`TransportClient::open_stream`]. `next_event` skips non-`data: ` lines
/// (heartbeat/comment frames) and malformed frames (logged), returning
/// `Ok(None)` only on a graceful end-of-stream; any other I/O error
/// propagates and ends the caller's loop (`spec.md` §4.G "Stream loop
/// termination").
pub struct EventStream {
    frames: FramedRead<StreamReader<futures::stream::BoxStream<'static, std::io::Result<Bytes>>, Bytes>, LinesCodec>,
}

impl EventStream {
    pub async fn next_event(&mut self) -> Result<Option<ServerEvent>> {
        use futures::StreamExt;

        loop {
            let line = match self.frames.next().await {
                None => return Ok(None),
                Some(Ok(line)) => line,
                Some(Err(LinesCodecError::Io(err))) => match err.kind() {
                    std::io::ErrorKind::TimedOut | std::io::ErrorKind::UnexpectedEof => {
                        tracing::warn!(%err, "event stream ended");
                        return Ok(None);
                    }
                    _ => return Err(Error::ReadBody(err)),
                },
                Some(Err(LinesCodecError::MaxLineLengthExceeded)) => return Err(Error::LineTooLong),
            };

            let Some(data) = line.strip_prefix("data: ") else {
                continue;
            };

            match ServerEvent::parse(data) {
                Ok(Some(event)) => return Ok(Some(event)),
                Ok(None) => continue,
                Err(err) => {
                    tracing::warn!(%err, line = %data, "dropping malformed event-stream frame");
                    continue;
                }
            }
        }
    }
}
