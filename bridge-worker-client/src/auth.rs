//! Bearer-token auth layer (`spec.md` §4.G, §6 "Authorization: Bearer
//! …"). `kube_client::client::middleware::AuthLayer` wraps
//! `tower_http::auth::AddAuthorizationLayer` in an `Either` because the
//! Kubernetes client has to choose between a static token and a
//! refreshable OAuth one at runtime. The worker's bearer token
//! (`WorkerIdentity.worker_secret`) never refreshes, so there is only the
//! static case to wrap.

use secrecy::{ExposeSecret, SecretString};
use tower::Layer;
use tower_http::auth::{AddAuthorization, AddAuthorizationLayer};

/// Adds `Authorization: Bearer <worker_secret>` to every outgoing request.
pub struct AuthLayer(AddAuthorizationLayer);

impl AuthLayer {
    #[must_use]
    pub fn bearer(worker_secret: &SecretString) -> Self {
        Self(AddAuthorizationLayer::bearer(worker_secret.expose_secret()))
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AddAuthorization<S>;

    fn layer(&self, inner: S) -> Self::Service {
        self.0.layer(inner)
    }
}

#[cfg(test)]
mod tests {
    use http::{header::AUTHORIZATION, HeaderValue, Request};
    use http_body_util::Empty;
    use tower::{Service, ServiceExt};
    use tower_test::mock;

    use super::*;

    #[tokio::test]
    async fn sets_the_bearer_header() {
        let secret = SecretString::from("s3cr3t-worker-token".to_string());
        let (mut service, mut handle) = mock::spawn_layer::<Request<Empty<bytes::Bytes>>, (), _>(AuthLayer::bearer(&secret));

        let spawned = tokio::spawn(async move {
            let (request, send) = handle.next_request().await.expect("service not called");
            assert_eq!(
                request.headers().get(AUTHORIZATION).unwrap(),
                HeaderValue::try_from("Bearer s3cr3t-worker-token").unwrap()
            );
            send.send_response(());
        });

        service.ready().await.unwrap();
        service
            .call(Request::builder().uri("/").body(Empty::new()).unwrap())
            .await
            .unwrap();
        spawned.await.unwrap();
    }
}
