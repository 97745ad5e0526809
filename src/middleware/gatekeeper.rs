//! Tower layer that runs the gatekeeper chain in front of every route.
//!
//! # Usage
//!
//! ```rust,ignore
//! let layer = GatekeeperLayer::new(chain, "X-Auth-Token");
//! let app = Router::new().route("/auth/login", post(login)).layer(layer);
//! ```
//!
//! The layer builds a [`RequestDescriptor`] from the request path, the
//! configured token header and the source-address candidates, evaluates the
//! chain synchronously and either forwards the request untouched or answers
//! with the deny decision's status and JSON body.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{HeaderName, Request, Response};
use axum::response::IntoResponse;
use tower::{Layer, Service};
use tracing::debug;

use super::ip::{header_lossy, source_address};
use crate::gate::{GatekeeperChain, RequestDescriptor};

/// Gatekeeper layer.
#[derive(Clone)]
pub struct GatekeeperLayer {
    chain: Arc<GatekeeperChain>,
    token_header: Arc<HeaderName>,
}

impl GatekeeperLayer {
    /// Create a layer evaluating `chain`, reading tokens from `token_header`.
    ///
    /// An invalid header name falls back to `x-auth-token`; configuration
    /// loading rejects such names first.
    pub fn new(chain: Arc<GatekeeperChain>, token_header: &str) -> Self {
        let token_header = HeaderName::from_bytes(token_header.as_bytes()).unwrap_or_else(|_| {
            HeaderName::from_static("x-auth-token")
        });
        Self {
            chain,
            token_header: Arc::new(token_header),
        }
    }

    pub fn token_header(&self) -> &HeaderName {
        &self.token_header
    }
}

impl<S> Layer<S> for GatekeeperLayer {
    type Service = GatekeeperService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        GatekeeperService {
            inner,
            chain: self.chain.clone(),
            token_header: self.token_header.clone(),
        }
    }
}

/// Gatekeeper service wrapper.
#[derive(Clone)]
pub struct GatekeeperService<S> {
    inner: S,
    chain: Arc<GatekeeperChain>,
    token_header: Arc<HeaderName>,
}

/// Build the descriptor gates evaluate for `req`.
pub fn describe_request<B>(req: &Request<B>, token_header: &HeaderName) -> RequestDescriptor {
    RequestDescriptor {
        path: req.uri().path().to_string(),
        token: header_lossy(req.headers(), token_header.as_str()),
        source: source_address(req),
    }
}

impl<S> Service<Request<Body>> for GatekeeperService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let descriptor = describe_request(&req, &self.token_header);
        let decision = self.chain.evaluate(&descriptor);

        if !decision.is_allowed() {
            debug!(
                path = %descriptor.path,
                status = decision.status.as_u16(),
                "Request rejected by gatekeeper"
            );
            return Box::pin(async move { Ok(decision.into_response()) });
        }

        // Take the service that was polled ready, leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        Box::pin(async move { inner.call(req).await })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::convert::Infallible;

    use axum::http::StatusCode;
    use tower::{ServiceExt, service_fn};

    use super::*;
    use crate::gate::{
        AllowListConfig, CidrRule, IpAllowListGate, RestrictedPaths, TokenGate, TokenPolicyConfig,
    };
    use crate::secrets::{SecretCell, SecretRecord, SecretSourceKind};

    fn layer() -> GatekeeperLayer {
        let cell = SecretCell::empty();
        cell.publish(SecretRecord::new(
            "auth-secret-token",
            "s3cret",
            SecretSourceKind::StaticDefault,
        ));
        let ip = IpAllowListGate::new(AllowListConfig {
            rules: vec![CidrRule::parse("10.0.0.0/8").unwrap()],
            restricted_paths: RestrictedPaths::new(["/auth/"]),
        });
        let token = TokenGate::new(TokenPolicyConfig::default(), cell);
        GatekeeperLayer::new(
            Arc::new(GatekeeperChain::standard(ip, token)),
            "X-Auth-Token",
        )
    }

    async fn call(req: Request<Body>) -> Response<Body> {
        let svc = layer().layer(service_fn(|_req: Request<Body>| async {
            Ok::<_, Infallible>(Response::new(Body::from("inner")))
        }));
        svc.oneshot(req).await.unwrap()
    }

    #[test]
    fn test_invalid_header_name_falls_back() {
        let layer = GatekeeperLayer::new(Arc::new(GatekeeperChain::new()), "bad header");
        assert_eq!(layer.token_header().as_str(), "x-auth-token");
    }

    #[test]
    fn test_describe_request() {
        let req = Request::builder()
            .uri("/auth/login?next=/home")
            .header("x-auth-token", "abc")
            .header("x-forwarded-for", "10.0.0.1")
            .body(Body::empty())
            .unwrap();
        let descriptor = describe_request(&req, &HeaderName::from_static("x-auth-token"));
        assert_eq!(descriptor.path, "/auth/login");
        assert_eq!(descriptor.token.as_deref(), Some("abc"));
        assert_eq!(descriptor.source.forwarded_for.as_deref(), Some("10.0.0.1"));
    }

    #[tokio::test]
    async fn test_unrestricted_path_forwarded() {
        let req = Request::builder().uri("/public").body(Body::empty()).unwrap();
        assert_eq!(call(req).await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_allowed_request_forwarded() {
        let req = Request::builder()
            .uri("/auth/login")
            .header("x-forwarded-for", "10.2.3.4")
            .header("x-auth-token", "s3cret")
            .body(Body::empty())
            .unwrap();
        assert_eq!(call(req).await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_denied_request_short_circuits() {
        let req = Request::builder()
            .uri("/auth/login")
            .header("x-forwarded-for", "10.2.3.4")
            .body(Body::empty())
            .unwrap();
        assert_eq!(call(req).await.status(), StatusCode::UNAUTHORIZED);

        let req = Request::builder()
            .uri("/auth/login")
            .header("x-forwarded-for", "192.168.0.1")
            .header("x-auth-token", "s3cret")
            .body(Body::empty())
            .unwrap();
        assert_eq!(call(req).await.status(), StatusCode::FORBIDDEN);
    }
}
