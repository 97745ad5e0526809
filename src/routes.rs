//! Application routing configuration with middleware stack.
//!
//! # Middleware Stack (applied in order)
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │   Request ID     │ ← Sets and propagates X-Request-Id
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │     Tracing      │ ← HTTP request/response logging
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │   Gatekeeper     │ ← 403 IP / 401-403 token / 503 no secret
//! └────────┬─────────┘
//!          │
//!          ▼
//!      Handler
//! ```
//!
//! The gatekeeper covers every route and the fallback. Paths outside the
//! configured restricted prefixes pass straight through it.

use axum::Router;
use axum::routing::get;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::handlers;
use crate::middleware::GatekeeperLayer;
use crate::state::AppState;

/// Wrap `router` with the gatekeeper and the ambient request-id and trace
/// layers.
///
/// Applications mount their own routes (for example under `/auth/`) and pass
/// the router through here before serving it.
pub fn guard<S>(router: Router<S>, state: &AppState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let config = &state.config;
    info!(
        ip_restricted_paths = ?config.ip_restricted_paths,
        allowed_ips = config.allowed_ips.len(),
        token_restricted_paths = ?config.token_restricted_paths,
        token_header = %config.token_header,
        "Gatekeeper enabled"
    );

    router
        .layer(GatekeeperLayer::new(
            state.chain.clone(),
            &config.token_header,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// Build the application router with all routes and middleware configured.
pub fn build_router(state: AppState) -> Router {
    let router = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .fallback(handlers::not_found);

    guard(router, &state).with_state(state)
}
