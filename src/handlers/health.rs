//! Health and readiness endpoints.
//!
//! # Endpoints
//!
//! - `GET /health` - Liveness with secret provenance (never the value)
//! - `GET /ready` - 200 once a secret is published, 503 before
//!
//! Both sit behind the gatekeeper layer but are outside the default
//! restricted prefixes, so probes reach them without a token.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::instrument;

use crate::secrets::SecretSourceKind;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "healthy" once a secret is published, "degraded" before
    pub status: &'static str,
    pub secret_source: Option<SecretSourceKind>,
    pub secret_age_seconds: Option<u64>,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub timestamp: DateTime<Utc>,
}

/// Liveness plus the provenance of the published secret. Always 200.
///
/// # Response Body
///
/// ```json
/// {
///   "status": "healthy",
///   "secret_source": "vault",
///   "secret_age_seconds": 42,
///   "version": "0.1.0",
///   "uptime_seconds": 3600,
///   "timestamp": "2024-01-15T10:30:00Z"
/// }
/// ```
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let record = state.secret.load();

    Json(HealthResponse {
        status: if record.is_some() {
            "healthy"
        } else {
            "degraded"
        },
        secret_source: record.as_ref().map(|r| r.source),
        secret_age_seconds: record.as_ref().map(|r| r.age_seconds()),
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.uptime_seconds(),
        timestamp: Utc::now(),
    })
}

/// Ready once the token gate has a secret to compare against.
#[instrument(skip(state))]
pub async fn readiness_check(State(state): State<AppState>) -> StatusCode {
    if state.secret.is_populated() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
