//! HTTP request handlers.

pub mod health;

use axum::Json;
use axum::http::StatusCode;
use serde_json::{Value, json};

pub use health::{HealthResponse, health_check, readiness_check};

/// JSON 404 for unmatched routes, in the same `{"message"}` shape as denials.
pub async fn not_found() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "message": "Not found" })))
}
