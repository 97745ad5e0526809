//! Allow/deny decisions produced by gates.

use std::borrow::Cow;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Whether the request may continue down the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Allow,
    Deny,
}

/// Result of evaluating one gate (or a whole chain) against a request.
///
/// An allow decision carries `200 OK` and an empty message; it is never
/// rendered. A deny decision is terminal and rendered as
/// `{"message": "..."}` with its status code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateDecision {
    pub outcome: GateOutcome,
    pub status: StatusCode,
    pub message: Cow<'static, str>,
}

/// JSON body for denied requests.
#[derive(Debug, Serialize)]
struct DenyBody<'a> {
    message: &'a str,
}

impl GateDecision {
    pub fn allow() -> Self {
        Self {
            outcome: GateOutcome::Allow,
            status: StatusCode::OK,
            message: Cow::Borrowed(""),
        }
    }

    pub fn deny(status: StatusCode, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            outcome: GateOutcome::Deny,
            status,
            message: message.into(),
        }
    }

    #[inline]
    pub fn is_allowed(&self) -> bool {
        self.outcome == GateOutcome::Allow
    }
}

impl IntoResponse for GateDecision {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(DenyBody {
                message: &self.message,
            }),
        )
            .into_response()
    }
}
