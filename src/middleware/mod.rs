//! HTTP middleware.
//!
//! - **Gatekeeper**: IP allow list and shared-secret token check, scoped to
//!   restricted path prefixes
//! - **Source address**: raw `X-Forwarded-For` and peer address extraction
//!
//! # Architecture
//!
//! ```text
//! Request → Request ID → Trace → Gatekeeper → Handler → Response
//!                                    ↓
//!                          401/403/503 JSON {"message"}
//! ```
//!
//! Request IDs and tracing come from `tower-http` and are wired in
//! [`crate::routes`].

pub mod gatekeeper;
pub mod ip;

pub use gatekeeper::{GatekeeperLayer, GatekeeperService, describe_request};
pub use ip::{FORWARDED_FOR_HEADER, source_address};
