//! Source-address candidate extraction.
//!
//! # Security Warning: IP Spoofing Risk
//!
//! **`X-Forwarded-For` is trusted when present.** A client that can reach
//! this service directly can claim any address. Deploy behind a reverse proxy
//! that overwrites the header:
//!
//! ```nginx
//! proxy_set_header X-Forwarded-For $remote_addr;
//! ```
//!
//! The transport peer address (from axum's `ConnectInfo`) is used only when
//! the header is absent. A header that is present but unreadable is still
//! handed to the allow-list gate, which then denies the request.

use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request};

use crate::gate::SourceAddress;

pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Collect the raw address candidates for `req` without interpreting them.
pub fn source_address<B>(req: &Request<B>) -> SourceAddress {
    SourceAddress {
        forwarded_for: header_lossy(req.headers(), FORWARDED_FOR_HEADER),
        peer: req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip()),
    }
}

/// First value of `name`, decoded lossily so non-UTF-8 bytes cannot make the
/// header look absent.
pub fn header_lossy(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
}
