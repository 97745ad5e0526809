//! IPv4 CIDR rules and source-address resolution.
//!
//! Rules are written as `a.b.c.d` (an exact `/32` match) or `a.b.c.d/n`.
//! Host bits beyond the prefix are ignored during matching, so `10.0.0.7/24`
//! and `10.0.0.0/24` describe the same network.
//!
//! # Mask Arithmetic
//!
//! All arithmetic is done on `u32`. A `/0` rule yields the all-zero mask and
//! matches every address; shifting by 32 is never attempted.
//!
//! # Address Resolution
//!
//! ```text
//! X-Forwarded-For present?  ── yes ──► first comma-separated entry
//!          │
//!          no
//!          ▼
//!   transport peer address
//!          │
//!          ▼
//!   strip "::ffff:" ──► parse as IPv4 ──► Err = fail closed
//! ```

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use thiserror::Error;

/// Prefix used by dual-stack sockets to present IPv4 peers as IPv6.
const IPV4_MAPPED_PREFIX: &str = "::ffff:";

/// A rule in the allow list could not be parsed.
///
/// Rules are parsed once at startup, so this error is always fatal there
/// and never produced on the request path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CidrParseError {
    #[error("invalid network address in rule '{rule}'")]
    InvalidAddress { rule: String },

    #[error("invalid prefix length in rule '{rule}': expected an integer in 0..=32")]
    InvalidPrefix { rule: String },
}

/// The request's source address could not be turned into an IPv4 address.
///
/// Callers treat this as "no rule matches".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressResolutionError {
    #[error("no source address available")]
    Missing,

    #[error("unparsable source address '{0}'")]
    Unparsable(String),

    #[error("source address {0} is not an IPv4 address")]
    NotIpv4(IpAddr),
}

/// A single allow-listed IPv4 network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CidrRule {
    base: u32,
    prefix_len: u8,
}

impl CidrRule {
    /// Build a rule from an address and prefix length.
    ///
    /// Returns `None` when `prefix_len > 32`.
    pub fn new(base: Ipv4Addr, prefix_len: u8) -> Option<Self> {
        (prefix_len <= 32).then(|| Self {
            base: u32::from(base),
            prefix_len,
        })
    }

    /// Parse `a.b.c.d` or `a.b.c.d/n`.
    pub fn parse(rule: &str) -> Result<Self, CidrParseError> {
        let trimmed = rule.trim();
        let (address, prefix) = match trimmed.split_once('/') {
            Some((address, prefix)) => (address, Some(prefix)),
            None => (trimmed, None),
        };

        let base = Ipv4Addr::from_str(address.trim()).map_err(|_| {
            CidrParseError::InvalidAddress {
                rule: rule.to_string(),
            }
        })?;

        let prefix_len = match prefix {
            None => 32,
            Some(p) => Some(p.trim())
                .filter(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
                .and_then(|p| p.parse::<u8>().ok())
                .filter(|len| *len <= 32)
                .ok_or_else(|| CidrParseError::InvalidPrefix {
                    rule: rule.to_string(),
                })?,
        };

        Ok(Self {
            base: u32::from(base),
            prefix_len,
        })
    }

    /// Network address as written in the rule (host bits preserved).
    pub fn base_address(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.base)
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Network mask for this rule's prefix length.
    #[inline]
    pub fn mask(&self) -> u32 {
        match self.prefix_len {
            0 => 0,
            len => u32::MAX << (32 - u32::from(len)),
        }
    }

    /// Whether `address` falls inside this network.
    #[inline]
    pub fn matches(&self, address: Ipv4Addr) -> bool {
        let mask = self.mask();
        (u32::from(address) & mask) == (self.base & mask)
    }
}

impl fmt::Display for CidrRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base_address(), self.prefix_len)
    }
}

impl FromStr for CidrRule {
    type Err = CidrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Parse a comma-separated rule list, skipping blank entries.
///
/// The first malformed entry aborts parsing.
pub fn parse_rule_list(raw: &str) -> Result<Vec<CidrRule>, CidrParseError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(CidrRule::parse)
        .collect()
}

/// Parse a textual address, accepting the IPv6-mapped IPv4 form.
pub fn parse_ipv4(raw: &str) -> Result<Ipv4Addr, AddressResolutionError> {
    let trimmed = raw.trim();
    let unmapped = match trimmed.get(..IPV4_MAPPED_PREFIX.len()) {
        Some(head) if head.eq_ignore_ascii_case(IPV4_MAPPED_PREFIX) => trimmed
            .get(IPV4_MAPPED_PREFIX.len()..)
            .unwrap_or_default(),
        _ => trimmed,
    };

    if let Ok(v4) = Ipv4Addr::from_str(unmapped) {
        return Ok(v4);
    }

    // "::ffff:a00:1" and friends
    match Ipv6Addr::from_str(trimmed) {
        Ok(v6) => v6
            .to_ipv4_mapped()
            .ok_or(AddressResolutionError::NotIpv4(IpAddr::V6(v6))),
        Err(_) => Err(AddressResolutionError::Unparsable(trimmed.to_string())),
    }
}

/// Resolve the address a request should be judged by.
///
/// The first `X-Forwarded-For` entry wins when the header is present, even if
/// it turns out to be unparsable; otherwise the transport peer is used.
pub fn resolve_source_address(
    forwarded_for: Option<&str>,
    peer: Option<IpAddr>,
) -> Result<Ipv4Addr, AddressResolutionError> {
    if let Some(list) = forwarded_for {
        let first = list.split(',').next().unwrap_or_default();
        return parse_ipv4(first);
    }

    match peer {
        Some(IpAddr::V4(v4)) => Ok(v4),
        Some(IpAddr::V6(v6)) => v6
            .to_ipv4_mapped()
            .ok_or(AddressResolutionError::NotIpv4(IpAddr::V6(v6))),
        None => Err(AddressResolutionError::Missing),
    }
}
