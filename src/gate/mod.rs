//! Pure allow/deny gates and their composition.
//!
//! Gates never perform I/O. Everything they need (configuration, the token
//! header, the source address and the currently published secret) is
//! resolved before evaluation.
//!
//! ```text
//! RequestDescriptor ──► IpAllowListGate ──Allow──► TokenGate ──Allow──► next stage
//!                              │                       │
//!                            Deny 403              Deny 401/403
//! ```
//!
//! Both gates are inert outside their own restricted path prefixes, and each
//! gate owns its prefix list so they can be scoped independently.

use std::net::IpAddr;

pub mod chain;
pub mod cidr;
pub mod decision;
pub mod ip_allow;
pub mod token;

pub use chain::GatekeeperChain;
pub use cidr::{AddressResolutionError, CidrParseError, CidrRule};
pub use decision::{GateDecision, GateOutcome};
pub use ip_allow::{AllowListConfig, IpAllowListGate};
pub use token::{TokenGate, TokenPolicyConfig};

/// Case-insensitive set of path prefixes a gate applies to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestrictedPaths {
    prefixes: Vec<String>,
}

impl RestrictedPaths {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut prefixes: Vec<String> = prefixes
            .into_iter()
            .map(Into::into)
            .filter(|p| !p.is_empty())
            .collect();
        prefixes.sort();
        prefixes.dedup();
        Self { prefixes }
    }

    /// Whether `path` starts with any configured prefix, ignoring ASCII case.
    pub fn applies_to(&self, path: &str) -> bool {
        self.prefixes.iter().any(|prefix| {
            path.get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.prefixes
    }
}

/// Raw source-address candidates for a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceAddress {
    /// Raw `X-Forwarded-For` value, if the header was sent.
    pub forwarded_for: Option<String>,
    /// Transport-layer peer address.
    pub peer: Option<IpAddr>,
}

/// Everything a gate may look at for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub path: String,
    /// Value of the configured token header.
    pub token: Option<String>,
    pub source: SourceAddress,
}

impl RequestDescriptor {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_forwarded_for(mut self, forwarded_for: impl Into<String>) -> Self {
        self.source.forwarded_for = Some(forwarded_for.into());
        self
    }

    pub fn with_peer(mut self, peer: IpAddr) -> Self {
        self.source.peer = Some(peer);
        self
    }
}

/// A synchronous allow/deny decision over a request.
pub trait Gate: Send + Sync {
    /// Short identifier used in logs and metrics.
    fn name(&self) -> &'static str;

    fn evaluate(&self, request: &RequestDescriptor) -> GateDecision;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restricted_paths_case_insensitive() {
        let paths = RestrictedPaths::new(["/auth/"]);
        assert!(paths.applies_to("/auth/login"));
        assert!(paths.applies_to("/AUTH/login"));
        assert!(paths.applies_to("/Auth/"));
        assert!(!paths.applies_to("/auth"));
        assert!(!paths.applies_to("/public/auth/"));
        assert!(!paths.applies_to(""));
    }

    #[test]
    fn test_restricted_paths_multiple_prefixes() {
        let paths = RestrictedPaths::new(["/auth/", "/admin", ""]);
        assert_eq!(paths.as_slice().len(), 2);
        assert!(paths.applies_to("/admin/users"));
        assert!(paths.applies_to("/administrator"));
        assert!(!paths.applies_to("/health"));
    }

    #[test]
    fn test_empty_restricted_paths_apply_nowhere() {
        let paths = RestrictedPaths::default();
        assert!(paths.is_empty());
        assert!(!paths.applies_to("/auth/login"));
    }

    #[test]
    fn test_non_ascii_path_does_not_panic() {
        let paths = RestrictedPaths::new(["/auth/"]);
        assert!(!paths.applies_to("/é"));
        assert!(!paths.applies_to("/aut\u{00e9}/x"));
    }
}
