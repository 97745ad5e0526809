//! Shared-secret header check, scoped to restricted path prefixes.
//!
//! # Security Features
//!
//! - **Constant-time comparison**: token bytes are compared with `subtle`
//! - **Single read per request**: the published secret is loaded once, at
//!   evaluation time, so a concurrent rotation can never mix generations
//!   within one decision
//! - **Fail closed**: an unpublished secret denies instead of matching anything

use axum::http::StatusCode;
use subtle::ConstantTimeEq;
use tracing::{error, info};

use super::{Gate, GateDecision, RequestDescriptor, RestrictedPaths};
use crate::secrets::SecretCell;

/// Default header carrying the caller's token.
pub const DEFAULT_TOKEN_HEADER: &str = "X-Auth-Token";

pub const TOKEN_REQUIRED_MESSAGE: &str = "Authentication token is required";
pub const TOKEN_INVALID_MESSAGE: &str = "Invalid authentication token";
pub const SECRET_UNAVAILABLE_MESSAGE: &str = "Authentication is temporarily unavailable";

/// Which header to read and which paths require it. Immutable.
#[derive(Debug, Clone)]
pub struct TokenPolicyConfig {
    pub header_name: String,
    pub restricted_paths: RestrictedPaths,
}

impl Default for TokenPolicyConfig {
    fn default() -> Self {
        Self {
            header_name: DEFAULT_TOKEN_HEADER.to_string(),
            restricted_paths: RestrictedPaths::new(["/auth/"]),
        }
    }
}

/// Token gate bound to the cell that holds the current secret.
#[derive(Debug, Clone)]
pub struct TokenGate {
    config: TokenPolicyConfig,
    secret: SecretCell,
}

impl TokenGate {
    pub fn new(config: TokenPolicyConfig, secret: SecretCell) -> Self {
        Self { config, secret }
    }

    pub fn config(&self) -> &TokenPolicyConfig {
        &self.config
    }

    pub fn header_name(&self) -> &str {
        &self.config.header_name
    }

    /// Decide whether `header_value` grants access to `path`.
    ///
    /// `current_secret` must be the value published at the time of the call.
    pub fn evaluate(
        &self,
        path: &str,
        header_value: Option<&str>,
        current_secret: &str,
    ) -> GateDecision {
        if !self.config.restricted_paths.applies_to(path) {
            return GateDecision::allow();
        }

        // An empty header counts as no token at all.
        match header_value.filter(|v| !v.is_empty()) {
            None => {
                info!(gate = "token", path, status = 401, "Access denied: no token provided");
                GateDecision::deny(StatusCode::UNAUTHORIZED, TOKEN_REQUIRED_MESSAGE)
            }
            Some(provided) if constant_time_eq(provided, current_secret) => GateDecision::allow(),
            Some(_) => {
                info!(gate = "token", path, status = 403, "Access denied: invalid token provided");
                GateDecision::deny(StatusCode::FORBIDDEN, TOKEN_INVALID_MESSAGE)
            }
        }
    }
}

impl Gate for TokenGate {
    fn name(&self) -> &'static str {
        "token"
    }

    fn evaluate(&self, request: &RequestDescriptor) -> GateDecision {
        if !self.config.restricted_paths.applies_to(&request.path) {
            return GateDecision::allow();
        }

        // One load per request; the guard pins this generation until we return.
        match self.secret.load() {
            Some(record) => {
                TokenGate::evaluate(self, &request.path, request.token.as_deref(), &record.value)
            }
            None => {
                error!(
                    gate = "token",
                    path = %request.path,
                    status = 503,
                    "No secret published; refusing restricted request"
                );
                GateDecision::deny(StatusCode::SERVICE_UNAVAILABLE, SECRET_UNAVAILABLE_MESSAGE)
            }
        }
    }
}

/// Perform constant-time comparison of two strings.
///
/// Length differences short-circuit; only the secret's length can leak.
fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::secrets::{SecretRecord, SecretSourceKind};

    fn gate() -> TokenGate {
        TokenGate::new(TokenPolicyConfig::default(), SecretCell::empty())
    }

    #[test]
    fn test_matching_token_allows() {
        assert!(gate().evaluate("/auth/x", Some("abc"), "abc").is_allowed());
    }

    #[test]
    fn test_missing_token_is_401() {
        let d = gate().evaluate("/auth/x", None, "abc");
        assert_eq!(d.status, StatusCode::UNAUTHORIZED);
        assert_eq!(d.message, TOKEN_REQUIRED_MESSAGE);
    }

    #[test]
    fn test_wrong_token_is_403() {
        let d = gate().evaluate("/auth/x", Some("abd"), "abc");
        assert_eq!(d.status, StatusCode::FORBIDDEN);
        assert_eq!(d.message, TOKEN_INVALID_MESSAGE);
    }

    #[test]
    fn test_case_different_token_is_403() {
        let d = gate().evaluate("/auth/x", Some("ABC"), "abc");
        assert_eq!(d.status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_empty_token_is_401() {
        let d = gate().evaluate("/auth/x", Some(""), "abc");
        assert_eq!(d.status, StatusCode::UNAUTHORIZED);
        assert_eq!(d.message, TOKEN_REQUIRED_MESSAGE);
    }

    #[test]
    fn test_whitespace_token_is_403() {
        let d = gate().evaluate("/auth/x", Some(" "), "abc");
        assert_eq!(d.status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_unrestricted_path_ignores_header() {
        let g = gate();
        assert!(g.evaluate("/health", None, "abc").is_allowed());
        assert!(g.evaluate("/health", Some("wrong"), "abc").is_allowed());
    }

    #[test]
    fn test_trait_reads_published_secret() {
        let cell = SecretCell::empty();
        let g = TokenGate::new(TokenPolicyConfig::default(), cell.clone());

        let req = RequestDescriptor::new("/auth/x").with_token("abc");
        assert_eq!(
            Gate::evaluate(&g, &req).status,
            StatusCode::SERVICE_UNAVAILABLE
        );

        cell.publish(SecretRecord::new("s", "abc", SecretSourceKind::StaticDefault));
        assert!(Gate::evaluate(&g, &req).is_allowed());

        cell.publish(SecretRecord::new("s", "rotated", SecretSourceKind::Vault));
        assert_eq!(Gate::evaluate(&g, &req).status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_trait_unrestricted_path_with_empty_cell_allows() {
        let g = gate();
        let req = RequestDescriptor::new("/public");
        assert!(Gate::evaluate(&g, &req).is_allowed());
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("secret123", "secret123"));
        assert!(!constant_time_eq("secret123", "secret456"));
        assert!(!constant_time_eq("short", "much-longer-string"));
    }
}
