//! Source-address allow list, scoped to restricted path prefixes.
//!
//! This is a narrowing filter rather than a firewall: requests outside the
//! restricted prefixes are always allowed. On a restricted path the request is
//! allowed only when its resolved source address matches at least one rule.
//! An empty rule set denies every restricted request, and an address that
//! cannot be resolved never matches.

use axum::http::StatusCode;
use tracing::{debug, info};

use super::cidr::{CidrRule, resolve_source_address};
use super::{Gate, GateDecision, RequestDescriptor, RestrictedPaths, SourceAddress};

/// Message returned with `403` when the address is not allow-listed.
pub const IP_DENIED_MESSAGE: &str = "Access denied. Your IP is not whitelisted.";

/// Allow-list rules and the paths they guard. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct AllowListConfig {
    pub rules: Vec<CidrRule>,
    pub restricted_paths: RestrictedPaths,
}

#[derive(Debug, Clone)]
pub struct IpAllowListGate {
    config: AllowListConfig,
}

impl IpAllowListGate {
    pub fn new(config: AllowListConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AllowListConfig {
        &self.config
    }

    /// Decide whether `source` may access `path`.
    pub fn evaluate(&self, path: &str, source: &SourceAddress) -> GateDecision {
        if !self.config.restricted_paths.applies_to(path) {
            return GateDecision::allow();
        }

        let address =
            match resolve_source_address(source.forwarded_for.as_deref(), source.peer) {
                Ok(address) => address,
                Err(e) => {
                    info!(
                        gate = "ip_allow_list",
                        path,
                        status = 403,
                        error = %e,
                        "Access denied: source address unresolvable"
                    );
                    return GateDecision::deny(StatusCode::FORBIDDEN, IP_DENIED_MESSAGE);
                }
            };

        match self.config.rules.iter().find(|rule| rule.matches(address)) {
            Some(rule) => {
                debug!(path, client_ip = %address, rule = %rule, "Source address allowed");
                GateDecision::allow()
            }
            None => {
                info!(
                    gate = "ip_allow_list",
                    path,
                    status = 403,
                    client_ip = %address,
                    "Access denied: IP not allow-listed"
                );
                GateDecision::deny(StatusCode::FORBIDDEN, IP_DENIED_MESSAGE)
            }
        }
    }
}

impl Gate for IpAllowListGate {
    fn name(&self) -> &'static str {
        "ip_allow_list"
    }

    fn evaluate(&self, request: &RequestDescriptor) -> GateDecision {
        IpAllowListGate::evaluate(self, &request.path, &request.source)
    }
}
