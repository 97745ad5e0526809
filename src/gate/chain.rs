//! Ordered, short-circuiting composition of gates.

use std::fmt;
use std::sync::Arc;

use super::{Gate, GateDecision, IpAllowListGate, RequestDescriptor, TokenGate};
use crate::config::Config;
use crate::metrics;
use crate::secrets::SecretCell;

/// Runs gates in order and stops at the first deny.
///
/// Built from configuration, the allow-list gate runs before the token gate
/// so a caller rejected by address learns nothing about its token.
#[derive(Clone, Default)]
pub struct GatekeeperChain {
    gates: Vec<Arc<dyn Gate>>,
}

impl GatekeeperChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard pipeline: address allow list, then token.
    pub fn standard(ip_gate: IpAllowListGate, token_gate: TokenGate) -> Self {
        Self::new().with_gate(ip_gate).with_gate(token_gate)
    }

    /// Build the standard pipeline from configuration, reading the token
    /// gate's secret from `secret`.
    pub fn from_config(config: &Config, secret: SecretCell) -> Self {
        Self::standard(
            IpAllowListGate::new(config.allow_list_config()),
            TokenGate::new(config.token_policy_config(), secret),
        )
    }

    /// Append a gate to the end of the chain.
    pub fn with_gate<G: Gate + 'static>(mut self, gate: G) -> Self {
        self.gates.push(Arc::new(gate));
        self
    }

    pub fn len(&self) -> usize {
        self.gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    pub fn gate_names(&self) -> Vec<&'static str> {
        self.gates.iter().map(|g| g.name()).collect()
    }

    /// Evaluate every gate in order, returning the first deny or allow.
    pub fn evaluate(&self, request: &RequestDescriptor) -> GateDecision {
        for gate in &self.gates {
            let decision = gate.evaluate(request);
            metrics::record_gate_decision(gate.name(), decision.outcome);
            if !decision.is_allowed() {
                return decision;
            }
        }
        GateDecision::allow()
    }
}

impl fmt::Debug for GatekeeperChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatekeeperChain")
            .field("gates", &self.gate_names())
            .finish()
    }
}
