//! Secret resolution with a documented fallback chain.
//!
//! # Resolution Order
//!
//! 1. The configured [`SecretSource`] (vault), bounded by `fetch_timeout`
//! 2. The environment variable named by [`SecretFallback::env_var`]
//! 3. [`SecretFallback::static_default`]
//!
//! The first fetch at startup walks the whole chain and always yields a
//! record. A refresh only succeeds when the vault answers; its failure is
//! handed back to the scheduler, which keeps the last good record.
//!
//! Without a vault configured, a refresh re-resolves steps 2 and 3 so an
//! environment-only deployment stays stable.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::source::{SecretFetchError, SecretSource};
use super::{SecretRecord, SecretSourceKind};

/// Environment variable consulted when the vault is unavailable.
pub const DEFAULT_SECRET_ENV_VAR: &str = "AUTH_SECRET_TOKEN";

/// Last-resort secret value.
pub const DEFAULT_STATIC_SECRET: &str = "your-default-secret-token";

/// Default upper bound on a single vault fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Lookup used for the environment step of the chain.
pub type EnvLookup = fn(&str) -> Option<String>;

fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// The non-vault steps of the chain.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretFallback {
    pub env_var: String,
    pub static_default: String,
}

impl Default for SecretFallback {
    fn default() -> Self {
        Self {
            env_var: DEFAULT_SECRET_ENV_VAR.to_string(),
            static_default: DEFAULT_STATIC_SECRET.to_string(),
        }
    }
}

impl std::fmt::Debug for SecretFallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretFallback")
            .field("env_var", &self.env_var)
            .field("static_default", &"<redacted>")
            .finish()
    }
}

/// Fetches secrets from the vault and applies the fallback chain.
#[derive(Clone)]
pub struct SecretProvider {
    source: Option<Arc<dyn SecretSource>>,
    fallback: SecretFallback,
    fetch_timeout: Duration,
    env_lookup: EnvLookup,
}

impl SecretProvider {
    /// Create a provider.
    ///
    /// # Arguments
    ///
    /// * `source` - Primary store, or `None` to rely on the fallback chain
    /// * `fallback` - Environment variable name and static default
    pub fn new(source: Option<Arc<dyn SecretSource>>, fallback: SecretFallback) -> Self {
        Self {
            source,
            fallback,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            env_lookup: process_env,
        }
    }

    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    /// Replace how the environment step reads variables.
    pub fn with_env_lookup(mut self, env_lookup: EnvLookup) -> Self {
        self.env_lookup = env_lookup;
        self
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }

    /// First fetch at process start. Never fails.
    pub async fn fetch_initial(&self, name: &str) -> SecretRecord {
        match self.fetch_from_source(name).await {
            Ok(record) => {
                info!(secret = name, source = %record.source, "Secret loaded");
                record
            }
            Err(SecretFetchError::NotConfigured) => {
                info!(secret = name, "No vault configured; using fallback chain");
                self.log_fallback(self.resolve_fallback(name))
            }
            Err(e) => {
                warn!(secret = name, error = %e, "Vault fetch failed; falling back");
                self.log_fallback(self.resolve_fallback(name))
            }
        }
    }

    /// Best-effort refresh.
    ///
    /// # Errors
    ///
    /// Returns the vault error when a vault is configured and did not answer.
    /// The caller must keep publishing the previous record in that case.
    pub async fn refresh(&self, name: &str) -> Result<SecretRecord, SecretFetchError> {
        match self.fetch_from_source(name).await {
            Err(SecretFetchError::NotConfigured) => {
                let record = self.resolve_fallback(name);
                debug!(secret = name, source = %record.source, "Re-resolved fallback secret");
                Ok(record)
            }
            other => other,
        }
    }

    async fn fetch_from_source(&self, name: &str) -> Result<SecretRecord, SecretFetchError> {
        let source = self.source.as_ref().ok_or(SecretFetchError::NotConfigured)?;

        let value = timeout(self.fetch_timeout, source.get_secret(name))
            .await
            .map_err(|_| SecretFetchError::Timeout(self.fetch_timeout.as_millis() as u64))??;

        if value.is_empty() {
            return Err(SecretFetchError::Malformed(format!(
                "{} returned an empty value",
                source.describe()
            )));
        }

        Ok(SecretRecord::new(name, value, SecretSourceKind::Vault))
    }

    /// Environment value if set and non-empty, else the static default.
    fn resolve_fallback(&self, name: &str) -> SecretRecord {
        match (self.env_lookup)(&self.fallback.env_var).filter(|v| !v.is_empty()) {
            Some(value) => SecretRecord::new(name, value, SecretSourceKind::EnvironmentFallback),
            None => SecretRecord::new(
                name,
                self.fallback.static_default.clone(),
                SecretSourceKind::StaticDefault,
            ),
        }
    }

    fn log_fallback(&self, record: SecretRecord) -> SecretRecord {
        match record.source {
            SecretSourceKind::EnvironmentFallback => warn!(
                secret = %record.name,
                env_var = %self.fallback.env_var,
                "Using secret from environment fallback"
            ),
            _ => warn!(
                secret = %record.name,
                env_var = %self.fallback.env_var,
                "Environment fallback unset; using static default secret"
            ),
        }
        record
    }
}

impl std::fmt::Debug for SecretProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretProvider")
            .field("source", &self.source.as_ref().map(|s| s.describe()))
            .field("fallback", &self.fallback)
            .field("fetch_timeout", &self.fetch_timeout)
            .finish()
    }
}
