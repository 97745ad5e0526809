//! The contract a vault-like secret store must satisfy.

use async_trait::async_trait;
use thiserror::Error;

/// Failure to obtain a secret from its primary source.
///
/// Every variant is recoverable: the provider answers it with the fallback
/// chain on first fetch, or by keeping the last good value on refresh.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecretFetchError {
    #[error("secret store unreachable: {0}")]
    Transport(String),

    #[error("secret store rejected credentials: {0}")]
    Unauthorized(String),

    #[error("secret '{0}' not found")]
    NotFound(String),

    #[error("malformed secret store response: {0}")]
    Malformed(String),

    #[error("secret fetch timed out after {0} ms")]
    Timeout(u64),

    #[error("no secret source configured")]
    NotConfigured,
}

impl SecretFetchError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            SecretFetchError::Transport(_) => "transport",
            SecretFetchError::Unauthorized(_) => "unauthorized",
            SecretFetchError::NotFound(_) => "not_found",
            SecretFetchError::Malformed(_) => "malformed",
            SecretFetchError::Timeout(_) => "timeout",
            SecretFetchError::NotConfigured => "not_configured",
        }
    }
}

/// A named-secret store.
///
/// Implementations perform network I/O and may be slow; callers bound every
/// call with a timeout.
#[async_trait]
pub trait SecretSource: Send + Sync {
    /// Fetch the current value of `name`.
    async fn get_secret(&self, name: &str) -> Result<String, SecretFetchError>;

    /// Identity of the store, for logs.
    fn describe(&self) -> String;
}
