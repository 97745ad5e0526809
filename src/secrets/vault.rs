//! HashiCorp Vault KV v2 secret source.
//!
//! Reads `GET {address}/v1/{mount}/data/{name}` with an `X-Vault-Token`
//! header and extracts one string field from the response:
//!
//! ```json
//! {"data": {"data": {"value": "s3cr3t"}, "metadata": {"version": 3}}}
//! ```

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use super::source::{SecretFetchError, SecretSource};

/// Header carrying the Vault client token.
const VAULT_TOKEN_HEADER: &str = "X-Vault-Token";

/// Connection settings for a Vault server.
#[derive(Clone)]
pub struct VaultConfig {
    /// Base URL, e.g. `http://127.0.0.1:8200`
    pub address: String,
    pub token: String,
    /// KV v2 mount point (default: `secret`)
    pub mount: String,
    /// Field inside the secret's data map holding the value (default: `value`)
    pub field: String,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
}

impl fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultConfig")
            .field("address", &self.address)
            .field("token", &"<redacted>")
            .field("mount", &self.mount)
            .field("field", &self.field)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct KvResponse {
    data: KvData,
}

#[derive(Debug, Deserialize)]
struct KvData {
    #[serde(default)]
    data: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct VaultSecretSource {
    config: VaultConfig,
    http_client: Client,
}

impl VaultSecretSource {
    pub fn new(config: VaultConfig) -> Result<Self, SecretFetchError> {
        let http_client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SecretFetchError::Transport(format!("creating HTTP client: {e}")))?;

        debug!(address = %config.address, mount = %config.mount, "Vault secret source initialized");

        Ok(Self {
            config,
            http_client,
        })
    }

    fn secret_url(&self, name: &str) -> String {
        format!(
            "{}/v1/{}/data/{}",
            self.config.address.trim_end_matches('/'),
            self.config.mount.trim_matches('/'),
            name.trim_start_matches('/')
        )
    }
}

/// Pull the configured field out of a KV v2 response body.
fn extract_field(body: &str, field: &str) -> Result<String, SecretFetchError> {
    let parsed: KvResponse = serde_json::from_str(body)
        .map_err(|e| SecretFetchError::Malformed(format!("parsing response: {e}")))?;

    match parsed.data.data.get(field) {
        Some(serde_json::Value::String(value)) if !value.is_empty() => Ok(value.clone()),
        Some(serde_json::Value::String(_)) => Err(SecretFetchError::Malformed(format!(
            "field '{field}' is empty"
        ))),
        Some(_) => Err(SecretFetchError::Malformed(format!(
            "field '{field}' is not a string"
        ))),
        None => Err(SecretFetchError::Malformed(format!(
            "field '{field}' missing from secret data"
        ))),
    }
}

#[async_trait]
impl SecretSource for VaultSecretSource {
    async fn get_secret(&self, name: &str) -> Result<String, SecretFetchError> {
        let url = self.secret_url(name);
        debug!(%url, "Fetching secret from Vault");

        let response = self
            .http_client
            .get(&url)
            .header(VAULT_TOKEN_HEADER, &self.config.token)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SecretFetchError::Timeout(self.config.request_timeout.as_millis() as u64)
                } else {
                    SecretFetchError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        match status {
            s if s.is_success() => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(SecretFetchError::Unauthorized(format!("status {status}")));
            }
            StatusCode::NOT_FOUND => return Err(SecretFetchError::NotFound(name.to_string())),
            _ => {
                return Err(SecretFetchError::Transport(format!(
                    "unexpected status {status}"
                )));
            }
        }

        let body = response
            .text()
            .await
            .map_err(|e| SecretFetchError::Transport(format!("reading response: {e}")))?;

        extract_field(&body, &self.config.field)
    }

    fn describe(&self) -> String {
        format!("vault {} (mount '{}')", self.config.address, self.config.mount)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn source() -> VaultSecretSource {
        VaultSecretSource::new(VaultConfig {
            address: "http://vault.local:8200/".to_string(),
            token: "root".to_string(),
            mount: "/secret/".to_string(),
            field: "value".to_string(),
            request_timeout: Duration::from_secs(1),
        })
        .unwrap()
    }

    #[test]
    fn test_secret_url() {
        assert_eq!(
            source().secret_url("auth-secret-token"),
            "http://vault.local:8200/v1/secret/data/auth-secret-token"
        );
    }

    #[test]
    fn test_extract_field() {
        let body = r#"{"data":{"data":{"value":"abc"},"metadata":{"version":2}}}"#;
        assert_eq!(extract_field(body, "value").unwrap(), "abc");
    }

    #[test]
    fn test_extract_field_missing() {
        let body = r#"{"data":{"data":{"other":"abc"}}}"#;
        assert!(matches!(
            extract_field(body, "value"),
            Err(SecretFetchError::Malformed(_))
        ));
    }

    #[test]
    fn test_extract_field_wrong_type_or_empty() {
        assert!(extract_field(r#"{"data":{"data":{"value":42}}}"#, "value").is_err());
        assert!(extract_field(r#"{"data":{"data":{"value":""}}}"#, "value").is_err());
    }

    #[test]
    fn test_extract_field_bad_json() {
        assert!(matches!(
            extract_field("<html>", "value"),
            Err(SecretFetchError::Malformed(_))
        ));
    }

    #[test]
    fn test_debug_redacts_token() {
        let printed = format!("{:?}", source().config);
        assert!(!printed.contains("\"root\""));
        assert!(printed.contains("<redacted>"));
    }

    #[tokio::test]
    async fn test_unreachable_vault_is_transport_error() {
        let source = VaultSecretSource::new(VaultConfig {
            address: "http://127.0.0.1:1".to_string(),
            token: "t".to_string(),
            mount: "secret".to_string(),
            field: "value".to_string(),
            request_timeout: Duration::from_millis(500),
        })
        .unwrap();

        let err = source.get_secret("x").await.unwrap_err();
        assert!(matches!(
            err,
            SecretFetchError::Transport(_) | SecretFetchError::Timeout(_)
        ));
    }
}
