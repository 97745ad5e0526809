//! Application configuration loaded from environment variables.
//!
//! # Configuration Hierarchy
//!
//! All configuration is loaded once at startup from environment variables
//! (or a `.env` file) with defaults suitable for development. Any malformed
//! value is fatal: the process exits before accepting traffic.
//!
//! # Gatekeeper
//!
//! - `IP_RESTRICTED_PATHS`: Comma-separated path prefixes guarded by the IP allow list (default: `/auth/`)
//! - `ALLOWED_IPS`: Comma-separated IPs or CIDR ranges (default: empty, which denies every restricted request)
//! - `TOKEN_RESTRICTED_PATHS`: Comma-separated path prefixes guarded by the token gate (default: `/auth/`)
//! - `AUTH_TOKEN_HEADER`: Header carrying the token (default: `X-Auth-Token`)
//!
//! # Secrets
//!
//! - `SECRET_NAME`: Name of the secret in the vault (default: `auth-secret-token`)
//! - `AUTH_SECRET_ENV_VAR`: Variable consulted when the vault fails (default: `AUTH_SECRET_TOKEN`)
//! - `AUTH_SECRET_DEFAULT`: Last-resort secret (default: `your-default-secret-token`)
//! - `SECRET_ROTATION_INTERVAL_SECS`: Time between refreshes (default: 3600)
//! - `SECRET_FETCH_TIMEOUT_MS`: Upper bound on one vault fetch (default: 5000)
//! - `VAULT_ADDRESS`, `VAULT_TOKEN`: Vault server; unset disables the vault source
//! - `VAULT_MOUNT`, `VAULT_SECRET_FIELD`: KV v2 mount and field (default: `secret`, `value`)
//!
//! # Observability
//!
//! - `RUST_LOG`: Log filter (default: `info`)
//! - `LOG_FORMAT`: `text` or `json` (default: `text`)
//! - `METRICS_PORT`: Prometheus listener port, 0 disables (default: 0)

use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderName;

use crate::error::{AppError, AppResult};
use crate::gate::cidr::parse_rule_list;
use crate::gate::token::DEFAULT_TOKEN_HEADER;
use crate::gate::{AllowListConfig, CidrRule, RestrictedPaths, TokenPolicyConfig};
use crate::secrets::{DEFAULT_SECRET_ENV_VAR, DEFAULT_STATIC_SECRET, SecretFallback, VaultConfig};

const DEFAULT_RESTRICTED_PATHS: &str = "/auth/";
const DEFAULT_SECRET_NAME: &str = "auth-secret-token";
const DEFAULT_ROTATION_INTERVAL_SECS: u64 = 60 * 60;
const DEFAULT_FETCH_TIMEOUT_MS: u64 = 5000;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("expected 'text' or 'json', got '{other}'")),
        }
    }
}

/// Vault connection settings.
#[derive(Clone, PartialEq, Eq)]
pub struct VaultSettings {
    pub address: String,
    pub token: String,
    pub mount: String,
    pub field: String,
}

impl fmt::Debug for VaultSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultSettings")
            .field("address", &self.address)
            .field("token", &"<redacted>")
            .field("mount", &self.mount)
            .field("field", &self.field)
            .finish()
    }
}

/// Application configuration.
///
/// # Example
///
/// ```rust,ignore
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.server_addr());
/// ```
#[derive(Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Server host address (default: "0.0.0.0")
    pub host: String,

    /// Server port (default: 3000)
    pub port: u16,

    // =========================================================================
    // Gatekeeper Configuration
    // =========================================================================
    /// Prefixes guarded by the IP allow list
    pub ip_restricted_paths: Vec<String>,

    /// Parsed allow-list rules
    pub allowed_ips: Vec<CidrRule>,

    /// Prefixes guarded by the token gate
    pub token_restricted_paths: Vec<String>,

    /// Header inspected by the token gate
    pub token_header: String,

    // =========================================================================
    // Secret Configuration
    // =========================================================================
    pub secret_name: String,

    /// Environment variable used as the first fallback
    pub secret_env_var: String,

    /// Last-resort secret value
    pub secret_default: String,

    /// Time between refreshes, measured from the previous completion
    pub rotation_interval: Duration,

    /// Upper bound on one vault fetch
    pub secret_fetch_timeout: Duration,

    /// Vault settings (None = no vault source)
    pub vault: Option<VaultSettings>,

    // =========================================================================
    // Observability Configuration
    // =========================================================================
    /// Log level (e.g., "info", "debug", "trace")
    pub log_level: String,

    pub log_format: LogFormat,

    /// Port for Prometheus metrics endpoint (0 = disabled)
    pub metrics_port: u16,
}

impl Config {
    /// Load configuration from the process environment (and `.env`).
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` or `AppError::InvalidRule` if any value
    /// is malformed.
    pub fn from_env() -> AppResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_env`].
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let vault = match (var("VAULT_ADDRESS"), var("VAULT_TOKEN")) {
            (Some(address), Some(token)) => Some(VaultSettings {
                address: address.trim().to_string(),
                token,
                mount: var("VAULT_MOUNT").unwrap_or_else(|| "secret".to_string()),
                field: var("VAULT_SECRET_FIELD").unwrap_or_else(|| "value".to_string()),
            }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(AppError::ConfigError(
                    "VAULT_ADDRESS is set but VAULT_TOKEN is missing".to_string(),
                ));
            }
            (None, Some(_)) => {
                return Err(AppError::ConfigError(
                    "VAULT_TOKEN is set but VAULT_ADDRESS is missing".to_string(),
                ));
            }
        };

        let config = Self {
            // Server
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_var(&var, "PORT", 3000)?,

            // Gatekeeper
            ip_restricted_paths: parse_paths(
                "IP_RESTRICTED_PATHS",
                &var("IP_RESTRICTED_PATHS").unwrap_or_else(|| DEFAULT_RESTRICTED_PATHS.to_string()),
            )?,
            allowed_ips: parse_rule_list(&var("ALLOWED_IPS").unwrap_or_default())?,
            token_restricted_paths: parse_paths(
                "TOKEN_RESTRICTED_PATHS",
                &var("TOKEN_RESTRICTED_PATHS")
                    .unwrap_or_else(|| DEFAULT_RESTRICTED_PATHS.to_string()),
            )?,
            // Set-but-empty is rejected by validate(), not defaulted.
            token_header: lookup("AUTH_TOKEN_HEADER")
                .map(|h| h.trim().to_string())
                .unwrap_or_else(|| DEFAULT_TOKEN_HEADER.to_string()),

            // Secrets
            secret_name: var("SECRET_NAME").unwrap_or_else(|| DEFAULT_SECRET_NAME.to_string()),
            secret_env_var: var("AUTH_SECRET_ENV_VAR")
                .unwrap_or_else(|| DEFAULT_SECRET_ENV_VAR.to_string()),
            secret_default: var("AUTH_SECRET_DEFAULT")
                .unwrap_or_else(|| DEFAULT_STATIC_SECRET.to_string()),
            rotation_interval: Duration::from_secs(parse_var(
                &var,
                "SECRET_ROTATION_INTERVAL_SECS",
                DEFAULT_ROTATION_INTERVAL_SECS,
            )?),
            secret_fetch_timeout: Duration::from_millis(parse_var(
                &var,
                "SECRET_FETCH_TIMEOUT_MS",
                DEFAULT_FETCH_TIMEOUT_MS,
            )?),
            vault,

            // Observability
            log_level: var("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            log_format: parse_var(&var, "LOG_FORMAT", LogFormat::Text)?,
            metrics_port: parse_var(&var, "METRICS_PORT", 0)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values for consistency and correctness.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if validation fails.
    pub fn validate(&self) -> AppResult<()> {
        if self.rotation_interval.is_zero() {
            return Err(AppError::ConfigError(
                "SECRET_ROTATION_INTERVAL_SECS must be greater than 0".to_string(),
            ));
        }

        if self.secret_fetch_timeout.is_zero() {
            return Err(AppError::ConfigError(
                "SECRET_FETCH_TIMEOUT_MS must be greater than 0".to_string(),
            ));
        }

        if HeaderName::from_bytes(self.token_header.as_bytes()).is_err() {
            return Err(AppError::ConfigError(format!(
                "AUTH_TOKEN_HEADER '{}' is not a valid header name",
                self.token_header
            )));
        }

        // An empty secret would be matched by an empty header.
        if self.secret_default.is_empty() {
            return Err(AppError::ConfigError(
                "AUTH_SECRET_DEFAULT must not be empty".to_string(),
            ));
        }

        if self.secret_name.trim().is_empty() {
            return Err(AppError::ConfigError(
                "SECRET_NAME must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn metrics_enabled(&self) -> bool {
        self.metrics_port > 0
    }

    /// Get the metrics endpoint address, or `None` when disabled.
    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        self.metrics_enabled()
            .then(|| SocketAddr::from(([0, 0, 0, 0], self.metrics_port)))
    }

    pub fn allow_list_config(&self) -> AllowListConfig {
        AllowListConfig {
            rules: self.allowed_ips.clone(),
            restricted_paths: RestrictedPaths::new(self.ip_restricted_paths.iter().cloned()),
        }
    }

    pub fn token_policy_config(&self) -> TokenPolicyConfig {
        TokenPolicyConfig {
            header_name: self.token_header.clone(),
            restricted_paths: RestrictedPaths::new(self.token_restricted_paths.iter().cloned()),
        }
    }

    pub fn secret_fallback(&self) -> SecretFallback {
        SecretFallback {
            env_var: self.secret_env_var.clone(),
            static_default: self.secret_default.clone(),
        }
    }

    /// Vault client settings, with the HTTP timeout tied to the fetch timeout.
    pub fn vault_config(&self) -> Option<VaultConfig> {
        self.vault.as_ref().map(|v| VaultConfig {
            address: v.address.clone(),
            token: v.token.clone(),
            mount: v.mount.clone(),
            field: v.field.clone(),
            request_timeout: self.secret_fetch_timeout,
        })
    }
}

/// Parse a variable into the specified type with a default value.
fn parse_var<T, F>(var: &F, name: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(val) => val
            .trim()
            .parse()
            .map_err(|e| AppError::ConfigError(format!("Invalid {name}: {e}"))),
        None => Ok(default),
    }
}

/// Parse a comma-separated list of path prefixes.
///
/// Every entry must start with `/`; a silently dropped prefix would leave a
/// path unguarded.
fn parse_paths(name: &str, raw: &str) -> AppResult<Vec<String>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            if s.starts_with('/') {
                Ok(s.to_string())
            } else {
                Err(AppError::ConfigError(format!(
                    "Invalid {name}: '{s}' must start with '/'"
                )))
            }
        })
        .collect()
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("ip_restricted_paths", &self.ip_restricted_paths)
            .field("allowed_ips", &self.allowed_ips)
            .field("token_restricted_paths", &self.token_restricted_paths)
            .field("token_header", &self.token_header)
            .field("secret_name", &self.secret_name)
            .field("secret_env_var", &self.secret_env_var)
            .field("secret_default", &"<redacted>")
            .field("rotation_interval", &self.rotation_interval)
            .field("secret_fetch_timeout", &self.secret_fetch_timeout)
            .field("vault", &self.vault)
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .field("metrics_port", &self.metrics_port)
            .finish()
    }
}

/// Default configuration for testing and development.
///
/// Production deployments should use `Config::from_env()` instead.
impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            ip_restricted_paths: vec![DEFAULT_RESTRICTED_PATHS.to_string()],
            allowed_ips: vec![],
            token_restricted_paths: vec![DEFAULT_RESTRICTED_PATHS.to_string()],
            token_header: DEFAULT_TOKEN_HEADER.to_string(),
            secret_name: DEFAULT_SECRET_NAME.to_string(),
            secret_env_var: DEFAULT_SECRET_ENV_VAR.to_string(),
            secret_default: DEFAULT_STATIC_SECRET.to_string(),
            rotation_interval: Duration::from_secs(DEFAULT_ROTATION_INTERVAL_SECS),
            secret_fetch_timeout: Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS),
            vault: None,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            metrics_port: 0,
        }
    }
}
