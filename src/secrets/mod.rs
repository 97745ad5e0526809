//! Secret provisioning and rotation.
//!
//! ```text
//! RotationScheduler ──► SecretProvider ──► SecretSource (vault)
//!         │                   │ on failure
//!         │                   ├──► environment variable
//!         │                   └──► static default
//!         ▼
//!     SecretCell  ◄── load() per request ── TokenGate
//! ```
//!
//! # Consistency
//!
//! `SecretCell` holds an `Arc<SecretRecord>` behind an `ArcSwapOption`.
//! Publishing replaces the whole record in one atomic store, so readers see
//! either the previous generation or the new one, never a mix of fields.
//! Only the bootstrap path and the rotation scheduler publish.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub mod provider;
pub mod rotation;
pub mod source;
pub mod vault;

pub use provider::{DEFAULT_SECRET_ENV_VAR, DEFAULT_STATIC_SECRET, SecretFallback, SecretProvider};
pub use rotation::{RotationHandle, RotationScheduler, RotationState};
pub use source::{SecretFetchError, SecretSource};
pub use vault::{VaultConfig, VaultSecretSource};

/// Where a secret generation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretSourceKind {
    Vault,
    EnvironmentFallback,
    StaticDefault,
}

impl SecretSourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecretSourceKind::Vault => "vault",
            SecretSourceKind::EnvironmentFallback => "environment_fallback",
            SecretSourceKind::StaticDefault => "static_default",
        }
    }
}

impl fmt::Display for SecretSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fetched generation of a named secret.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretRecord {
    pub name: String,
    pub value: String,
    pub fetched_at: DateTime<Utc>,
    pub source: SecretSourceKind,
}

impl SecretRecord {
    /// Create a record stamped with the current time.
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        source: SecretSourceKind,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            fetched_at: Utc::now(),
            source,
        }
    }

    /// Seconds since this generation was fetched.
    pub fn age_seconds(&self) -> u64 {
        (Utc::now() - self.fetched_at).num_seconds().max(0) as u64
    }
}

// Never print the value.
impl fmt::Debug for SecretRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretRecord")
            .field("name", &self.name)
            .field("value", &"<redacted>")
            .field("fetched_at", &self.fetched_at)
            .field("source", &self.source)
            .finish()
    }
}

/// Shared holder of the current secret generation.
///
/// Cloning is cheap and every clone observes the same publications.
#[derive(Clone, Default)]
pub struct SecretCell {
    current: Arc<ArcSwapOption<SecretRecord>>,
}

impl SecretCell {
    /// A cell with nothing published yet.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Atomically replace the current record.
    pub fn publish(&self, record: impl Into<Arc<SecretRecord>>) {
        self.current.store(Some(record.into()));
    }

    /// Lock-free snapshot of the current record.
    pub fn load(&self) -> Option<Arc<SecretRecord>> {
        self.current.load_full()
    }

    pub fn is_populated(&self) -> bool {
        self.current.load().is_some()
    }
}

impl fmt::Debug for SecretCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretCell")
            .field("current", &self.load())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_starts_empty() {
        let cell = SecretCell::empty();
        assert!(!cell.is_populated());
        assert!(cell.load().is_none());
    }

    #[test]
    fn test_publish_replaces_whole_record() {
        let cell = SecretCell::empty();
        cell.publish(SecretRecord::new("a", "one", SecretSourceKind::StaticDefault));
        let first = cell.load().unwrap();

        cell.publish(SecretRecord::new("a", "two", SecretSourceKind::Vault));
        let second = cell.load().unwrap();

        // Earlier snapshots stay intact after a publish.
        assert_eq!(first.value, "one");
        assert_eq!(first.source, SecretSourceKind::StaticDefault);
        assert_eq!(second.value, "two");
        assert_eq!(second.source, SecretSourceKind::Vault);
    }

    #[test]
    fn test_clones_share_publications() {
        let cell = SecretCell::empty();
        let reader = cell.clone();
        cell.publish(SecretRecord::new("a", "v", SecretSourceKind::Vault));
        assert!(reader.is_populated());
    }

    #[test]
    fn test_debug_redacts_value() {
        let record = SecretRecord::new("a", "super-secret", SecretSourceKind::Vault);
        let printed = format!("{record:?}");
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("<redacted>"));

        let cell = SecretCell::empty();
        cell.publish(record);
        assert!(!format!("{cell:?}").contains("super-secret"));
    }

    #[test]
    fn test_source_kind_labels() {
        assert_eq!(SecretSourceKind::Vault.to_string(), "vault");
        assert_eq!(
            serde_json::to_string(&SecretSourceKind::EnvironmentFallback).unwrap(),
            "\"environment_fallback\""
        );
    }
}
