//! Shared application state for Axum handlers and the gatekeeper layer.
//!
//! # Lifecycle
//!
//! ```text
//! AppState::new ──► start(): bootstrap secret ──► spawn rotation ──► serve ──► shutdown()
//! ```
//!
//! The secret cell is published by `start()` before the listener accepts
//! traffic. Until then restricted requests receive 503 and `/ready` reports
//! not ready.
//!
//! # Structured Concurrency
//!
//! Background tasks are managed using `tokio_util::task::TaskTracker` and
//! `CancellationToken`. Call `shutdown()` to stop them before exit.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::gate::GatekeeperChain;
use crate::secrets::{
    RotationHandle, RotationScheduler, SecretCell, SecretProvider, SecretRecord, SecretSource,
    VaultSecretSource,
};

/// Shared application state.
///
/// Cloning is cheap; all fields are `Arc`-backed handles.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// IP allow list followed by the token gate
    pub chain: Arc<GatekeeperChain>,
    /// Currently published secret, read by the token gate
    pub secret: SecretCell,
    /// Timestamp when the application started
    pub started_at: Instant,
    scheduler: RotationScheduler,
    /// Tracks spawned background tasks for graceful shutdown
    task_tracker: TaskTracker,
    /// Cancellation token for signaling background tasks to stop
    cancellation_token: CancellationToken,
}

impl AppState {
    /// Assemble state around `provider` without fetching anything.
    ///
    /// The secret cell starts empty; call [`AppState::start`] to populate it
    /// and begin rotation.
    pub fn new(config: Config, provider: SecretProvider) -> Self {
        let secret = SecretCell::empty();

        let chain = GatekeeperChain::from_config(&config, secret.clone());

        let scheduler = RotationScheduler::new(
            provider,
            secret.clone(),
            config.secret_name.as_str(),
            config.rotation_interval,
        );

        Self {
            config: Arc::new(config),
            chain: Arc::new(chain),
            secret,
            started_at: Instant::now(),
            scheduler,
            task_tracker: TaskTracker::new(),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Build the secret provider described by `config` and assemble state.
    ///
    /// # Errors
    ///
    /// Returns `AppError::SecretSourceInit` if the vault client cannot be
    /// constructed.
    pub fn from_config(config: Config) -> AppResult<Self> {
        let source: Option<Arc<dyn SecretSource>> = match config.vault_config() {
            Some(vault) => {
                info!(address = %vault.address, mount = %vault.mount, "Using Vault secret source");
                let source = VaultSecretSource::new(vault)
                    .map_err(|e| AppError::SecretSourceInit(e.to_string()))?;
                Some(Arc::new(source))
            }
            None => {
                info!("No Vault configured; using environment/static secret fallback");
                None
            }
        };

        let provider = SecretProvider::new(source, config.secret_fallback())
            .with_fetch_timeout(config.secret_fetch_timeout);

        Ok(Self::new(config, provider))
    }

    /// Publish the initial secret and spawn the rotation task.
    pub async fn start(&self) -> Arc<SecretRecord> {
        let record = self.scheduler.bootstrap().await;
        self.scheduler
            .spawn(&self.task_tracker, self.cancellation_token.clone());
        record
    }

    /// Handle for forcing an immediate refresh.
    pub fn rotation(&self) -> RotationHandle {
        self.scheduler.handle()
    }

    /// Get uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Gracefully shutdown all background tasks.
    ///
    /// Signals cancellation, then waits for every tracked task to finish.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown of background tasks...");
        self.cancellation_token.cancel();
        self.task_tracker.close();
        self.task_tracker.wait().await;
        info!("All background tasks stopped");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::secrets::{SecretFallback, SecretSourceKind};

    fn provider() -> SecretProvider {
        SecretProvider::new(
            None,
            SecretFallback {
                env_var: "GATEKEEPER_STATE_TEST_SECRET".to_string(),
                static_default: "static-value".to_string(),
            },
        )
        .with_env_lookup(|_| None)
    }

    #[tokio::test]
    async fn test_cell_empty_until_started() {
        let state = AppState::new(Config::default(), provider());
        assert!(!state.secret.is_populated());
        assert_eq!(state.chain.gate_names(), vec!["ip_allow_list", "token"]);

        let record = state.start().await;
        assert_eq!(record.source, SecretSourceKind::StaticDefault);
        assert_eq!(state.secret.load().unwrap().value, "static-value");

        state.shutdown().await;
    }

    #[tokio::test]
    async fn test_from_config_without_vault() {
        let state = AppState::from_config(Config::default()).unwrap();
        assert_eq!(state.config.port, 3000);
        assert!(!state.secret.is_populated());
    }

    #[tokio::test]
    async fn test_shutdown_stops_rotation_task() {
        let state = AppState::new(Config::default(), provider());
        state.start().await;

        tokio::time::timeout(std::time::Duration::from_secs(5), state.shutdown())
            .await
            .expect("shutdown should complete promptly");
    }
}
