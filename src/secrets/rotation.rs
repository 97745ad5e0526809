//! Background secret rotation.
//!
//! # State Machine
//!
//! ```text
//!   ┌──────┐  tick   ┌────────────┐  Ok: publish   ┌──────┐
//!   │ Idle │ ──────► │ Refreshing │ ─────────────► │ Idle │
//!   └──────┘         └─────┬──────┘                └──────┘
//!                      ▲   │ Err: keep last good
//!                 tick │   ▼
//!                     ┌────────┐
//!                     │ Failed │
//!                     └────────┘
//! ```
//!
//! `Failed` holds until the next tick begins. A tick abandoned on
//! cancellation leaves the scheduler `Idle`.
//!
//! Ticks are serialized by a mutex, so two refreshes never race to publish.
//! The next automatic tick is scheduled `interval` after the previous one
//! completes. [`RotationHandle::trigger`] forces an immediate tick.
//!
//! # Structured Concurrency
//!
//! The loop is spawned on a `TaskTracker` and exits when its
//! `CancellationToken` fires.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::provider::SecretProvider;
use super::source::SecretFetchError;
use super::{SecretCell, SecretRecord};
use crate::metrics;

/// Default time between refreshes.
pub const DEFAULT_ROTATION_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationState {
    Idle,
    Refreshing,
    Failed,
}

impl RotationState {
    fn as_u8(self) -> u8 {
        match self {
            RotationState::Idle => 0,
            RotationState::Refreshing => 1,
            RotationState::Failed => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => RotationState::Refreshing,
            2 => RotationState::Failed,
            _ => RotationState::Idle,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RotationState::Idle => "idle",
            RotationState::Refreshing => "refreshing",
            RotationState::Failed => "failed",
        }
    }
}

/// Requests an out-of-band rotation from a running scheduler.
#[derive(Debug, Clone)]
pub struct RotationHandle {
    trigger: Arc<Notify>,
}

impl RotationHandle {
    /// Wake the scheduler now. Multiple calls before it wakes collapse into one tick.
    pub fn trigger(&self) {
        self.trigger.notify_one();
    }
}

/// Owns the write path to a [`SecretCell`].
#[derive(Clone)]
pub struct RotationScheduler {
    provider: SecretProvider,
    cell: SecretCell,
    secret_name: Arc<str>,
    interval: Duration,
    refresh_lock: Arc<Mutex<()>>,
    state: Arc<AtomicU8>,
    consecutive_failures: Arc<AtomicU32>,
    trigger: Arc<Notify>,
}

impl RotationScheduler {
    pub fn new(
        provider: SecretProvider,
        cell: SecretCell,
        secret_name: impl Into<Arc<str>>,
        interval: Duration,
    ) -> Self {
        Self {
            provider,
            cell,
            secret_name: secret_name.into(),
            interval,
            refresh_lock: Arc::new(Mutex::new(())),
            state: Arc::new(AtomicU8::new(RotationState::Idle.as_u8())),
            consecutive_failures: Arc::new(AtomicU32::new(0)),
            trigger: Arc::new(Notify::new()),
        }
    }

    pub fn handle(&self) -> RotationHandle {
        RotationHandle {
            trigger: self.trigger.clone(),
        }
    }

    pub fn cell(&self) -> &SecretCell {
        &self.cell
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> RotationState {
        RotationState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Failed ticks since the last successful one.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: RotationState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }

    /// Populate the cell before traffic is accepted.
    ///
    /// Walks the full fallback chain, so the cell is never left empty.
    pub async fn bootstrap(&self) -> Arc<SecretRecord> {
        let _guard = self.refresh_lock.lock().await;

        let record = self.provider.fetch_initial(&self.secret_name).await;
        metrics::set_secret_source(record.source);
        let record = Arc::new(record);
        self.cell.publish(record.clone());
        info!(
            secret = %self.secret_name,
            source = %record.source,
            "Initial secret published"
        );
        record
    }

    /// Run one refresh and publish on success.
    ///
    /// # Errors
    ///
    /// Returns the fetch error after logging it; the cell is left untouched.
    pub async fn tick(&self) -> Result<(), SecretFetchError> {
        let _guard = self.refresh_lock.lock().await;
        self.set_state(RotationState::Refreshing);

        match self.provider.refresh(&self.secret_name).await {
            Ok(record) => {
                let changed = self
                    .cell
                    .load()
                    .is_none_or(|current| current.value != record.value);
                metrics::set_secret_source(record.source);
                metrics::record_secret_refresh("success");

                if changed {
                    info!(secret = %self.secret_name, source = %record.source, "Secret rotated");
                } else {
                    debug!(secret = %self.secret_name, "Secret unchanged");
                }

                self.cell.publish(record);
                self.consecutive_failures.store(0, Ordering::SeqCst);
                self.set_state(RotationState::Idle);
                Ok(())
            }
            Err(e) => {
                self.set_state(RotationState::Failed);
                let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
                metrics::record_secret_refresh(e.kind());
                warn!(
                    secret = %self.secret_name,
                    error = %e,
                    consecutive_failures = failures,
                    "Secret refresh failed; keeping last good value"
                );
                Err(e)
            }
        }
    }

    /// Spawn the rotation loop on `tracker`.
    pub fn spawn(&self, tracker: &TaskTracker, cancel: CancellationToken) {
        let scheduler = self.clone();

        tracker.spawn(async move {
            info!(
                secret = %scheduler.secret_name,
                interval_secs = scheduler.interval.as_secs(),
                "Secret rotation task started"
            );

            loop {
                tokio::select! {
                    biased;

                    _ = cancel.cancelled() => break,
                    _ = scheduler.trigger.notified() => {
                        debug!("Manual secret rotation triggered");
                    }
                    _ = tokio::time::sleep(scheduler.interval) => {}
                }

                tokio::select! {
                    biased;

                    _ = cancel.cancelled() => {
                        scheduler.set_state(RotationState::Idle);
                        break;
                    }
                    // Errors are already logged inside tick.
                    _ = scheduler.tick() => {}
                }
            }

            debug!("Secret rotation task shutting down");
        });
    }
}

impl fmt::Debug for RotationScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RotationScheduler")
            .field("secret_name", &self.secret_name)
            .field("interval", &self.interval)
            .field("state", &self.state())
            .finish()
    }
}
