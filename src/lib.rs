//! # Gatekeeper
//!
//! Access-control middleware for Axum services:
//!
//! - **IP allow list**: IPv4 CIDR rules scoped to restricted path prefixes
//! - **Token gate**: shared-secret header check with constant-time comparison
//! - **Secret rotation**: Vault KV v2 source with environment and static
//!   fallbacks, refreshed in the background and published atomically
//! - **Observability**: request IDs, structured logging, Prometheus metrics
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum HTTP Server                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Middleware (Request ID → Trace → Gatekeeper)               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Gates (IpAllowListGate → TokenGate)       ◄── SecretCell   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  RotationScheduler → SecretProvider → Vault / env / static  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use axum::{Router, routing::post};
//! use gatekeeper::{AppState, Config, routes};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let state = AppState::from_config(config)?;
//!     state.start().await;
//!
//!     let _app = routes::guard(
//!         Router::<()>::new().route("/auth/login", post(|| async { "ok" })),
//!         &state,
//!     );
//!
//!     // Serve with `into_make_service_with_connect_info::<SocketAddr>()`...
//!     Ok(())
//! }
//! ```
//!
//! ## Security Configuration
//!
//! ```bash
//! ALLOWED_IPS=10.0.0.0/8,192.168.1.20 \
//! VAULT_ADDRESS=http://127.0.0.1:8200 VAULT_TOKEN=... cargo run
//! ```

pub mod config;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod secrets;
pub mod state;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use error::{AppError, AppResult};
pub use gate::{GateDecision, GatekeeperChain, RequestDescriptor};
pub use routes::build_router;
pub use secrets::{SecretCell, SecretRecord};
pub use state::AppState;
