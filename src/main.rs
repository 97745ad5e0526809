use std::net::SocketAddr;
use std::process::ExitCode;

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use gatekeeper::config::LogFormat;
use gatekeeper::{AppState, Config, build_router, metrics, utils};

#[tokio::main]
async fn main() -> ExitCode {
    // Load configuration before logging so LOG_FORMAT is honored
    let config = Config::from_env();

    let (log_level, log_format) = match &config {
        Ok(c) => (c.log_level.clone(), c.log_format),
        Err(_) => ("info".to_string(), LogFormat::Text),
    };
    init_logging(&log_level, log_format);

    info!("Starting gatekeeper v{}", env!("CARGO_PKG_VERSION"));

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::from(e.exit_code() as u8);
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::from(exitcode::OK as u8),
        Err(exit_code) => ExitCode::from(exit_code as u8),
    }
}

fn init_logging(log_level: &str, format: LogFormat) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

/// Run the application, returning an exit code on error.
async fn run(config: Config) -> Result<(), exitcode::ExitCode> {
    info!(
        host = %config.host,
        port = %config.port,
        secret = %config.secret_name,
        rotation_interval_secs = config.rotation_interval.as_secs(),
        vault = config.vault.is_some(),
        "Configuration loaded"
    );

    if let Some(metrics_addr) = config.metrics_addr() {
        metrics::try_init_metrics(metrics_addr);
    }

    let addr: SocketAddr = config.server_addr().parse().map_err(|e| {
        error!("Invalid server address: {e}");
        exitcode::CONFIG
    })?;

    // Publish the first secret before accepting traffic
    let state = AppState::from_config(config).map_err(|e| {
        error!("{e}");
        e.exit_code()
    })?;
    let record = state.start().await;
    info!(source = %record.source, "Secret bootstrap complete");

    let app = build_router(state.clone());

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind to {addr}: {e}");
        exitcode::UNAVAILABLE
    })?;

    info!("Server listening on http://{addr}");
    info!("  GET  /health - Health check");
    info!("  GET  /ready  - Readiness check");

    // ConnectInfo supplies the peer address when X-Forwarded-For is absent
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(utils::shutdown_signal())
    .await
    .map_err(|e| {
        error!("Server error: {e}");
        exitcode::SOFTWARE
    })?;

    info!("HTTP server stopped, shutting down background tasks...");
    state.shutdown().await;

    info!("Server shutdown complete");
    Ok(())
}
