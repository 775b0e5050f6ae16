//! `companion`: healthcare companion API entry point.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise the telemetry pipeline (tracing, optional OTLP).
//! 3. Parse the field-encryption key and build the [`FieldCipher`].
//! 4. Load the hospital/NGO directory into [`DirectoryCache`].
//! 5. Load persisted records (profiles, appointments, metrics, submitted NGOs).
//! 6. Spawn background tasks: OTP purge, directory refresh.
//! 7. Build the Axum router and serve until interrupted.

mod appointments;
mod auth;
mod config;
mod crypto;
mod directory;
mod geo;
mod metrics;
mod otp;
mod persist;
mod profile;
mod server;
mod telemetry;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use config::Config;
use crypto::{FieldCipher, FieldKey};
use directory::{DirectoryCache, DirectorySource, FileSource};
use server::state::{AppState, RecordRepos};

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e:#}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init_telemetry(cfg.otel_exporter_otlp_endpoint.as_deref(), &cfg.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = cfg.port,
        "companion starting"
    );

    // -----------------------------------------------------------------------
    // 3. Field encryption
    // -----------------------------------------------------------------------
    let cipher = FieldCipher::new(FieldKey::load(cfg.encryption_key.as_deref()));

    // -----------------------------------------------------------------------
    // 4. Directory
    // -----------------------------------------------------------------------
    let directory = DirectoryCache::new();
    let source: Arc<dyn DirectorySource> = Arc::new(FileSource::new(&cfg.directory_path));
    if let Err(e) = directory::load_all(Arc::clone(&source), &directory).await {
        // Serve with an empty directory; /health reports degraded until a
        // refresh succeeds.
        warn!(error = %e, "initial directory load failed");
    }

    // -----------------------------------------------------------------------
    // 5. Persisted records
    // -----------------------------------------------------------------------
    let repos = RecordRepos::in_dir(&cfg.records_dir);
    let state = AppState::load(&cfg, cipher, directory.clone(), repos)
        .await
        .context("failed to load persisted records")?;
    info!(records_dir = %cfg.records_dir, "records loaded");

    // -----------------------------------------------------------------------
    // 6. Background tasks
    // -----------------------------------------------------------------------
    let _otp_purge = otp::purge_task(state.otp.clone(), cfg.otp_purge_interval());
    let _directory_refresh =
        directory::refresh_task(source, cfg.directory_refresh_interval(), directory);

    // -----------------------------------------------------------------------
    // 7. HTTP server
    // -----------------------------------------------------------------------
    let router = server::router::build(state);

    let addr: std::net::SocketAddr = ([0, 0, 0, 0], cfg.port).into();
    info!(addr = %addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    opentelemetry::global::shutdown_tracer_provider();
    info!("companion stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
