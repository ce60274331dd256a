//! Rig Server - Main Entry Point
//!
//! Loads settings, opens the LED, rangefinder and camera, and serves the HTTP
//! and WebSocket API until Ctrl-C.

use std::sync::Arc;

use anyhow::Context;
use rig_server::settings::RigSettings;
use rig_server::telemetry::{init_logging, LogConfig};
use rig_server::{run_server, AppContext};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings_path = RigSettings::default_path();
    let loaded = match &settings_path {
        Some(path) => RigSettings::load_or_default(path),
        None => Ok(RigSettings::default()),
    };
    let (settings, load_error) = match loaded {
        Ok(settings) => (settings, None),
        Err(e) => (RigSettings::default(), Some(e)),
    };

    // Keep the guard alive for the program duration
    let _log_guard = match init_logging(&LogConfig::from(&settings)) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            None
        }
    };

    tracing::info!("Rig Server v{}", env!("CARGO_PKG_VERSION"));
    if let Some(e) = load_error {
        tracing::warn!("Failed to load settings, using defaults: {}", e);
    }
    if let Some(path) = &settings_path {
        tracing::debug!("Settings file: {}", path.display());
    }

    let context = Arc::new(
        AppContext::from_settings(&settings).context("failed to open rig hardware")?,
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Shutdown requested");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
                // Dropping the sender would stop the server
                std::future::pending::<()>().await;
                drop(shutdown_tx);
            }
        }
    });

    let served = run_server(settings.port, context.clone(), shutdown_rx)
        .await
        .with_context(|| format!("API server on port {} failed", settings.port));

    // Release the camera whether the server exited cleanly or not
    context.stream.stop().await;
    tracing::info!("Rig Server stopped");
    served
}
