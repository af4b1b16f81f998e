pub mod serial;
pub mod telemetry;
pub mod history;
pub mod device;
pub mod config;

use std::sync::Arc;
use std::time::Duration;
use anyhow::Context;
use serde::Serialize;

pub use config::FermentorConfig;
pub use device::{ConnectionState, DeviceError, DeviceState, FermentorManager, HeaterMode};
pub use history::{HistorySnapshot, LatestReadings};
pub use telemetry::{MetricsSnapshot, TelemetryEvent};

#[derive(Serialize)]
struct StatusReport {
  session: String,
  elapsed_s: f64,
  state: DeviceState,
  latest: LatestReadings,
  metrics: MetricsSnapshot,
}

/// Connect to the fermentor and keep it polled until Ctrl-C, then switch it
/// off and close the port.
pub async fn run() -> anyhow::Result<()> {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

  let config = FermentorConfig::load().context("Failed to load fermentor configuration")?;
  let status_interval = Duration::from_millis(config.status_interval_ms);

  let manager = Arc::new(FermentorManager::new(config));
  let port = manager
    .connect()
    .await
    .context("Could not connect to the fermentor")?;

  log::info!("Fermentor control session {} started on {}", manager.session_label().await, port);

  let shutdown = tokio::signal::ctrl_c();
  tokio::pin!(shutdown);
  let mut status_timer = tokio::time::interval(status_interval);

  loop {
    tokio::select! {
      _ = &mut shutdown => break,
      _ = status_timer.tick() => log_status(&manager).await,
    }
  }

  manager.shutdown().await;
  log::info!("Closing app...");
  Ok(())
}

async fn log_status(manager: &FermentorManager) {
  let report = StatusReport {
    session: manager.session_label().await,
    elapsed_s: manager.elapsed_seconds().await,
    state: manager.state().await,
    latest: manager.latest().await,
    metrics: manager.metrics(),
  };

  match serde_json::to_string(&report) {
    Ok(json) => log::info!("status {}", json),
    Err(e) => log::warn!("Failed to encode status report: {}", e),
  }
}
