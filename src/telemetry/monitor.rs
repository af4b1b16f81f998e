use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{sleep, timeout, Duration};

use crate::device::DeviceContext;

const STOP_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MonitorError {
    #[error("Telemetry polling already running")]
    AlreadyRunning,

    #[error("Telemetry polling not running")]
    NotRunning,
}

/// Background poll loop feeding firmware telemetry into the device context
pub struct TelemetryMonitor {
    session: Mutex<Option<MonitoringSession>>,
}

struct MonitoringSession {
    task_handle: tokio::task::JoinHandle<()>,
    stop_tx: mpsc::Sender<()>,
}

impl TelemetryMonitor {
    pub fn new() -> Self {
        Self {
            session: Mutex::new(None),
        }
    }

    pub async fn is_running(&self) -> bool {
        self.session
            .lock()
            .await
            .as_ref()
            .map_or(false, |s| !s.task_handle.is_finished())
    }

    /// Spawn the poll loop. It reads, applies, sleeps `poll_interval`, and
    /// repeats until `stop` is called.
    pub async fn start(&self, context: Arc<DeviceContext>, poll_interval: Duration) -> Result<(), MonitorError> {
        let mut session = self.session.lock().await;
        if session.is_some() {
            log::warn!("Attempted to start telemetry polling while it is already running");
            return Err(MonitorError::AlreadyRunning);
        }

        let (stop_tx, stop_rx) = mpsc::channel(1);
        let task_handle = tokio::spawn(Self::poll_loop(context, poll_interval, stop_rx));

        *session = Some(MonitoringSession { task_handle, stop_tx });
        Ok(())
    }

    /// Signal the loop and wait for it to exit. No iteration starts after
    /// this returns; a loop that does not exit within the grace period is aborted.
    pub async fn stop(&self) -> Result<(), MonitorError> {
        let session = self.session.lock().await.take();
        let Some(session) = session else {
            return Err(MonitorError::NotRunning);
        };

        let _ = session.stop_tx.send(()).await;

        let mut task_handle = session.task_handle;
        if timeout(STOP_GRACE, &mut task_handle).await.is_err() {
            log::warn!("Telemetry polling did not stop within {:?}, aborting", STOP_GRACE);
            task_handle.abort();
        }
        Ok(())
    }

    async fn poll_loop(
        context: Arc<DeviceContext>,
        poll_interval: Duration,
        mut stop_rx: mpsc::Receiver<()>,
    ) {
        let start_time = Instant::now();
        let mut events = 0u64;
        log::info!("Starting telemetry polling every {:?}", poll_interval);

        loop {
            tokio::select! {
                biased;
                _ = stop_rx.recv() => break,
                event = context.poll_once() => {
                    if let Some(event) = event {
                        if event.is_recognized() {
                            events += 1;
                        }
                    }
                }
            }

            tokio::select! {
                biased;
                _ = stop_rx.recv() => break,
                _ = sleep(poll_interval) => {}
            }
        }

        log::info!(
            "Stopped telemetry polling (ran for {:?}, {} telemetry events)",
            start_time.elapsed(),
            events
        );
    }
}

impl Default for TelemetryMonitor {
    fn default() -> Self {
        Self::new()
    }
}
