use tokio::sync::{watch, Mutex, RwLock};

use crate::history::HistoryStore;
use crate::serial::{Command, SerialError, SerialInterface};
use crate::telemetry::parser::parse_telemetry_line;
use crate::telemetry::types::{MetricsSnapshot, TelemetryEvent};
use super::models::DeviceState;

/// Everything the command side and the poll loop share.
///
/// The serial interface sits behind a single mutex so command writes and
/// telemetry reads never interleave on the wire.
pub struct DeviceContext {
    interface: Mutex<SerialInterface>,
    state: RwLock<DeviceState>,
    history: RwLock<HistoryStore>,
    metrics_tx: watch::Sender<MetricsSnapshot>,
    read_timeout_ms: u64,
}

impl DeviceContext {
    pub fn new(interface: SerialInterface, read_timeout_ms: u64) -> Self {
        let (metrics_tx, _metrics_rx) = watch::channel(MetricsSnapshot::default());
        Self {
            interface: Mutex::new(interface),
            state: RwLock::new(DeviceState::new()),
            history: RwLock::new(HistoryStore::new()),
            metrics_tx,
            read_timeout_ms,
        }
    }

    pub fn interface(&self) -> &Mutex<SerialInterface> {
        &self.interface
    }

    pub fn state(&self) -> &RwLock<DeviceState> {
        &self.state
    }

    pub fn history(&self) -> &RwLock<HistoryStore> {
        &self.history
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics_tx.borrow().clone()
    }

    pub fn subscribe_metrics(&self) -> watch::Receiver<MetricsSnapshot> {
        self.metrics_tx.subscribe()
    }

    /// Encode and transmit one command. Failures are logged and counted here;
    /// the caller decides whether to surface them.
    pub async fn send_command(&self, command: Command) -> Result<(), SerialError> {
        let line = command.encode();
        log::debug!("Sending instruction: \"{}\"", line);

        let result = {
            let mut interface = self.interface.lock().await;
            interface.send_line(&line).await
        };

        match &result {
            Ok(()) => self.metrics_tx.send_modify(|m| m.commands_sent += 1),
            Err(e) => {
                log::warn!("Sending instruction \"{}\" failed: {}", line, e);
                let message = format!("write \"{}\": {}", line, e);
                self.metrics_tx.send_modify(|m| {
                    m.write_errors += 1;
                    m.last_error = Some(message);
                });
            }
        }
        result
    }

    /// One poll-loop iteration: read at most one line and apply it.
    ///
    /// Read timeouts and read errors both yield `None`; errors are counted.
    pub async fn poll_once(&self) -> Option<TelemetryEvent> {
        let (read, stats) = {
            let mut interface = self.interface.lock().await;
            let read = interface.read_line(self.read_timeout_ms).await;
            (read, interface.stats())
        };

        self.metrics_tx.send_if_modified(|m| {
            let changed = m.utf8_decode_errors != stats.utf8_decode_errors
                || m.partial_buffer_trims != stats.partial_buffer_trims;
            m.utf8_decode_errors = stats.utf8_decode_errors;
            m.partial_buffer_trims = stats.partial_buffer_trims;
            changed
        });

        match read {
            Ok(Some(line)) => Some(self.apply_line(&line).await),
            Ok(None) => None,
            Err(e) => {
                log::debug!("Serial read failed: {}", e);
                let message = format!("read: {}", e);
                self.metrics_tx.send_modify(|m| {
                    m.read_errors += 1;
                    m.last_error = Some(message);
                });
                None
            }
        }
    }

    /// Decode one line and fold it into history and device state
    pub async fn apply_line(&self, line: &str) -> TelemetryEvent {
        let event = parse_telemetry_line(line);
        self.apply_event(&event).await;

        let recognized = event.is_recognized();
        self.metrics_tx.send_modify(|m| {
            m.lines_read += 1;
            if recognized {
                m.telemetry_events += 1;
            } else {
                m.unrecognized_lines += 1;
            }
        });
        event
    }

    async fn apply_event(&self, event: &TelemetryEvent) {
        match event {
            TelemetryEvent::OpticalDensity { red, green } => {
                self.history.write().await.append_optical_density(*red, *green);
                let mut state = self.state.write().await;
                state.latest_red_absorbance = *red;
                state.latest_green_absorbance = *green;
                log::debug!("Updated OD measurements: RA={:.2} GA={:.2}", red, green);
            }
            TelemetryEvent::Temperature { celsius } => {
                self.history.write().await.append_temperature(*celsius);
                self.state.write().await.latest_temperature_c = *celsius;
                log::debug!("Updated temperature: {:.3} deg C", celsius);
            }
            TelemetryEvent::BulkOpticalDensity { reds, greens } => {
                let replaced = self.history.write().await.replace_optical_density_bulk(reds, greens);
                if let (true, Some(red), Some(green)) = (replaced, reds.last(), greens.last()) {
                    let mut state = self.state.write().await;
                    state.latest_red_absorbance = *red;
                    state.latest_green_absorbance = *green;
                    log::debug!("Resynchronised {} OD samples from device", reds.len());
                }
            }
            TelemetryEvent::Unrecognized { line } => {
                log::trace!("Discarding unrecognized line: {:?}", line);
            }
        }
    }
}
