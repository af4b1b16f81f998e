use std::sync::Arc;
use tokio::sync::{watch, RwLock};

use crate::config::FermentorConfig;
use crate::history::{HistorySnapshot, LatestReadings};
use crate::serial::{Command, PortOpener, SerialInterface, SystemPortOpener};
use crate::telemetry::{MetricsSnapshot, TelemetryMonitor};
use super::{ConnectionState, DeviceContext, DeviceError, DeviceState, HeaterMode, Result};

/// Control engine for one fermentor.
///
/// Command operations send first and then update local state whether or not
/// the send succeeded. A failed send is logged, counted in the metrics and
/// returned to the caller, but the state change stands: `state()` reports
/// what was requested, not what the firmware acknowledged.
pub struct FermentorManager {
    config: FermentorConfig,
    opener: Box<dyn PortOpener>,
    context: Arc<DeviceContext>,
    connection: RwLock<ConnectionState>,
    monitor: TelemetryMonitor,
}

impl FermentorManager {
    pub fn new(config: FermentorConfig) -> Self {
        Self::with_opener(config, Box::new(SystemPortOpener))
    }

    pub fn with_opener(config: FermentorConfig, opener: Box<dyn PortOpener>) -> Self {
        let mut interface = SerialInterface::new();
        interface.set_terminator(&config.command_terminator);

        Self {
            context: Arc::new(DeviceContext::new(interface, config.read_timeout_ms)),
            config,
            opener,
            connection: RwLock::new(ConnectionState::Disconnected),
            monitor: TelemetryMonitor::new(),
        }
    }

    pub fn config(&self) -> &FermentorConfig {
        &self.config
    }

    // CONNECTION

    /// Find the fermentor on the candidate ports and start polling it.
    ///
    /// Returns the port that opened. Fails with `NoPortAvailable` when no
    /// candidate opens. Calling it while connected returns the current port.
    pub async fn connect(&self) -> Result<String> {
        // Held through discovery so concurrent callers queue behind one attempt
        let mut connection = self.connection.write().await;
        if let ConnectionState::Connected { port } = &*connection {
            log::debug!("Already connected to {}", port);
            return Ok(port.clone());
        }

        let candidates = self.candidate_ports();
        let port = {
            let mut interface = self.context.interface().lock().await;
            interface.discover_and_open(
                &candidates,
                self.opener.as_ref(),
                self.config.baud_rate,
                self.config.open_timeout(),
            )?
        };

        self.prepare_plot_dir();
        *connection = ConnectionState::Connected { port: port.clone() };

        if let Err(e) = self.monitor.start(self.context.clone(), self.config.poll_interval()).await {
            log::warn!("Telemetry polling not started: {}", e);
        }

        log::info!("Fermentor connected on {}", port);
        Ok(port)
    }

    /// Stop polling and close the port. Safe to call when not connected.
    pub async fn disconnect(&self) {
        let _ = self.monitor.stop().await;
        self.context.interface().lock().await.disconnect();
        *self.connection.write().await = ConnectionState::Disconnected;
    }

    /// Turn the fermentor off (if connected), then tear the connection down
    pub async fn shutdown(&self) {
        if self.connection.read().await.is_connected() {
            log::info!("Turning fermentor off...");
            if let Err(e) = self.system_off().await {
                log::warn!("Fermentor may still be running: {}", e);
            }
        }
        self.disconnect().await;
    }

    fn candidate_ports(&self) -> Vec<String> {
        let mut candidates = self.config.ports.clone();
        if self.config.include_detected_ports {
            match SerialInterface::detected_port_names() {
                Ok(detected) => {
                    for name in detected {
                        if !candidates.contains(&name) {
                            candidates.push(name);
                        }
                    }
                }
                Err(e) => log::warn!("Serial port enumeration failed: {}", e),
            }
        }
        candidates
    }

    fn prepare_plot_dir(&self) {
        if self.config.plot_dir.is_empty() {
            return;
        }
        if let Err(e) = std::fs::create_dir_all(&self.config.plot_dir) {
            log::warn!("Could not create plot directory {}: {}", self.config.plot_dir, e);
        }
    }

    // FERMENTOR CONTROL

    pub async fn system_on(&self) -> Result<()> {
        let sent = self.send(Command::SystemOn).await;
        let speed = self.config.default_motor_speed;
        self.update_state(|s| s.apply_system_on(speed)).await;
        sent
    }

    /// Clears the history (via `reset`) before switching everything off
    pub async fn system_off(&self) -> Result<()> {
        let reset = self.reset().await;
        let sent = self.send(Command::SystemOff).await;
        self.update_state(|s| s.apply_system_off()).await;
        reset.and(sent)
    }

    pub async fn fan_on(&self) -> Result<()> {
        let sent = self.send(Command::FanOn).await;
        self.update_state(|s| s.fan_on = true).await;
        sent
    }

    pub async fn fan_off(&self) -> Result<()> {
        let sent = self.send(Command::FanOff).await;
        self.update_state(|s| s.fan_on = false).await;
        sent
    }

    pub async fn pump_on(&self) -> Result<()> {
        let sent = self.send(Command::PumpOn).await;
        self.update_state(|s| s.pump_on = true).await;
        sent
    }

    pub async fn pump_off(&self) -> Result<()> {
        let sent = self.send(Command::PumpOff).await;
        self.update_state(|s| s.pump_on = false).await;
        sent
    }

    /// Manual override: heater forced on, thermostat disengaged
    pub async fn heater_on(&self) -> Result<()> {
        let sent = self.send(Command::HeaterOn).await;
        self.update_state(|s| s.heater_mode = HeaterMode::ManualOn).await;
        sent
    }

    /// Manual override: heater forced off, thermostat disengaged
    pub async fn heater_off(&self) -> Result<()> {
        let sent = self.send(Command::HeaterOff).await;
        self.update_state(|s| s.heater_mode = HeaterMode::ManualOff).await;
        sent
    }

    pub async fn control_heat_auto(&self) -> Result<()> {
        let sent = self.send(Command::ControlHeat).await;
        self.update_state(|s| s.heater_mode = HeaterMode::Auto).await;
        sent
    }

    /// Set the motor duty ratio. Values outside [0, 1] are clamped; NaN is
    /// rejected without sending anything.
    pub async fn set_motor(&self, ratio: f64) -> Result<()> {
        if ratio.is_nan() {
            return Err(DeviceError::InvalidMotorSpeed(ratio));
        }
        // Adding 0.0 turns -0.0 into 0.0 so it never encodes as "-0.0000"
        let speed = ratio.clamp(0.0, 1.0) + 0.0;
        if speed != ratio {
            log::warn!("Motor ratio {} out of range, clamped to {}", ratio, speed);
        }

        let sent = self.send(Command::Motor(speed)).await;
        self.update_state(|s| s.motor_speed = speed).await;
        sent
    }

    /// Spin up to the default speed, then kickstart once the motor settles.
    /// The settle delay holds no lock.
    pub async fn motor_on(&self) -> Result<()> {
        let set = self.set_motor(self.config.default_motor_speed).await;
        tokio::time::sleep(self.config.kickstart_delay()).await;
        let kick = self.kickstart().await;
        set.and(kick)
    }

    pub async fn motor_off(&self) -> Result<()> {
        self.set_motor(0.0).await
    }

    pub async fn kickstart(&self) -> Result<()> {
        self.send(Command::Kickstart).await
    }

    /// Request one OD reading; the result arrives through the poll loop
    pub async fn measure_optical_density(&self) -> Result<()> {
        self.send(Command::MeasureOpticalDensity).await
    }

    /// Request one temperature reading; the result arrives through the poll loop
    pub async fn measure_temperature(&self) -> Result<()> {
        self.send(Command::MeasureTemperature).await
    }

    /// Ask the firmware for its full OD history (`data:` resync)
    pub async fn request_data(&self) -> Result<()> {
        self.send(Command::RequestData).await
    }

    pub async fn light_show(&self) -> Result<()> {
        self.send(Command::LightShow).await
    }

    /// Reset the firmware and restart history logging from zero
    pub async fn reset(&self) -> Result<()> {
        let sent = self.send(Command::Reset).await;
        self.context.history().write().await.reset();
        log::info!("Reset fermentor data logging");
        sent
    }

    // STATE ACCESS

    pub async fn state(&self) -> DeviceState {
        self.context.state().read().await.clone()
    }

    pub async fn latest(&self) -> LatestReadings {
        self.context.history().read().await.latest()
    }

    pub async fn history(&self) -> HistorySnapshot {
        self.context.history().read().await.snapshot()
    }

    /// Seconds since the last reset
    pub async fn elapsed_seconds(&self) -> f64 {
        self.context.history().read().await.elapsed_seconds()
    }

    pub async fn session_label(&self) -> String {
        self.context.history().read().await.session_label()
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.connection.read().await.clone()
    }

    pub async fn is_polling(&self) -> bool {
        self.monitor.is_running().await
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.context.metrics()
    }

    pub fn subscribe_metrics(&self) -> watch::Receiver<MetricsSnapshot> {
        self.context.subscribe_metrics()
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.context.send_command(command).await.map_err(DeviceError::from)
    }

    async fn update_state<F>(&self, f: F)
    where
        F: FnOnce(&mut DeviceState),
    {
        let mut state = self.context.state().write().await;
        f(&mut state);
    }
}
