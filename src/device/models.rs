use serde::{Deserialize, Serialize};

/// Serial connection state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected { port: String },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected { .. })
    }
}

/// Who drives the heater
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum HeaterMode {
    /// Firmware thermostat holds the culture temperature
    Auto,
    /// Manual override, heater forced on
    ManualOn,
    /// Manual override, heater forced off
    #[default]
    ManualOff,
}

/// Last known state of the fermentor.
///
/// Actuator fields reflect what was last *sent*, not a device acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DeviceState {
    pub is_on: bool,
    pub pump_on: bool,
    pub fan_on: bool,
    pub heater_mode: HeaterMode,
    pub motor_speed: f64,
    pub latest_temperature_c: f64,
    pub latest_red_absorbance: f64,
    pub latest_green_absorbance: f64,
}

impl DeviceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the firmware's automatic temperature control is active
    pub fn controlling_temperature(&self) -> bool {
        self.heater_mode == HeaterMode::Auto
    }

    pub fn apply_system_on(&mut self, default_motor_speed: f64) {
        self.is_on = true;
        self.heater_mode = HeaterMode::Auto;
        self.fan_on = true;
        self.pump_on = true;
        self.motor_speed = default_motor_speed;
    }

    pub fn apply_system_off(&mut self) {
        self.is_on = false;
        self.heater_mode = HeaterMode::ManualOff;
        self.fan_on = false;
        self.pump_on = false;
        self.motor_speed = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_all_off() {
        let state = DeviceState::new();
        assert!(!state.is_on && !state.pump_on && !state.fan_on);
        assert!(!state.controlling_temperature());
        assert_eq!(state.motor_speed, 0.0);
        assert_eq!(state.latest_temperature_c, 0.0);
    }

    #[test]
    fn test_system_on_off() {
        let mut state = DeviceState::new();
        state.apply_system_on(0.95);
        assert!(state.is_on && state.pump_on && state.fan_on);
        assert!(state.controlling_temperature());
        assert_eq!(state.motor_speed, 0.95);

        state.apply_system_off();
        assert!(!state.is_on && !state.pump_on && !state.fan_on);
        assert_eq!(state.heater_mode, HeaterMode::ManualOff);
        assert_eq!(state.motor_speed, 0.0);
    }

    #[test]
    fn test_connection_state() {
        assert!(!ConnectionState::default().is_connected());
        assert!(ConnectionState::Connected { port: "COM3".into() }.is_connected());
    }
}
