use std::fmt;

/// Commands understood by the fermentor firmware.
///
/// Each command goes out as a single ASCII line; `encode` yields the exact
/// literal the firmware matches on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    SystemOn,
    SystemOff,
    FanOn,
    FanOff,
    PumpOn,
    PumpOff,
    HeaterOn,
    HeaterOff,
    ControlHeat,
    MeasureOpticalDensity,
    /// Motor duty ratio in [0, 1]
    Motor(f64),
    Kickstart,
    MeasureTemperature,
    RequestData,
    Reset,
    LightShow,
}

impl Command {
    pub fn encode(&self) -> String {
        match self {
            Command::Motor(ratio) => format!("motor {:.4}", ratio),
            other => other.literal().to_string(),
        }
    }

    /// Command keyword, without arguments
    pub fn literal(&self) -> &'static str {
        match self {
            Command::SystemOn => "on",
            Command::SystemOff => "off",
            Command::FanOn => "fan on",
            Command::FanOff => "fan off",
            Command::PumpOn => "pump on",
            Command::PumpOff => "pump off",
            Command::HeaterOn => "heater on",
            Command::HeaterOff => "heater off",
            Command::ControlHeat => "control heat",
            Command::MeasureOpticalDensity => "OD",
            Command::Motor(_) => "motor",
            Command::Kickstart => "kickstart",
            Command::MeasureTemperature => "temp",
            Command::RequestData => "data",
            Command::Reset => "reset",
            Command::LightShow => "light show",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_motor_uses_four_decimals() {
        assert_eq!(Command::Motor(0.5).encode(), "motor 0.5000");
        assert_eq!(Command::Motor(0.95).encode(), "motor 0.9500");
        assert_eq!(Command::Motor(0.0).encode(), "motor 0.0000");
        assert_eq!(Command::Motor(1.0).to_string(), "motor 1.0000");
    }

    #[test]
    fn test_fixed_vocabulary() {
        let expected = [
            (Command::SystemOn, "on"),
            (Command::SystemOff, "off"),
            (Command::FanOn, "fan on"),
            (Command::FanOff, "fan off"),
            (Command::PumpOn, "pump on"),
            (Command::PumpOff, "pump off"),
            (Command::HeaterOn, "heater on"),
            (Command::HeaterOff, "heater off"),
            (Command::ControlHeat, "control heat"),
            (Command::MeasureOpticalDensity, "OD"),
            (Command::Kickstart, "kickstart"),
            (Command::MeasureTemperature, "temp"),
            (Command::RequestData, "data"),
            (Command::Reset, "reset"),
            (Command::LightShow, "light show"),
        ];
        for (command, literal) in expected {
            assert_eq!(command.encode(), literal);
            assert!(!command.encode().ends_with('\n'));
        }
    }
}
