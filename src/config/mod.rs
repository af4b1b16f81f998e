//! Engine settings, loadable from a TOML file.
//!
//! ```toml
//! # fermentor.toml
//! ports = ["/dev/ttyACM0", "/dev/ttyUSB0"]
//! baud_rate = 9600
//! default_motor_speed = 0.9
//! poll_interval_ms = 10
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::serial::interface::{DEFAULT_BAUD_RATE, DEFAULT_OPEN_TIMEOUT_MS};

/// Environment variable naming the config file read by `FermentorConfig::load`
pub const CONFIG_ENV_VAR: &str = "FERMENTOR_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse TOML configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FermentorConfig {
    /// Candidate device paths, tried in order
    pub ports: Vec<String>,
    /// Also try ports the OS reports, after `ports`
    pub include_detected_ports: bool,
    pub baud_rate: u32,
    pub open_timeout_ms: u64,
    /// How long one poll iteration waits for bytes
    pub read_timeout_ms: u64,
    /// Pause between poll iterations
    pub poll_interval_ms: u64,
    /// Motor ratio used by `system_on` and `motor_on`
    pub default_motor_speed: f64,
    pub kickstart_delay_ms: u64,
    /// Output directory created for plots when a connection opens
    pub plot_dir: String,
    /// Appended to every outgoing command; the firmware needs none
    pub command_terminator: String,
    /// How often the binary logs a status snapshot
    pub status_interval_ms: u64,
}

impl Default for FermentorConfig {
    fn default() -> Self {
        Self {
            ports: default_ports(),
            include_detected_ports: false,
            baud_rate: DEFAULT_BAUD_RATE,
            open_timeout_ms: DEFAULT_OPEN_TIMEOUT_MS,
            read_timeout_ms: 25,
            poll_interval_ms: 10,
            default_motor_speed: 0.95,
            kickstart_delay_ms: 300,
            plot_dir: "plots_directory".to_string(),
            command_terminator: String::new(),
            status_interval_ms: 5000,
        }
    }
}

impl FermentorConfig {
    /// Load from the file named by `FERMENTOR_CONFIG`, or use defaults
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::from_file(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let config = Self::from_toml(&content)?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.default_motor_speed) {
            return Err(ConfigError::Invalid(format!(
                "default_motor_speed must be within [0, 1], got {}",
                self.default_motor_speed
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll_interval_ms must be positive".to_string()));
        }
        if self.baud_rate == 0 {
            return Err(ConfigError::Invalid("baud_rate must be positive".to_string()));
        }
        if self.status_interval_ms == 0 {
            return Err(ConfigError::Invalid("status_interval_ms must be positive".to_string()));
        }
        Ok(())
    }

    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn kickstart_delay(&self) -> Duration {
        Duration::from_millis(self.kickstart_delay_ms)
    }
}

/// Platform-specific device paths the fermentor's board usually shows up on
pub fn default_ports() -> Vec<String> {
    #[cfg(target_os = "macos")]
    let ports: &[&str] = &["/dev/cu.usbmodem1421", "/dev/cu.usbmodem621", "/dev/cu.usbmodem411"];

    #[cfg(target_os = "linux")]
    let ports: &[&str] = &["/dev/ttyACM0", "/dev/ttyACM1", "/dev/ttyACM2", "/dev/ttyACM3"];

    #[cfg(target_os = "windows")]
    let ports: &[&str] = &["COM1", "COM2", "COM3", "COM4"];

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    let ports: &[&str] = &["/dev/ttyACM0", "/dev/ttyUSB0"];

    ports.iter().map(|p| p.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = FermentorConfig::from_toml("").unwrap();
        assert_eq!(config, FermentorConfig::default());
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.default_motor_speed, 0.95);
        assert_eq!(config.poll_interval(), Duration::from_millis(10));
        assert!(!config.ports.is_empty());
    }

    #[test]
    fn test_partial_config() {
        let toml = r#"
            ports = ["/dev/ttyUSB3"]
            default_motor_speed = 0.8
            command_terminator = "\n"
        "#;

        let config = FermentorConfig::from_toml(toml).unwrap();
        assert_eq!(config.ports, vec!["/dev/ttyUSB3".to_string()]);
        assert_eq!(config.default_motor_speed, 0.8);
        assert_eq!(config.command_terminator, "\n");
        assert_eq!(config.kickstart_delay_ms, 300);
    }

    #[test]
    fn test_rejects_out_of_range_speed() {
        let err = FermentorConfig::from_toml("default_motor_speed = 1.5").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_zero_poll_interval() {
        let err = FermentorConfig::from_toml("poll_interval_ms = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_malformed_toml() {
        let err = FermentorConfig::from_toml("ports = [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "baud_rate = 115200").unwrap();

        let config = FermentorConfig::from_file(file.path()).unwrap();
        assert_eq!(config.baud_rate, 115200);
    }

    #[test]
    fn test_missing_file() {
        let err = FermentorConfig::from_file(Path::new("/nonexistent/fermentor.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
