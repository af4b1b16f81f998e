pub mod types;
pub mod parser;
pub mod monitor;

pub use types::*;
pub use parser::parse_telemetry_line;
pub use monitor::{MonitorError, TelemetryMonitor};
