use serde::{Deserialize, Serialize};

/// One decoded line of firmware output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TelemetryEvent {
    /// `OD: <red> <green>`
    OpticalDensity { red: f64, green: f64 },
    /// `temp: <celsius>`
    Temperature { celsius: f64 },
    /// `data: <r1> <g1> <r2> <g2> ...`, the firmware's full OD history
    BulkOpticalDensity { reds: Vec<f64>, greens: Vec<f64> },
    /// Anything else: echoes, debug prints, garbled or truncated lines
    Unrecognized { line: String },
}

impl TelemetryEvent {
    pub fn is_recognized(&self) -> bool {
        !matches!(self, TelemetryEvent::Unrecognized { .. })
    }
}

/// Engine counters, published after every poll iteration and command
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub lines_read: u64,
    pub telemetry_events: u64,
    pub unrecognized_lines: u64,
    pub read_errors: u64,
    pub commands_sent: u64,
    pub write_errors: u64,
    pub partial_buffer_trims: u64,
    pub utf8_decode_errors: u64,
    pub last_error: Option<String>,
}
