use crate::telemetry::types::TelemetryEvent;

pub const OD_PREFIX: &str = "OD:";
pub const TEMPERATURE_PREFIX: &str = "temp:";
pub const DATA_PREFIX: &str = "data:";

/// Classify one line of firmware output.
///
/// Never fails: anything that is not a well-formed telemetry line comes back
/// as `TelemetryEvent::Unrecognized`.
pub fn parse_telemetry_line(line: &str) -> TelemetryEvent {
    let trimmed = line.trim();

    let parsed = if let Some(rest) = trimmed.strip_prefix(OD_PREFIX) {
        parse_od(rest)
    } else if let Some(rest) = trimmed.strip_prefix(TEMPERATURE_PREFIX) {
        parse_temperature(rest)
    } else if let Some(rest) = trimmed.strip_prefix(DATA_PREFIX) {
        parse_bulk(rest)
    } else {
        None
    };

    parsed.unwrap_or_else(|| TelemetryEvent::Unrecognized { line: trimmed.to_string() })
}

/// Format: OD: <red> <green>
fn parse_od(rest: &str) -> Option<TelemetryEvent> {
    match parse_values(rest)?.as_slice() {
        [red, green] => Some(TelemetryEvent::OpticalDensity { red: *red, green: *green }),
        _ => None,
    }
}

/// Format: temp: <celsius>
fn parse_temperature(rest: &str) -> Option<TelemetryEvent> {
    match parse_values(rest)?.as_slice() {
        [celsius] => Some(TelemetryEvent::Temperature { celsius: *celsius }),
        _ => None,
    }
}

/// Format: data: <r1> <g1> <r2> <g2> ...
fn parse_bulk(rest: &str) -> Option<TelemetryEvent> {
    let values = parse_values(rest)?;
    if values.is_empty() || values.len() % 2 != 0 {
        return None;
    }

    let reds = values.iter().step_by(2).copied().collect();
    let greens = values.iter().skip(1).step_by(2).copied().collect();
    Some(TelemetryEvent::BulkOpticalDensity { reds, greens })
}

fn parse_values(rest: &str) -> Option<Vec<f64>> {
    rest.split_whitespace()
        .map(|token| token.parse::<f64>().ok().filter(|v| v.is_finite()))
        .collect()
}
