//! In-memory sample history for one fermentor run.
//!
//! All series share one elapsed-time origin, restarted by `reset()`.

pub mod series;

pub use series::{SamplePoint, TimeSeries};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Label format used for run titles and output file names
pub const SESSION_LABEL_FORMAT: &str = "%Y-%m-%d-%H%MZ";

/// Paired red/green absorbance reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OdSample {
    pub red: f64,
    pub green: f64,
}

/// Most recent value of each series, 0.0 when a series is empty
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LatestReadings {
    pub temperature_c: f64,
    pub red_absorbance: f64,
    pub green_absorbance: f64,
}

/// Owned copy of the history handed to display and plotting code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySnapshot {
    pub session_label: String,
    pub elapsed_s: f64,
    pub temperature: TimeSeries<f64>,
    pub red_absorbance: TimeSeries<f64>,
    pub green_absorbance: TimeSeries<f64>,
    pub optical_density: TimeSeries<OdSample>,
}

#[derive(Debug, Clone)]
pub struct HistoryStore {
    origin: Instant,
    started_at: DateTime<Utc>,
    temperature: TimeSeries<f64>,
    red_absorbance: TimeSeries<f64>,
    green_absorbance: TimeSeries<f64>,
    optical_density: TimeSeries<OdSample>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            started_at: Utc::now(),
            temperature: TimeSeries::new(),
            red_absorbance: TimeSeries::new(),
            green_absorbance: TimeSeries::new(),
            optical_density: TimeSeries::new(),
        }
    }

    pub fn origin(&self) -> Instant {
        self.origin
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn session_label(&self) -> String {
        self.started_at.format(SESSION_LABEL_FORMAT).to_string()
    }

    /// Seconds since the last reset
    pub fn elapsed_seconds(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }

    pub fn append_temperature(&mut self, celsius: f64) {
        let elapsed = self.elapsed_seconds();
        self.append_temperature_at(elapsed, celsius);
    }

    pub fn append_temperature_at(&mut self, elapsed_s: f64, celsius: f64) {
        self.temperature.push(elapsed_s, celsius);
    }

    pub fn append_optical_density(&mut self, red: f64, green: f64) {
        let elapsed = self.elapsed_seconds();
        self.append_optical_density_at(elapsed, red, green);
    }

    pub fn append_optical_density_at(&mut self, elapsed_s: f64, red: f64, green: f64) {
        self.red_absorbance.push(elapsed_s, red);
        self.green_absorbance.push(elapsed_s, green);
        self.optical_density.push(elapsed_s, OdSample { red, green });
    }

    /// Replace the optical density history with a full dump from the firmware.
    ///
    /// The dump carries no timestamps. When it has as many samples as the
    /// current history the existing times are kept position by position,
    /// otherwise the samples are spread evenly over `[0, now]`.
    /// Returns false, leaving the store untouched, for empty or unpaired input.
    pub fn replace_optical_density_bulk(&mut self, reds: &[f64], greens: &[f64]) -> bool {
        if reds.is_empty() || reds.len() != greens.len() {
            return false;
        }

        let times = if reds.len() == self.optical_density.len() {
            self.optical_density.times()
        } else {
            synthetic_time_axis(reds.len(), self.elapsed_seconds())
        };

        let pairs: Vec<OdSample> = reds
            .iter()
            .zip(greens)
            .map(|(red, green)| OdSample { red: *red, green: *green })
            .collect();

        self.red_absorbance.replace(&times, reds);
        self.green_absorbance.replace(&times, greens);
        self.optical_density.replace(&times, &pairs);
        true
    }

    /// Drop every series and restart the elapsed-time origin. The session
    /// start stamp is kept.
    pub fn reset(&mut self) {
        self.origin = Instant::now();
        self.temperature.clear();
        self.red_absorbance.clear();
        self.green_absorbance.clear();
        self.optical_density.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.temperature.is_empty() && self.optical_density.is_empty()
    }

    pub fn latest(&self) -> LatestReadings {
        LatestReadings {
            temperature_c: self.temperature.last().map_or(0.0, |p| p.value),
            red_absorbance: self.red_absorbance.last().map_or(0.0, |p| p.value),
            green_absorbance: self.green_absorbance.last().map_or(0.0, |p| p.value),
        }
    }

    pub fn temperature(&self) -> &TimeSeries<f64> {
        &self.temperature
    }

    pub fn red_absorbance(&self) -> &TimeSeries<f64> {
        &self.red_absorbance
    }

    pub fn green_absorbance(&self) -> &TimeSeries<f64> {
        &self.green_absorbance
    }

    pub fn optical_density(&self) -> &TimeSeries<OdSample> {
        &self.optical_density
    }

    /// Red / green absorbance per OD sample (the culture "colour").
    /// Samples with zero green absorbance are skipped.
    pub fn color_ratio(&self) -> TimeSeries<f64> {
        let mut ratio = TimeSeries::new();
        for point in self.optical_density.iter().filter(|p| p.value.green != 0.0) {
            ratio.push(point.elapsed_s, point.value.red / point.value.green);
        }
        ratio
    }

    pub fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot {
            session_label: self.session_label(),
            elapsed_s: self.elapsed_seconds(),
            temperature: self.temperature.clone(),
            red_absorbance: self.red_absorbance.clone(),
            green_absorbance: self.green_absorbance.clone(),
            optical_density: self.optical_density.clone(),
        }
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn synthetic_time_axis(count: usize, now_s: f64) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![now_s],
        _ => (0..count)
            .map(|i| now_s * i as f64 / (count - 1) as f64)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_defaults_to_zero() {
        let store = HistoryStore::new();
        assert_eq!(store.latest(), LatestReadings::default());
        assert!(store.is_empty());
    }

    #[test]
    fn test_appends_update_latest() {
        let mut store = HistoryStore::new();
        store.append_temperature(36.5);
        store.append_optical_density(0.45, 0.62);
        store.append_temperature(37.0);

        let latest = store.latest();
        assert_eq!(latest.temperature_c, 37.0);
        assert_eq!(latest.red_absorbance, 0.45);
        assert_eq!(latest.green_absorbance, 0.62);
        assert_eq!(store.temperature().len(), 2);
        assert_eq!(store.optical_density().len(), 1);
        assert!(store.temperature().points()[0].elapsed_s >= 0.0);
    }

    #[test]
    fn test_reset_clears_and_restarts_origin() {
        let mut store = HistoryStore::new();
        store.append_temperature(30.0);
        store.append_optical_density(0.1, 0.2);
        let first_origin = store.origin();

        store.reset();
        let second_origin = store.origin();
        assert!(store.is_empty());
        assert!(store.red_absorbance().is_empty());
        assert!(store.green_absorbance().is_empty());

        store.reset();
        assert!(store.is_empty());
        assert!(second_origin >= first_origin);
        assert!(store.origin() >= second_origin);
    }

    #[test]
    fn test_bulk_keeps_times_when_lengths_match() {
        let mut store = HistoryStore::new();
        store.append_optical_density_at(1.0, 0.1, 0.2);
        store.append_optical_density_at(2.0, 0.3, 0.4);

        assert!(store.replace_optical_density_bulk(&[0.5, 0.6], &[0.7, 0.8]));
        assert_eq!(store.optical_density().times(), vec![1.0, 2.0]);
        assert_eq!(store.red_absorbance().values(), vec![0.5, 0.6]);
        assert_eq!(store.green_absorbance().values(), vec![0.7, 0.8]);
        assert_eq!(store.latest().red_absorbance, 0.6);
    }

    #[test]
    fn test_bulk_spreads_times_when_lengths_differ() {
        let mut store = HistoryStore::new();
        store.append_optical_density_at(1.0, 0.1, 0.2);

        assert!(store.replace_optical_density_bulk(&[0.1, 0.2, 0.3], &[0.4, 0.5, 0.6]));
        let times = store.optical_density().times();
        assert_eq!(times.len(), 3);
        assert_eq!(times[0], 0.0);
        assert!(times[0] <= times[1] && times[1] <= times[2]);
        assert_eq!(store.red_absorbance().times(), times);
    }

    #[test]
    fn test_bulk_rejects_unpaired_input() {
        let mut store = HistoryStore::new();
        store.append_optical_density_at(1.0, 0.1, 0.2);
        let before = store.snapshot();

        assert!(!store.replace_optical_density_bulk(&[0.1, 0.2], &[0.3]));
        assert!(!store.replace_optical_density_bulk(&[], &[]));
        assert_eq!(store.optical_density(), &before.optical_density);
    }

    #[test]
    fn test_color_ratio() {
        let mut store = HistoryStore::new();
        store.append_optical_density_at(0.0, 0.5, 0.25);
        store.append_optical_density_at(1.0, 0.5, 0.0);
        let ratio = store.color_ratio();
        assert_eq!(ratio.values(), vec![2.0]);
    }

    #[test]
    fn test_synthetic_axis() {
        assert!(synthetic_time_axis(0, 5.0).is_empty());
        assert_eq!(synthetic_time_axis(1, 5.0), vec![5.0]);
        assert_eq!(synthetic_time_axis(3, 4.0), vec![0.0, 2.0, 4.0]);
    }

    #[test]
    fn test_session_label_format() {
        let store = HistoryStore::new();
        let label = store.session_label();
        assert!(label.ends_with('Z'));
        assert_eq!(label.len(), "2024-01-31-1200Z".len());
    }

    #[test]
    fn test_reset_keeps_session_start() {
        let mut store = HistoryStore::new();
        let started_at = store.started_at();
        let label = store.session_label();

        std::thread::sleep(std::time::Duration::from_millis(5));
        store.reset();
        store.reset();

        assert_eq!(store.started_at(), started_at);
        assert_eq!(store.session_label(), label);
    }
}
