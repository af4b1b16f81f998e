use serde::{Deserialize, Serialize};

/// A single time-stamped sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplePoint<T> {
    /// Seconds since the history origin
    pub elapsed_s: f64,
    pub value: T,
}

/// Append-only series ordered by elapsed time.
///
/// Elapsed times never decrease: a sample stamped earlier than the previous
/// one is recorded at the previous sample's time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries<T> {
    points: Vec<SamplePoint<T>>,
}

impl<T> TimeSeries<T> {
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    pub fn push(&mut self, elapsed_s: f64, value: T) {
        let elapsed_s = match self.points.last() {
            Some(last) if elapsed_s < last.elapsed_s => last.elapsed_s,
            _ => elapsed_s.max(0.0),
        };
        self.points.push(SamplePoint { elapsed_s, value });
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn last(&self) -> Option<&SamplePoint<T>> {
        self.points.last()
    }

    pub fn points(&self) -> &[SamplePoint<T>] {
        &self.points
    }

    pub fn times(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.elapsed_s).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SamplePoint<T>> {
        self.points.iter()
    }
}

impl<T: Clone> TimeSeries<T> {
    pub fn values(&self) -> Vec<T> {
        self.points.iter().map(|p| p.value.clone()).collect()
    }

    /// Replace the contents with `values` on the given time axis.
    /// Extra times or values beyond the shorter of the two are ignored.
    pub fn replace(&mut self, times: &[f64], values: &[T]) {
        self.points.clear();
        for (elapsed_s, value) in times.iter().zip(values) {
            self.push(*elapsed_s, value.clone());
        }
    }
}

impl<T> Default for TimeSeries<T> {
    fn default() -> Self {
        Self::new()
    }
}
