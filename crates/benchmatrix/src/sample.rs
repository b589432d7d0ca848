//! Per-round measurements.
//!
//! A [`Sample`] is one `ns/iter (+/- n)` observation from a single bench
//! round.  A [`RoundSeries`] holds the samples for one (benchmark,
//! configuration) pair in round order.

use serde::{Deserialize, Serialize};

/// One measured round: time and its symmetric ± band, both in nanoseconds.
///
/// The band comes straight from the bench harness; it is not a confidence
/// interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub time_ns: u64,
    pub uncertainty_ns: u64,
}

impl Sample {
    #[must_use]
    pub const fn new(time_ns: u64, uncertainty_ns: u64) -> Self {
        Self {
            time_ns,
            uncertainty_ns,
        }
    }

    /// Lower edge of the band.  May be negative when the band is wider than
    /// the time itself.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn low(&self) -> f64 {
        self.time_ns as f64 - self.uncertainty_ns as f64
    }

    /// Upper edge of the band.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn high(&self) -> f64 {
        self.time_ns as f64 + self.uncertainty_ns as f64
    }
}

/// Samples for one (benchmark, configuration) pair, indexed by round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoundSeries {
    samples: Vec<Sample>,
}

impl RoundSeries {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            samples: Vec::new(),
        }
    }

    /// Number of rounds recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Sample] {
        &self.samples
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }

    /// Append the next round.  Sequencing is enforced by the store.
    pub(crate) fn push(&mut self, sample: Sample) {
        self.samples.push(sample);
    }
}

impl From<Vec<Sample>> for RoundSeries {
    fn from(samples: Vec<Sample>) -> Self {
        Self { samples }
    }
}

impl<'a> IntoIterator for &'a RoundSeries {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_edges() {
        let s = Sample::new(100, 5);
        assert!((s.low() - 95.0).abs() < f64::EPSILON);
        assert!((s.high() - 105.0).abs() < f64::EPSILON);
    }

    #[test]
    fn band_may_extend_below_zero() {
        let s = Sample::new(3, 10);
        assert!((s.low() + 7.0).abs() < f64::EPSILON);
    }

    #[test]
    fn series_serializes_as_plain_list() {
        let series = RoundSeries::from(vec![Sample::new(1, 2), Sample::new(3, 4)]);
        let json = serde_json::to_string(&series).unwrap();
        assert_eq!(
            json,
            r#"[{"time_ns":1,"uncertainty_ns":2},{"time_ns":3,"uncertainty_ns":4}]"#
        );
    }
}
