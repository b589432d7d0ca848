//! Reduce a full [`RoundSeries`] to mean and a worst-case envelope.
//!
//! `min`/`max` are the extremes of `time - uncertainty` and
//! `time + uncertainty` over every round, not the spread of the times
//! alone.  The envelope therefore always contains the mean.

use serde::{Deserialize, Serialize};

use crate::error::{MatrixError, MatrixResult};
use crate::sample::RoundSeries;

/// Mean and envelope of one series, in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregateStat {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

impl AggregateStat {
    /// `mean - min`.
    #[must_use]
    pub fn error_negative(&self) -> f64 {
        self.mean - self.min
    }

    /// `max - mean`.
    #[must_use]
    pub fn error_positive(&self) -> f64 {
        self.max - self.mean
    }
}

/// Aggregate a series holding exactly `rounds` samples.
///
/// Partial series must be reported as missing by the caller; handing one in
/// here is an error.  A violated `min <= mean <= max` is reported as an
/// internal invariant failure rather than returned as data.
#[allow(clippy::cast_precision_loss)]
pub fn aggregate(series: &RoundSeries, rounds: usize) -> MatrixResult<AggregateStat> {
    if series.is_empty() || series.len() != rounds {
        return Err(MatrixError::IncompleteSeries {
            expected: rounds,
            actual: series.len(),
        });
    }

    let mut sum = 0.0_f64;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for sample in series {
        sum += sample.time_ns as f64;
        min = min.min(sample.low());
        max = max.max(sample.high());
    }
    let mean = sum / series.len() as f64;

    if !(min <= mean && mean <= max) {
        return Err(MatrixError::invariant(format!(
            "aggregate envelope does not contain mean: min={min} mean={mean} max={max}"
        )));
    }

    Ok(AggregateStat { mean, min, max })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::sample::Sample;

    fn series(samples: &[(u64, u64)]) -> RoundSeries {
        RoundSeries::from(
            samples
                .iter()
                .map(|&(t, u)| Sample::new(t, u))
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn three_rounds() {
        let stat = aggregate(&series(&[(100, 5), (110, 5), (90, 5)]), 3).unwrap();
        assert!((stat.mean - 100.0).abs() < f64::EPSILON);
        assert!((stat.min - 85.0).abs() < f64::EPSILON);
        assert!((stat.max - 115.0).abs() < f64::EPSILON);
        assert!((stat.error_negative() - 15.0).abs() < f64::EPSILON);
        assert!((stat.error_positive() - 15.0).abs() < f64::EPSILON);
    }

    #[test]
    fn envelope_uses_band_extremes_not_times() {
        // Widest band on the middle sample dominates both edges.
        let stat = aggregate(&series(&[(100, 1), (100, 50), (100, 1)]), 3).unwrap();
        assert!((stat.min - 50.0).abs() < f64::EPSILON);
        assert!((stat.max - 150.0).abs() < f64::EPSILON);
    }

    #[test]
    fn envelope_may_go_negative() {
        let stat = aggregate(&series(&[(2, 10)]), 1).unwrap();
        assert!((stat.min + 8.0).abs() < f64::EPSILON);
    }

    #[test]
    fn short_series_is_rejected() {
        let err = aggregate(&series(&[(1, 0), (2, 0)]), 3).unwrap_err();
        assert!(matches!(
            err,
            MatrixError::IncompleteSeries {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn empty_series_is_rejected() {
        assert!(aggregate(&RoundSeries::new(), 0).is_err());
    }

    proptest! {
        #[test]
        fn prop_mean_within_envelope(
            raw in prop::collection::vec((0_u64..1_000_000_000, 0_u64..1_000_000), 1..16)
        ) {
            let s = series(&raw);
            let stat = aggregate(&s, raw.len()).unwrap();
            prop_assert!(stat.min <= stat.mean);
            prop_assert!(stat.mean <= stat.max);
            prop_assert!(stat.error_negative() >= 0.0);
            prop_assert!(stat.error_positive() >= 0.0);
        }

        #[test]
        fn prop_wrong_length_is_rejected(
            raw in prop::collection::vec((0_u64..1000, 0_u64..10), 1..8),
            extra in 1_usize..4,
        ) {
            let s = series(&raw);
            prop_assert!(aggregate(&s, raw.len() + extra).is_err());
        }
    }
}
