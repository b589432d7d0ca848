//! Baseline-relative speedup ratios with worst-case bounds.
//!
//! Dividing interval endpoints directly (`min/min`, `max/max`) does not bound
//! a ratio.  Instead every candidate corner `b / a`, with `a` drawn from the
//! baseline's `{min, mean, max}` and `b` from the other configuration's
//! `{min, mean, max}`, is evaluated and the extremes taken.  A corner whose
//! denominator is zero counts as ratio `0` instead of failing the whole
//! comparison.

use serde::{Deserialize, Serialize};

use crate::aggregate::AggregateStat;
use crate::error::{MatrixError, MatrixResult};

/// `other.mean / baseline.mean` and its worst-case envelope.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ratio {
    pub ratio: f64,
    pub low: f64,
    pub high: f64,
}

impl Ratio {
    /// `ratio - low`.
    #[must_use]
    pub fn error_negative(&self) -> f64 {
        self.ratio - self.low
    }

    /// `high - ratio`.
    #[must_use]
    pub fn error_positive(&self) -> f64 {
        self.high - self.ratio
    }
}

/// Compare `other` against `baseline`.
///
/// `benchmark` is only used to label the error when the baseline mean is
/// zero.
#[allow(clippy::float_cmp)]
pub fn compare(
    benchmark: &str,
    baseline: &AggregateStat,
    other: &AggregateStat,
) -> MatrixResult<Ratio> {
    if baseline.mean == 0.0 {
        return Err(MatrixError::ZeroBaselineMean {
            benchmark: benchmark.to_owned(),
        });
    }
    let ratio = other.mean / baseline.mean;

    let mut low = f64::INFINITY;
    let mut high = f64::NEG_INFINITY;
    for a in [baseline.min, baseline.mean, baseline.max] {
        for b in [other.min, other.mean, other.max] {
            let corner = if a == 0.0 { 0.0 } else { b / a };
            low = low.min(corner);
            high = high.max(corner);
        }
    }

    if !(low <= ratio && ratio <= high) {
        return Err(MatrixError::invariant(format!(
            "ratio envelope does not contain ratio for {benchmark}: \
             low={low} ratio={ratio} high={high}"
        )));
    }

    Ok(Ratio { ratio, low, high })
}
