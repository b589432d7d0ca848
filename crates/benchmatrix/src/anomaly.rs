//! Non-fatal conditions observed while running the matrix.
//!
//! Anomalies are logged the moment they are detected and collected for the
//! results dump.  They never unwind the matrix.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anomaly {
    /// A bench invocation produced no result lines at all.
    EmptyResult {
        suite: String,
        configuration: String,
        round: usize,
    },
    /// A result arrived for a round other than the next expected one
    /// (usually the same benchmark name printed twice in one run).
    OutOfOrderRound {
        benchmark: String,
        configuration: String,
        expected: usize,
        got: usize,
    },
    /// A series already holds every configured round.
    RoundOverflow {
        benchmark: String,
        configuration: String,
        rounds: usize,
    },
    /// A series ended up with fewer rounds than configured and is reported
    /// as missing.
    PartialSeries {
        benchmark: String,
        configuration: String,
        expected: usize,
        actual: usize,
    },
}

impl Anomaly {
    /// Emit this anomaly as a structured warning.
    pub fn log(&self) {
        match self {
            Self::EmptyResult {
                suite,
                configuration,
                round,
            } => tracing::warn!(suite, configuration, round, "benchmark suite generated no results"),
            Self::OutOfOrderRound {
                benchmark,
                configuration,
                expected,
                got,
            } => tracing::warn!(
                benchmark,
                configuration,
                expected,
                got,
                "unexpected extra run of benchmark"
            ),
            Self::RoundOverflow {
                benchmark,
                configuration,
                rounds,
            } => tracing::warn!(benchmark, configuration, rounds, "benchmark already has all rounds"),
            Self::PartialSeries {
                benchmark,
                configuration,
                expected,
                actual,
            } => tracing::warn!(
                benchmark,
                configuration,
                expected,
                actual,
                "incomplete round series treated as missing"
            ),
        }
    }
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyResult {
                suite,
                configuration,
                round,
            } => write!(
                f,
                "suite {suite} generated no results under {configuration} (round {round})"
            ),
            Self::OutOfOrderRound {
                benchmark,
                configuration,
                expected,
                got,
            } => write!(
                f,
                "{benchmark} under {configuration}: got round {got}, expected {expected}"
            ),
            Self::RoundOverflow {
                benchmark,
                configuration,
                rounds,
            } => write!(
                f,
                "{benchmark} under {configuration} already has {rounds} rounds"
            ),
            Self::PartialSeries {
                benchmark,
                configuration,
                expected,
                actual,
            } => write!(
                f,
                "{benchmark} under {configuration} has {actual} of {expected} rounds"
            ),
        }
    }
}
