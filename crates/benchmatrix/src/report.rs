//! Rendering the completed [`ResultStore`].
//!
//! Two independent passes:
//!
//! - the tabular file (`benchmark_data.csv`, comma separated): raw rounds
//!   plus mean and error per configuration, `-` wherever data is missing;
//! - the baseline-relative file (`benchmark_data.dat`, space separated,
//!   pgfplots table): speedup ratio and error per non-baseline
//!   configuration, for benchmarks with complete data only.
//!
//! A series shorter than the round count is missing data, never a partial
//! aggregate.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::aggregate::{AggregateStat, aggregate};
use crate::anomaly::Anomaly;
use crate::compare::compare;
use crate::config::{MatrixConfig, ZeroBaselinePolicy};
use crate::error::{MatrixError, MatrixResult};
use crate::sample::RoundSeries;
use crate::store::ResultStore;
use crate::suite::Configuration;

pub const TABULAR_FILE_NAME: &str = "benchmark_data.csv";
pub const RELATIVE_FILE_NAME: &str = "benchmark_data.dat";
pub const LINE_COUNT_FILE_NAME: &str = "line_count.csv";

/// Rendered in every field of a cell without complete data.
pub const MISSING: &str = "-";

/// Complete series for a cell, `None` when absent or partial.
fn complete<'s>(
    store: &'s ResultStore,
    benchmark: &str,
    configuration: &str,
) -> Option<&'s RoundSeries> {
    store
        .get(benchmark, configuration)
        .filter(|series| series.len() == store.rounds())
}

fn reject_separator(kind: &'static str, name: &str, separator: char) -> MatrixResult<()> {
    if name.contains(separator) {
        return Err(MatrixError::InvalidName {
            kind,
            name: name.to_owned(),
            separator,
        });
    }
    Ok(())
}

/// Series that exist but hold fewer rounds than configured.
#[must_use]
pub fn partial_series(store: &ResultStore, configurations: &[Configuration]) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();
    for benchmark in store.benchmarks() {
        for configuration in configurations {
            if let Some(series) = store.get(benchmark, &configuration.name) {
                if series.len() != store.rounds() {
                    anomalies.push(Anomaly::PartialSeries {
                        benchmark: benchmark.to_owned(),
                        configuration: configuration.name.clone(),
                        expected: store.rounds(),
                        actual: series.len(),
                    });
                }
            }
        }
    }
    anomalies
}

/// Render the comma-separated tabular file.
pub fn render_tabular(store: &ResultStore, configurations: &[Configuration]) -> MatrixResult<String> {
    let rounds = store.rounds();
    if rounds == 0 {
        return Err(MatrixError::invariant("tabular render needs at least one round"));
    }

    let mut top = String::from("benchmark");
    let mut bottom = String::from(" ");
    for configuration in configurations {
        reject_separator("configuration", &configuration.name, ',')?;
        let _ = write!(top, ", {}, ", configuration.name);
        for _ in 1..rounds {
            top.push_str(", , ");
        }
        top.push_str(", , , ");
        for _ in 0..rounds {
            bottom.push_str(", time/ns, +-/ns");
        }
        bottom.push_str(", mean/ns, -/ns, +/ns");
    }

    let mut out = String::new();
    let _ = writeln!(out, "{top}");
    let _ = writeln!(out, "{bottom}");

    for benchmark in store.benchmarks() {
        reject_separator("benchmark", benchmark, ',')?;
        out.push_str(benchmark);
        for configuration in configurations {
            match complete(store, benchmark, &configuration.name) {
                Some(series) => {
                    let stat = aggregate(series, rounds)?;
                    for sample in series {
                        let _ = write!(out, ", {}, {}", sample.time_ns, sample.uncertainty_ns);
                    }
                    let _ = write!(
                        out,
                        ", {}, {}, {}",
                        stat.mean,
                        stat.error_negative(),
                        stat.error_positive()
                    );
                }
                None => {
                    for _ in 0..rounds {
                        let _ = write!(out, ", {MISSING}, {MISSING}");
                    }
                    let _ = write!(out, ", {MISSING}, {MISSING}, {MISSING}");
                }
            }
        }
        out.push('\n');
    }
    Ok(out)
}

/// Render the space-separated baseline-relative file.
///
/// Needs at least two configurations and a `baseline` among them.
pub fn render_relative(
    store: &ResultStore,
    configurations: &[Configuration],
    baseline: &str,
    policy: ZeroBaselinePolicy,
) -> MatrixResult<String> {
    if configurations.len() < 2 {
        return Err(MatrixError::TooFewConfigurations {
            count: configurations.len(),
        });
    }
    if !configurations.iter().any(|c| c.name == baseline) {
        return Err(MatrixError::UnknownBaseline {
            name: baseline.to_owned(),
        });
    }
    let others: Vec<&Configuration> = configurations
        .iter()
        .filter(|c| c.name != baseline)
        .collect();

    let mut out = String::from(
        "# This is benchmark data formatted for rendering via LaTeX and Pgfplots.\n\
         # If you need the list of symbolic values used, copy this:\n\
         # symbolic y coords={",
    );
    for (i, benchmark) in store.benchmarks().enumerate() {
        reject_separator("benchmark", benchmark, ' ')?;
        if i > 0 {
            out.push(',');
        }
        out.push_str(&escape_latex(benchmark));
    }
    out.push_str("}\n");

    out.push_str("benchmark");
    for configuration in &others {
        reject_separator("configuration", &configuration.name, ' ')?;
        let m = &configuration.name;
        let _ = write!(out, " {m}-mean {m}-error-negative {m}-error-positive");
    }
    out.push('\n');

    'benchmarks: for benchmark in store.benchmarks() {
        let Some(base) = stat_for(store, benchmark, baseline)? else {
            continue;
        };
        let mut row = escape_latex(benchmark);
        for configuration in &others {
            let Some(other) = stat_for(store, benchmark, &configuration.name)? else {
                continue 'benchmarks;
            };
            let ratio = match compare(benchmark, &base, &other) {
                Ok(ratio) => ratio,
                Err(MatrixError::ZeroBaselineMean { .. })
                    if policy == ZeroBaselinePolicy::Skip =>
                {
                    tracing::warn!(benchmark, baseline, "baseline mean is zero, benchmark skipped");
                    continue 'benchmarks;
                }
                Err(e) => return Err(e),
            };
            let _ = write!(
                row,
                " {} {} {}",
                ratio.ratio,
                ratio.error_negative(),
                ratio.error_positive()
            );
        }
        out.push_str(&row);
        out.push('\n');
    }
    Ok(out)
}

fn stat_for(
    store: &ResultStore,
    benchmark: &str,
    configuration: &str,
) -> MatrixResult<Option<AggregateStat>> {
    complete(store, benchmark, configuration)
        .map(|series| aggregate(series, store.rounds()))
        .transpose()
}

/// `_` is special in LaTeX.
fn escape_latex(name: &str) -> String {
    name.replace('_', "\\_")
}

/// Files written by [`write_reports`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub tabular: PathBuf,
    pub relative: Option<PathBuf>,
}

fn write_file(path: &Path, contents: &str) -> MatrixResult<()> {
    std::fs::write(path, contents).map_err(|source| MatrixError::WriteFailed {
        path: path.to_path_buf(),
        source,
    })
}

/// Write the tabular file, and with `plot` the relative file, into
/// `output_dir`.  Partial series are logged and returned as anomalies.
pub fn write_reports(
    output_dir: &Path,
    store: &ResultStore,
    config: &MatrixConfig,
    plot: bool,
) -> MatrixResult<(ReportPaths, Vec<Anomaly>)> {
    if plot {
        config.require_comparable()?;
    }
    std::fs::create_dir_all(output_dir).map_err(|source| MatrixError::WriteFailed {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let anomalies = partial_series(store, &config.configurations);
    for anomaly in &anomalies {
        anomaly.log();
    }

    let tabular = output_dir.join(TABULAR_FILE_NAME);
    write_file(&tabular, &render_tabular(store, &config.configurations)?)?;
    tracing::info!(path = %tabular.display(), benchmarks = store.len(), "wrote tabular report");

    let relative = if plot {
        let path = output_dir.join(RELATIVE_FILE_NAME);
        let text = render_relative(
            store,
            &config.configurations,
            &config.baseline,
            config.zero_baseline,
        )?;
        write_file(&path, &text)?;
        tracing::info!(path = %path.display(), "wrote baseline-relative report");
        Some(path)
    } else {
        None
    };

    Ok((ReportPaths { tabular, relative }, anomalies))
}
