//! Source line statistics per suite via `cargo-count`.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{MatrixError, MatrixResult};
use crate::exec::CommandRunner;
use crate::suite::Suite;

/// Totals for one suite.  All zero when counting was not possible.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineCount {
    pub total: u64,
    /// Lines of code, excluding comments, blanks and unsafe.
    pub code: u64,
    pub unsafe_lines: u64,
}

pub const LINE_COUNT_HEADER: &str = "Benchmark, Total lines, Code lines, Unsafe lines";

fn totals_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?m)^Totals:[ \t]+([0-9]+)[ \t]+([0-9]+)[ \t]+([0-9]+)[ \t]+([0-9]+)[ \t]+([0-9]+)[ \t]+([0-9]+)[ \t]+\(.+%\)",
        )
        .expect("totals regex is valid")
    })
}

/// Extract the totals from `cargo count --unsafe-statistics` output.
/// `None` unless exactly one `Totals:` line is present.
#[must_use]
pub fn parse_totals(output: &str) -> Option<LineCount> {
    let mut matches = totals_regex().captures_iter(output);
    let caps = matches.next()?;
    if matches.next().is_some() {
        return None;
    }
    Some(LineCount {
        total: caps[2].parse().ok()?,
        code: caps[5].parse().ok()?,
        unsafe_lines: caps[6].parse().ok()?,
    })
}

/// Count `suite` with the `cargo-count` binary at `count_path`.
///
/// Problems are warnings, never errors: the suite just reports zeros.
pub fn count_suite<R: CommandRunner>(
    runner: &R,
    count_path: &Path,
    benchmark_path: &Path,
    suite: &Suite,
    env: &[(String, String)],
) -> LineCount {
    if !suite.subprojects.is_root() {
        tracing::warn!(suite = %suite.directory, "subprojects not supported for line counting");
        return LineCount::default();
    }

    tracing::info!(suite = %suite.directory, "counting lines");
    let command = vec![
        count_path.display().to_string(),
        "count".to_owned(),
        "--unsafe-statistics".to_owned(),
        "-l".to_owned(),
        "rs".to_owned(),
    ];
    let output = match runner.run(&command, env, &benchmark_path.join(&suite.directory)) {
        Ok(output) if output.success() => output,
        Ok(_) => return LineCount::default(),
        Err(e) => {
            tracing::warn!(suite = %suite.directory, error = %e, "cannot run cargo-count");
            return LineCount::default();
        }
    };
    parse_totals(&output.output).unwrap_or_else(|| {
        tracing::warn!(suite = %suite.directory, "wrong number of line count lines");
        LineCount::default()
    })
}

/// Render `line_count.csv`.  A suite directory containing a comma is fatal.
pub fn render_line_counts(rows: &[(&str, LineCount)]) -> MatrixResult<String> {
    let mut out = String::from(LINE_COUNT_HEADER);
    out.push('\n');
    for (directory, count) in rows {
        if directory.contains(',') {
            return Err(MatrixError::InvalidName {
                kind: "suite",
                name: (*directory).to_owned(),
                separator: ',',
            });
        }
        let _ = writeln!(
            out,
            "{directory}, {}, {}, {}",
            count.total, count.code, count.unsafe_lines
        );
    }
    Ok(out)
}
