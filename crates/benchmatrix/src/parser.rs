//! Extract `ns/iter` results from libtest bench output.
//!
//! A result line looks like
//!
//! ```text
//! test map_regular ... bench:       1,234 ns/iter (+/- 56)
//! ```
//!
//! Numbers may carry thousands separators, which are stripped before
//! conversion.  Every other line is ignored.  Parsing is a pure text
//! transform: the caller obtains the text and decides what an empty result
//! means.

use std::sync::OnceLock;

use regex::{CaptureMatches, Regex};

use crate::sample::Sample;
use crate::suite::SuiteIdentity;

fn result_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^test ([^ ]+) +\.\.\. bench: +([0-9,]+) ns/iter \(\+/- ([0-9,]+)\)")
            .expect("bench result regex is valid")
    })
}

/// One parsed observation, already namespaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResult {
    pub benchmark: String,
    pub sample: Sample,
}

/// Lazy iterator over the result lines of one bench invocation.
///
/// Created by [`parse_bench_output`].  Finite and not restartable; parse the
/// text again to start over.
pub struct BenchResults<'t> {
    matches: CaptureMatches<'static, 't>,
    identity: SuiteIdentity,
}

impl Iterator for BenchResults<'_> {
    type Item = ParsedResult;

    fn next(&mut self) -> Option<Self::Item> {
        for caps in self.matches.by_ref() {
            let name = &caps[1];
            let (Some(time_ns), Some(uncertainty_ns)) =
                (parse_grouped_int(&caps[2]), parse_grouped_int(&caps[3]))
            else {
                tracing::debug!(line = &caps[0], "skipping bench line with unparseable numbers");
                continue;
            };
            return Some(ParsedResult {
                benchmark: self.identity.benchmark_name(name),
                sample: Sample::new(time_ns, uncertainty_ns),
            });
        }
        None
    }
}

/// Parse `text` into `(benchmark, sample)` pairs, prefixing each name with
/// `prefix/` (no prefix when `prefix` is empty).
#[must_use]
pub fn parse_bench_output<'t>(text: &'t str, prefix: &str) -> BenchResults<'t> {
    BenchResults {
        matches: result_line_regex().captures_iter(text),
        identity: SuiteIdentity::from(prefix),
    }
}

/// `"1,234,567"` → `1234567`.  `None` on overflow or an empty digit string.
fn parse_grouped_int(raw: &str) -> Option<u64> {
    let digits: String = raw.chars().filter(|c| *c != ',').collect();
    digits.parse().ok()
}
