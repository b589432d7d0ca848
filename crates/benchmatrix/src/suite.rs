//! Benchmark suites and compiler configurations.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A compiler configuration: one column group of the matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Configuration {
    /// Short unique name, used in both output files.
    pub name: String,
    /// Target triple passed to `cargo --target`.
    pub target: String,
    /// Extra `rustc` flags, used both for the toolchain build and for Cargo.
    #[serde(default)]
    pub rust_flags: String,
}

impl Configuration {
    #[must_use]
    pub fn new(name: &str, target: &str, rust_flags: &str) -> Self {
        Self {
            name: name.to_owned(),
            target: target.to_owned(),
            rust_flags: rust_flags.to_owned(),
        }
    }
}

/// Subprojects to benchmark inside a suite's directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<Vec<String>>", into = "Option<Vec<String>>")]
pub enum Subprojects {
    /// Benchmark the suite directory itself.
    #[default]
    Root,
    /// Benchmark each named subdirectory, in order.
    Named(Vec<String>),
}

impl Subprojects {
    /// Subproject names in declaration order; `None` stands for the root.
    #[must_use]
    pub fn entries(&self) -> Vec<Option<&str>> {
        match self {
            Self::Root => vec![None],
            Self::Named(names) => names.iter().map(|n| Some(n.as_str())).collect(),
        }
    }

    #[must_use]
    pub const fn is_root(&self) -> bool {
        matches!(self, Self::Root)
    }
}

impl From<Option<Vec<String>>> for Subprojects {
    fn from(value: Option<Vec<String>>) -> Self {
        value.map_or(Self::Root, Self::Named)
    }
}

impl From<Subprojects> for Option<Vec<String>> {
    fn from(value: Subprojects) -> Self {
        match value {
            Subprojects::Root => None,
            Subprojects::Named(names) => Some(names),
        }
    }
}

/// A benchmark suite: a Cargo project (optionally cloned and patched) whose
/// `cargo bench` output is parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Suite {
    /// Directory under the benchmark root to clone into or use.
    pub directory: String,
    /// Git repository to clone; `None` uses an existing directory.
    #[serde(default)]
    pub repo: Option<String>,
    /// Branch or tag to check out when cloning.
    #[serde(default)]
    pub branch: Option<String>,
    /// Patch file (relative to the patch directory) applied after cloning.
    #[serde(default)]
    pub patch: Option<String>,
    #[serde(default)]
    pub subprojects: Subprojects,
    /// Extra flags for `cargo bench` only.
    #[serde(default)]
    pub extra_bench_flags: Vec<String>,
}

impl Suite {
    /// A local suite with no repository and no subprojects.
    #[must_use]
    pub fn local(directory: &str) -> Self {
        Self {
            directory: directory.to_owned(),
            repo: None,
            branch: None,
            patch: None,
            subprojects: Subprojects::Root,
            extra_bench_flags: Vec::new(),
        }
    }

    /// Directory Cargo runs in for `subproject`.
    #[must_use]
    pub fn working_dir(&self, benchmark_path: &Path, subproject: Option<&str>) -> PathBuf {
        let dir = benchmark_path.join(&self.directory);
        match subproject {
            Some(sub) => dir.join(sub),
            None => dir,
        }
    }

    /// Raw output of the latest bench round under `configuration`.
    #[must_use]
    pub fn log_path(&self, benchmark_path: &Path, configuration: &Configuration) -> PathBuf {
        benchmark_path
            .join(&self.directory)
            .join(format!("{}-output.log", configuration.name))
    }
}

/// Namespace prefix for benchmarks of one (suite, subproject):
/// `"<directory>"` or `"<directory>/<subproject>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SuiteIdentity(String);

impl SuiteIdentity {
    #[must_use]
    pub fn new(directory: &str, subproject: Option<&str>) -> Self {
        match subproject {
            Some(sub) => Self(format!("{directory}/{sub}")),
            None => Self(directory.to_owned()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Fully qualified benchmark name.  An empty identity leaves `bench`
    /// bare.
    #[must_use]
    pub fn benchmark_name(&self, bench: &str) -> String {
        if self.0.is_empty() {
            bench.to_owned()
        } else {
            format!("{}/{bench}", self.0)
        }
    }
}

impl From<&str> for SuiteIdentity {
    fn from(prefix: &str) -> Self {
        Self(prefix.to_owned())
    }
}

impl std::fmt::Display for SuiteIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
