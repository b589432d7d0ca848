//! Reproducibility metadata and the machine-readable results dump.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::anomaly::Anomaly;
use crate::config::MatrixConfig;
use crate::error::{MatrixError, MatrixResult};
use crate::store::ResultStore;

pub const RESULTS_SCHEMA_VERSION: &str = "benchmatrix.results.v1";

/// File name of the results dump inside the output directory.
pub const RESULTS_FILE_NAME: &str = "benchmark_results.json";

/// Host the matrix ran on.  Best effort: anything undetectable is `None`
/// or `"unknown"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentMeta {
    /// OS name, with the kernel version on Linux (e.g. "Linux 6.8.0").
    pub os: String,
    pub arch: String,
    pub cpu_count: usize,
    pub cpu_model: Option<String>,
    /// `rustc --version` of the benchmarked compiler.
    pub rustc_version: String,
}

impl EnvironmentMeta {
    /// Capture the host, asking `rustc` for its version.
    #[must_use]
    pub fn capture(rustc: &Path) -> Self {
        Self {
            os: detect_os(),
            arch: std::env::consts::ARCH.to_owned(),
            cpu_count: std::thread::available_parallelism().map_or(1, std::num::NonZero::get),
            cpu_model: detect_cpu_model(),
            rustc_version: detect_rustc_version(rustc),
        }
    }
}

fn detect_os() -> String {
    #[cfg(target_os = "linux")]
    {
        if let Ok(version) = std::fs::read_to_string("/proc/version") {
            let parts: Vec<&str> = version.split_whitespace().take(3).collect();
            if parts.len() == 3 {
                return format!("{} {}", parts[0], parts[2]);
            }
        }
    }
    std::env::consts::OS.to_owned()
}

fn detect_cpu_model() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        if let Ok(cpuinfo) = std::fs::read_to_string("/proc/cpuinfo") {
            return cpuinfo
                .lines()
                .filter(|line| line.starts_with("model name"))
                .find_map(|line| line.split_once(':'))
                .map(|(_, model)| model.trim().to_owned());
        }
    }
    None
}

fn detect_rustc_version(rustc: &Path) -> String {
    std::process::Command::new(rustc)
        .arg("--version")
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map_or_else(|| "unknown".to_owned(), |s| s.trim().to_owned())
}

/// What was run, by which tool, where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMeta {
    pub schema_version: String,
    pub tool_version: String,
    pub rounds: usize,
    pub baseline: String,
    /// Configuration names in matrix column order.
    pub configurations: Vec<String>,
    /// SHA-256 of the matrix definition, see [`MatrixConfig::fingerprint`].
    pub matrix_fingerprint: String,
    pub environment: EnvironmentMeta,
}

impl RunMeta {
    pub fn new(config: &MatrixConfig, environment: EnvironmentMeta) -> MatrixResult<Self> {
        Ok(Self {
            schema_version: RESULTS_SCHEMA_VERSION.to_owned(),
            tool_version: env!("CARGO_PKG_VERSION").to_owned(),
            rounds: config.rounds,
            baseline: config.baseline.clone(),
            configurations: config
                .configurations
                .iter()
                .map(|c| c.name.clone())
                .collect(),
            matrix_fingerprint: config.fingerprint()?,
            environment,
        })
    }
}

/// Everything a bench run produced, for debugging after the fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsDump {
    pub meta: RunMeta,
    pub anomalies: Vec<Anomaly>,
    pub results: ResultStore,
}

impl ResultsDump {
    pub fn to_pretty_json(&self) -> MatrixResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| MatrixError::Serialize(e.to_string()))
    }

    pub fn from_json(text: &str) -> MatrixResult<Self> {
        let mut dump: Self =
            serde_json::from_str(text).map_err(|e| MatrixError::Serialize(e.to_string()))?;
        dump.results = dump.results.reindexed();
        Ok(dump)
    }

    /// Write to `<output_dir>/benchmark_results.json`, creating the
    /// directory if needed.
    pub fn write(&self, output_dir: &Path) -> MatrixResult<PathBuf> {
        std::fs::create_dir_all(output_dir).map_err(|source| MatrixError::WriteFailed {
            path: output_dir.to_path_buf(),
            source,
        })?;
        let path = output_dir.join(RESULTS_FILE_NAME);
        std::fs::write(&path, self.to_pretty_json()?).map_err(|source| {
            MatrixError::WriteFailed {
                path: path.clone(),
                source,
            }
        })?;
        Ok(path)
    }
}
