//! Matrix definition file.
//!
//! The whole run is described by one TOML file, loaded and validated before
//! anything executes and read-only afterwards:
//!
//! ```toml
//! rounds = 3
//! baseline = "hybrid-bounds"
//! output_dir = "tmp"
//! zero_baseline = "skip"
//!
//! [paths]
//! rust_path = "../rust"
//!
//! [[targets]]
//! name = "aarch64-unknown-freebsd"
//! linker = "clang-freebsd.sh"
//!
//! [[configurations]]
//! name = "hybrid-bounds"
//! target = "aarch64-unknown-freebsd"
//!
//! [[suites]]
//! directory = "itoa-1.0.3"
//! repo = "https://github.com/dtolnay/itoa"
//! branch = "1.0.3"
//! ```
//!
//! Relative `rust_path`, `benchmark_path`, `count_path` and `output_dir` are
//! resolved against the directory holding the file; `patch_dir` and `runner`
//! against the benchmark root; target linkers against `rust_path`.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{MatrixError, MatrixResult};
use crate::suite::{Configuration, Subprojects, Suite};

/// Default number of rounds per (suite, configuration).
pub const DEFAULT_ROUNDS: usize = 3;

/// Characters that may not appear in names written to either output file.
pub const FORBIDDEN_NAME_CHARS: &[char] = &[' ', ','];

/// What to do when a benchmark's baseline mean is zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroBaselinePolicy {
    /// Leave the benchmark out of the relative report and warn.
    #[default]
    Skip,
    /// Stop with an error.
    Abort,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    /// Root of the Rust compiler checkout.
    pub rust_path: PathBuf,
    /// Directory holding the suites; defaults to the config file's directory.
    #[serde(default)]
    pub benchmark_path: Option<PathBuf>,
    #[serde(default = "default_patch_dir")]
    pub patch_dir: PathBuf,
    /// Runner wrapper passed the remote test client.
    #[serde(default = "default_runner")]
    pub runner: PathBuf,
    /// `cargo-count` binary, only needed for `--line-count`.
    #[serde(default)]
    pub count_path: Option<PathBuf>,
}

/// Per-target entries for the generated Cargo config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    pub name: String,
    pub linker: PathBuf,
    /// Run binaries through `<runner> <remote-test-client>`.
    #[serde(default = "default_true")]
    pub use_runner: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatrixConfig {
    #[serde(default = "default_rounds")]
    pub rounds: usize,
    /// Name of the configuration every other one is compared against.
    pub baseline: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub zero_baseline: ZeroBaselinePolicy,
    pub paths: PathsConfig,
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
    /// Matrix column order.
    pub configurations: Vec<Configuration>,
    /// Matrix row order.
    pub suites: Vec<Suite>,
}

fn default_rounds() -> usize {
    DEFAULT_ROUNDS
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("tmp")
}

fn default_patch_dir() -> PathBuf {
    PathBuf::from("patches")
}

fn default_runner() -> PathBuf {
    PathBuf::from("runner.sh")
}

const fn default_true() -> bool {
    true
}

impl MatrixConfig {
    /// Read, resolve and validate the definition at `path`.
    pub fn load(path: &Path) -> MatrixResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| MatrixError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let config = Self::from_toml_str(&text, base_dir)?;
        tracing::debug!(
            path = %path.display(),
            configurations = config.configurations.len(),
            suites = config.suites.len(),
            rounds = config.rounds,
            "loaded matrix definition"
        );
        Ok(config)
    }

    /// Parse `text`, resolve relative paths against `base_dir`, validate.
    pub fn from_toml_str(text: &str, base_dir: &Path) -> MatrixResult<Self> {
        let mut config: Self = toml::from_str(text).map_err(|e| MatrixError::ConfigParse {
            detail: e.to_string(),
        })?;
        config.resolve_paths(base_dir);
        config.validate()?;
        Ok(config)
    }

    fn resolve_paths(&mut self, base_dir: &Path) {
        let paths = &mut self.paths;
        paths.rust_path = base_dir.join(&paths.rust_path);
        let benchmark_path = paths
            .benchmark_path
            .as_ref()
            .map_or_else(|| base_dir.to_path_buf(), |p| base_dir.join(p));
        paths.patch_dir = benchmark_path.join(&paths.patch_dir);
        paths.runner = benchmark_path.join(&paths.runner);
        paths.benchmark_path = Some(benchmark_path);
        paths.count_path = paths.count_path.as_ref().map(|p| base_dir.join(p));
        for target in &mut self.targets {
            target.linker = paths.rust_path.join(&target.linker);
        }
        self.output_dir = base_dir.join(&self.output_dir);
    }

    /// Check everything that can be checked before the run starts.
    pub fn validate(&self) -> MatrixResult<()> {
        if self.rounds == 0 {
            return Err(MatrixError::invalid_config("rounds must be at least 1"));
        }
        if self.configurations.is_empty() {
            return Err(MatrixError::invalid_config("no configurations defined"));
        }
        if self.suites.is_empty() {
            return Err(MatrixError::invalid_config("no suites defined"));
        }

        let mut seen = HashSet::new();
        for configuration in &self.configurations {
            validate_name("configuration", &configuration.name)?;
            if !seen.insert(configuration.name.as_str()) {
                return Err(MatrixError::invalid_config(format!(
                    "duplicate configuration name '{}'",
                    configuration.name
                )));
            }
        }
        if !seen.contains(self.baseline.as_str()) {
            return Err(MatrixError::UnknownBaseline {
                name: self.baseline.clone(),
            });
        }

        let mut dirs = HashSet::new();
        for suite in &self.suites {
            if suite.directory.is_empty() {
                return Err(MatrixError::invalid_config("suite with empty directory"));
            }
            if !dirs.insert(suite.directory.as_str()) {
                return Err(MatrixError::invalid_config(format!(
                    "duplicate suite directory '{}'",
                    suite.directory
                )));
            }
            if matches!(&suite.subprojects, Subprojects::Named(names) if names.is_empty()) {
                return Err(MatrixError::invalid_config(format!(
                    "suite '{}' lists no subprojects; omit the key to use the suite root",
                    suite.directory
                )));
            }
        }
        Ok(())
    }

    /// Baseline-relative output needs a baseline and at least one other
    /// configuration.
    pub fn require_comparable(&self) -> MatrixResult<()> {
        if self.configurations.len() < 2 {
            return Err(MatrixError::TooFewConfigurations {
                count: self.configurations.len(),
            });
        }
        Ok(())
    }

    /// Resolved benchmark root.
    #[must_use]
    pub fn benchmark_path(&self) -> &Path {
        self.paths
            .benchmark_path
            .as_deref()
            .unwrap_or_else(|| Path::new("."))
    }

    /// The baseline configuration.  Exists after [`Self::validate`].
    #[must_use]
    pub fn baseline_configuration(&self) -> Option<&Configuration> {
        self.configurations.iter().find(|c| c.name == self.baseline)
    }

    /// SHA-256 hex digest of the canonical JSON form of this definition.
    pub fn fingerprint(&self) -> MatrixResult<String> {
        let bytes =
            serde_json::to_vec(self).map_err(|e| MatrixError::Serialize(e.to_string()))?;
        let digest = Sha256::digest(&bytes);
        let mut hex = String::with_capacity(64);
        for byte in digest {
            let _ = write!(hex, "{byte:02x}");
        }
        Ok(hex)
    }
}

/// Reject names that would break the comma- or space-separated outputs.
pub fn validate_name(kind: &'static str, name: &str) -> MatrixResult<()> {
    if let Some(separator) = name.chars().find(|c| FORBIDDEN_NAME_CHARS.contains(c)) {
        return Err(MatrixError::InvalidName {
            kind,
            name: name.to_owned(),
            separator,
        });
    }
    Ok(())
}
