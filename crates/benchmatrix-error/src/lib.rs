use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for benchmatrix operations.
///
/// Every variant is fatal: it unwinds the matrix and terminates the process.
/// Conditions that must *not* stop a run (empty bench output, out-of-order
/// rounds) are modelled as anomalies in the `benchmatrix` crate instead.
#[derive(Error, Debug)]
pub enum MatrixError {
    // === I/O ===
    /// File or process I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Writing a report or log file failed.
    #[error("cannot write '{path}': {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // === Configuration ===
    /// The matrix definition file could not be read.
    #[error("cannot read matrix definition '{path}': {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The matrix definition file is not valid TOML or has the wrong shape.
    #[error("malformed matrix definition: {detail}")]
    ConfigParse { detail: String },

    /// The matrix definition parsed but is semantically invalid.
    #[error("invalid matrix definition: {detail}")]
    InvalidConfig { detail: String },

    /// Baseline-relative output needs at least two configurations.
    #[error("baseline-relative output needs at least 2 configurations, found {count}")]
    TooFewConfigurations { count: usize },

    /// The configured baseline is not one of the configurations.
    #[error("baseline configuration '{name}' is not defined")]
    UnknownBaseline { name: String },

    /// A name that ends up in an output file contains a field separator.
    #[error("{kind} name '{name}' contains forbidden separator {separator:?}")]
    InvalidName {
        kind: &'static str,
        name: String,
        separator: char,
    },

    // === Environment ===
    /// No target triple is known for the running host.
    #[error("unknown OS or hardware ({os}/{arch}), add target triple information for this host")]
    UnsupportedHost { os: String, arch: String },

    /// An external build, test, install, clone or patch action failed.
    #[error("{action} failed with status {status}")]
    ExternalFailure { action: String, status: i32 },

    // === Statistics ===
    /// A round series shorter or longer than the configured round count
    /// was handed to the aggregator.
    #[error("round series has {actual} samples, expected {expected}")]
    IncompleteSeries { expected: usize, actual: usize },

    /// The baseline mean is zero, so a ratio against it is undefined.
    #[error("baseline mean for {benchmark} is zero")]
    ZeroBaselineMean { benchmark: String },

    /// A statistical postcondition did not hold.
    #[error("internal invariant violated: {0}")]
    Invariant(String),

    /// Serializing the results dump failed.
    #[error("serialization failed: {0}")]
    Serialize(String),
}

impl MatrixError {
    /// Process exit code for this error (for CLI use).
    ///
    /// External failures propagate the external action's own status when it
    /// fits in an exit code; everything else exits with 1.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::ExternalFailure { status, .. } => u8::try_from(*status)
                .ok()
                .filter(|code| *code != 0)
                .unwrap_or(1),
            _ => 1,
        }
    }

    /// Whether the user can likely fix this by editing the matrix definition.
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigRead { .. }
                | Self::ConfigParse { .. }
                | Self::InvalidConfig { .. }
                | Self::TooFewConfigurations { .. }
                | Self::UnknownBaseline { .. }
                | Self::InvalidName { .. }
        )
    }

    /// Human-friendly suggestion for fixing this error.
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::TooFewConfigurations { .. } => {
                Some("Add another configuration or drop --plot")
            }
            Self::UnknownBaseline { .. } => {
                Some("Set `baseline` to the name of one of the [[configurations]]")
            }
            Self::InvalidName { .. } => Some("Rename it without spaces or commas"),
            Self::UnsupportedHost { .. } => {
                Some("Extend the host table in toolchain::host_target")
            }
            Self::ExternalFailure { .. } => Some("Inspect the command output logged above"),
            Self::ZeroBaselineMean { .. } => {
                Some("Set `zero_baseline = \"skip\"` to drop such benchmarks")
            }
            _ => None,
        }
    }

    /// Create an invalid-configuration error.
    pub fn invalid_config(detail: impl Into<String>) -> Self {
        Self::InvalidConfig {
            detail: detail.into(),
        }
    }

    /// Create an internal invariant error.
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }

    /// Create an external-failure error.
    pub fn external(action: impl Into<String>, status: i32) -> Self {
        Self::ExternalFailure {
            action: action.into(),
            status,
        }
    }
}

/// Result type alias using `MatrixError`.
pub type MatrixResult<T> = std::result::Result<T, MatrixError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_external() {
        let err = MatrixError::external("cargo build", 101);
        assert_eq!(err.to_string(), "cargo build failed with status 101");
    }

    #[test]
    fn error_display_invalid_name() {
        let err = MatrixError::InvalidName {
            kind: "benchmark",
            name: "a,b".to_owned(),
            separator: ',',
        };
        assert_eq!(
            err.to_string(),
            "benchmark name 'a,b' contains forbidden separator ','"
        );
    }

    #[test]
    fn exit_code_propagates_external_status() {
        assert_eq!(MatrixError::external("x.py install", 3).exit_code(), 3);
        assert_eq!(MatrixError::external("git clone", 128).exit_code(), 128);
    }

    #[test]
    fn exit_code_falls_back_to_one() {
        assert_eq!(MatrixError::external("killed", -1).exit_code(), 1);
        assert_eq!(MatrixError::external("odd", 0).exit_code(), 1);
        assert_eq!(MatrixError::external("huge", 300).exit_code(), 1);
        assert_eq!(MatrixError::invariant("min > mean").exit_code(), 1);
    }

    #[test]
    fn config_errors_are_classified() {
        assert!(MatrixError::TooFewConfigurations { count: 1 }.is_config_error());
        assert!(MatrixError::invalid_config("rounds = 0").is_config_error());
        assert!(!MatrixError::external("cargo test", 1).is_config_error());
    }

    #[test]
    fn suggestions() {
        assert!(MatrixError::TooFewConfigurations { count: 1 }
            .suggestion()
            .is_some());
        assert!(MatrixError::invariant("x").suggestion().is_none());
    }
}
