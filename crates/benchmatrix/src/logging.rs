//! Structured logging for matrix runs.
//!
//! Two outputs: a compact human-readable layer on stderr, and optionally a
//! JSON-lines file so a long run can be inspected afterwards with `jq`.
//! Progress events carry `suite`, `configuration` and `round` fields.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// File name of the JSON-lines log inside the log directory.
pub const LOG_FILE_NAME: &str = "benchmatrix.log.jsonl";

/// Returned by [`init_logging`]; keep it alive for the whole run.
#[derive(Debug)]
pub struct LogGuard {
    /// JSON-lines log file, when one was requested.
    pub log_path: Option<PathBuf>,
}

/// `MakeWriter` over a shared file.  Each event takes the lock once.
#[derive(Clone)]
struct SharedFileWriter {
    file: Arc<Mutex<std::fs::File>>,
}

impl SharedFileWriter {
    fn new(file: std::fs::File) -> Self {
        Self {
            file: Arc::new(Mutex::new(file)),
        }
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SharedFileWriter {
    type Writer = SharedFileGuard<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        SharedFileGuard {
            guard: self.file.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }
}

struct SharedFileGuard<'a> {
    guard: MutexGuard<'a, std::fs::File>,
}

impl std::io::Write for SharedFileGuard<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        std::io::Write::write(&mut *self.guard, buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        std::io::Write::flush(&mut *self.guard)
    }
}

/// Install the global subscriber.
///
/// `verbose` lowers the default filter from `info` to `trace`; `RUST_LOG`
/// overrides both.  With `log_dir`, events are also written as JSON lines
/// to `<log_dir>/benchmatrix.log.jsonl`.
///
/// # Panics
///
/// Panics if a global subscriber is already set.
pub fn init_logging(log_dir: Option<&Path>, verbose: bool) -> std::io::Result<LogGuard> {
    let default_filter = if verbose { "trace" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let (json_layer, log_path) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let log_path = dir.join(LOG_FILE_NAME);
            let writer = SharedFileWriter::new(std::fs::File::create(&log_path)?);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_target(true);
            (Some(layer), Some(log_path))
        }
        None => (None, None),
    };

    let terminal_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(terminal_layer)
        .with(json_layer)
        .init();

    Ok(LogGuard { log_path })
}

/// Terminal-only logging for tests.  Safe to call repeatedly.
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_test_writer()
                .compact(),
        )
        .try_init();
}

/// Run `f`, logging how long it took and whether it failed.
pub fn log_timed<T, E: std::fmt::Display>(
    operation: &str,
    configuration: &str,
    f: impl FnOnce() -> Result<T, E>,
) -> Result<T, E> {
    let start = std::time::Instant::now();
    let result = f();
    let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

    match &result {
        Ok(_) => tracing::info!(operation, configuration, elapsed_ms, "step complete"),
        Err(e) => tracing::warn!(
            operation,
            configuration,
            elapsed_ms,
            error = %e,
            "step failed"
        ),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json_subscriber(log_path: &Path, filter: &str) -> impl tracing::Subscriber + Send + Sync {
        let writer = SharedFileWriter::new(std::fs::File::create(log_path).unwrap());
        tracing_subscriber::registry()
            .with(EnvFilter::new(filter))
            .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
    }

    #[test]
    fn events_are_json_lines_with_fields() {
        let tmp = tempfile::tempdir().unwrap();
        let log_path = tmp.path().join(LOG_FILE_NAME);

        tracing::subscriber::with_default(json_subscriber(&log_path, "info"), || {
            tracing::info!(
                suite = "itoa-1.0.3",
                configuration = "hybrid-bounds",
                round = 1,
                "running round"
            );
        });

        let content = std::fs::read_to_string(&log_path).unwrap();
        let line = content.lines().next().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(parsed["level"], "INFO");
        assert_eq!(parsed["fields"]["suite"], "itoa-1.0.3");
        assert_eq!(parsed["fields"]["round"], 1);
    }

    #[test]
    fn filter_drops_lower_levels() {
        let tmp = tempfile::tempdir().unwrap();
        let log_path = tmp.path().join(LOG_FILE_NAME);

        tracing::subscriber::with_default(json_subscriber(&log_path, "info"), || {
            tracing::debug!(hidden = true, "debug event");
            tracing::info!(shown = true, "info event");
        });

        let content = std::fs::read_to_string(&log_path).unwrap();
        assert!(content.contains("shown"));
        assert!(!content.contains("hidden"));
    }

    #[test]
    fn timed_step_reports_outcome() {
        let tmp = tempfile::tempdir().unwrap();
        let log_path = tmp.path().join(LOG_FILE_NAME);

        tracing::subscriber::with_default(json_subscriber(&log_path, "info"), || {
            let ok: Result<u8, String> = log_timed("install", "purecap-bounds", || Ok(1));
            assert_eq!(ok.unwrap(), 1);
            let err: Result<u8, String> =
                log_timed("install", "hybrid-bounds", || Err("x.py failed".to_owned()));
            assert!(err.is_err());
        });

        let content = std::fs::read_to_string(&log_path).unwrap();
        assert!(content.contains("elapsed_ms"));
        assert!(content.contains("x.py failed"));
    }
}
