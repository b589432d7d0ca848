//! `benchmatrix`: run a (suite × configuration) benchmark matrix.
//!
//! ```text
//! benchmatrix [--config matrix.toml] [--build-only | --test-only]
//!             [--clone-only] [--clean] [--plot] [--skip-install]
//!             [--line-count] [--output-dir DIR] [--log-dir DIR] [-v]
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use benchmatrix::anomaly::Anomaly;
use benchmatrix::config::MatrixConfig;
use benchmatrix::exec::ProcessCommandRunner;
use benchmatrix::linecount::{count_suite, render_line_counts};
use benchmatrix::logging::init_logging;
use benchmatrix::matrix::{CargoExecutor, MatrixController, RunMode};
use benchmatrix::provision::Provisioner;
use benchmatrix::report::{LINE_COUNT_FILE_NAME, partial_series, write_reports};
use benchmatrix::run_meta::{EnvironmentMeta, ResultsDump, RunMeta};
use benchmatrix::store::ResultStore;
use benchmatrix::toolchain::{Toolchain, host_target, toolchain_env};
use benchmatrix::{MatrixError, MatrixResult};

/// Run every benchmark suite under every compiler configuration and report
/// speedups relative to a baseline configuration.
#[derive(Parser, Debug)]
#[command(name = "benchmatrix", version)]
struct Cli {
    /// Matrix definition file.
    #[arg(long, default_value = "matrix.toml")]
    config: PathBuf,

    /// Only build the suites, do not run benchmarks.
    #[arg(long, conflicts_with = "test_only")]
    build_only: bool,

    /// Only run the suites' tests, do not run benchmarks.
    #[arg(long)]
    test_only: bool,

    /// Only clone and patch the suites.
    #[arg(long)]
    clone_only: bool,

    /// Remove every cloned suite and exit.
    #[arg(long)]
    clean: bool,

    /// Also write the baseline-relative pgfplots table.
    #[arg(long)]
    plot: bool,

    /// Use the already installed toolchain for every configuration.
    #[arg(long)]
    skip_install: bool,

    /// Count lines of code per suite, write a CSV file and exit.
    #[arg(long)]
    line_count: bool,

    /// Output directory, overriding the matrix definition.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Also write JSON-lines logs into this directory.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Log everything.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    const fn mode(&self) -> RunMode {
        if self.build_only {
            RunMode::Build
        } else if self.test_only {
            RunMode::Test
        } else {
            RunMode::Bench
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _guard = match init_logging(cli.log_dir.as_deref(), cli.verbose) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("error: cannot set up logging: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "benchmatrix failed");
            if let Some(hint) = e.suggestion() {
                tracing::error!(hint, "suggestion");
            }
            if e.is_config_error() {
                tracing::error!(config = %cli.config.display(), "fix the matrix definition and rerun");
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(cli: &Cli) -> MatrixResult<()> {
    let mut config = MatrixConfig::load(&cli.config)?;
    if let Some(dir) = &cli.output_dir {
        config.output_dir.clone_from(dir);
    }
    let mode = cli.mode();

    let provisioner = Provisioner::new(
        ProcessCommandRunner,
        config.benchmark_path(),
        &config.paths.patch_dir,
    );
    if cli.clean {
        let removed = provisioner.clean(&config.suites)?;
        tracing::info!(removed, "cleaned suite checkouts");
        return Ok(());
    }
    let cloned = provisioner.provision_all(&config.suites)?;
    tracing::info!(cloned, suites = config.suites.len(), "suites ready");
    if cli.clone_only {
        return Ok(());
    }

    if cli.line_count {
        return write_line_counts(&config);
    }

    // Fail before hours of benchmarking rather than at report time.
    if cli.plot && mode == RunMode::Bench {
        config.require_comparable()?;
    }

    let host = host_target()?;
    let toolchain = Toolchain::new(&config, host, cli.skip_install)?;
    let rustc = toolchain.rustc();
    let executor = CargoExecutor::new(ProcessCommandRunner, toolchain, &config.targets);

    let mut store = ResultStore::new(config.rounds);
    let report = MatrixController::new(&config, mode, executor).run(&mut store)?;
    if mode != RunMode::Bench {
        return Ok(());
    }

    let environment = EnvironmentMeta::capture(&rustc);
    finish_bench_run(&config, store, report.anomalies, environment, cli.plot)
}

/// Dump the raw results first, then render the reports, so a report-time
/// failure never loses measurements.
fn finish_bench_run(
    config: &MatrixConfig,
    store: ResultStore,
    mut anomalies: Vec<Anomaly>,
    environment: EnvironmentMeta,
    plot: bool,
) -> MatrixResult<()> {
    anomalies.extend(partial_series(&store, &config.configurations));
    let dump = ResultsDump {
        meta: RunMeta::new(config, environment)?,
        anomalies,
        results: store,
    };
    let dump_path = dump.write(&config.output_dir)?;
    tracing::info!(
        results = %dump_path.display(),
        anomalies = dump.anomalies.len(),
        "results dumped"
    );

    let (paths, _) = write_reports(&config.output_dir, &dump.results, config, plot)?;
    tracing::info!(tabular = %paths.tabular.display(), "reports written");
    Ok(())
}

fn write_line_counts(config: &MatrixConfig) -> MatrixResult<()> {
    let count_path = config.paths.count_path.as_deref().ok_or_else(|| {
        MatrixError::invalid_config("paths.count_path is required for --line-count")
    })?;
    let env = toolchain_env(&config.paths.rust_path)?;

    let counts: Vec<_> = config
        .suites
        .iter()
        .map(|suite| {
            let count = count_suite(
                &ProcessCommandRunner,
                count_path,
                config.benchmark_path(),
                suite,
                &env,
            );
            (suite.directory.as_str(), count)
        })
        .collect();
    let text = render_line_counts(&counts)?;

    std::fs::create_dir_all(&config.output_dir)?;
    let path = config.output_dir.join(LINE_COUNT_FILE_NAME);
    std::fs::write(&path, text).map_err(|source| MatrixError::WriteFailed {
        path: path.clone(),
        source,
    })?;
    tracing::info!(path = %path.display(), suites = counts.len(), "wrote line counts");
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("benchmatrix").chain(args.iter().copied()))
    }

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults() {
        let cli = parse(&[]).unwrap();
        assert_eq!(cli.config, PathBuf::from("matrix.toml"));
        assert_eq!(cli.mode(), RunMode::Bench);
        assert!(!cli.plot && !cli.clean && !cli.clone_only && !cli.line_count);
        assert!(cli.output_dir.is_none());
    }

    #[test]
    fn mode_flags() {
        assert_eq!(parse(&["--build-only"]).unwrap().mode(), RunMode::Build);
        assert_eq!(parse(&["--test-only"]).unwrap().mode(), RunMode::Test);
        assert!(parse(&["--build-only", "--test-only"]).is_err());
    }

    #[test]
    fn paths_and_switches() {
        let cli = parse(&[
            "--config",
            "bench/matrix.toml",
            "--output-dir",
            "out",
            "--log-dir",
            "logs",
            "--plot",
            "--skip-install",
            "-v",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("bench/matrix.toml"));
        assert_eq!(cli.output_dir, Some(PathBuf::from("out")));
        assert_eq!(cli.log_dir, Some(PathBuf::from("logs")));
        assert!(cli.plot && cli.skip_install && cli.verbose);
    }

    const ZERO_BASELINE: &str = r#"
rounds = 1
baseline = "a"
zero_baseline = "abort"
output_dir = "out"
[paths]
rust_path = "rust"
[[configurations]]
name = "a"
target = "x86_64-unknown-linux-gnu"
[[configurations]]
name = "b"
target = "x86_64-unknown-linux-gnu"
[[suites]]
directory = "s"
"#;

    fn environment() -> EnvironmentMeta {
        EnvironmentMeta {
            os: "Linux 6.8.0".to_owned(),
            arch: "x86_64".to_owned(),
            cpu_count: 1,
            cpu_model: None,
            rustc_version: "unknown".to_owned(),
        }
    }

    #[test]
    fn results_are_dumped_before_reports_can_fail() {
        let dir = tempfile::tempdir().unwrap();
        let config = MatrixConfig::from_toml_str(ZERO_BASELINE, dir.path()).unwrap();
        let mut store = ResultStore::new(1);
        store
            .record("s/zero", "a", 0, benchmatrix::sample::Sample::new(0, 0))
            .unwrap();
        store
            .record("s/zero", "b", 0, benchmatrix::sample::Sample::new(5, 0))
            .unwrap();

        let err = finish_bench_run(&config, store, Vec::new(), environment(), true).unwrap_err();
        assert!(matches!(err, MatrixError::ZeroBaselineMean { .. }));

        let dumped = std::fs::read_to_string(
            dir.path()
                .join("out")
                .join(benchmatrix::run_meta::RESULTS_FILE_NAME),
        )
        .unwrap();
        let back = ResultsDump::from_json(&dumped).unwrap();
        assert_eq!(back.results.get("s/zero", "b").unwrap().len(), 1);
    }

    #[test]
    fn dump_includes_partial_series() {
        let dir = tempfile::tempdir().unwrap();
        let text = ZERO_BASELINE.replace("rounds = 1", "rounds = 2");
        let config = MatrixConfig::from_toml_str(&text, dir.path()).unwrap();
        let mut store = ResultStore::new(2);
        store
            .record("s/x", "a", 0, benchmatrix::sample::Sample::new(10, 1))
            .unwrap();

        finish_bench_run(&config, store, Vec::new(), environment(), false).unwrap();
        let dumped = std::fs::read_to_string(
            dir.path()
                .join("out")
                .join(benchmatrix::run_meta::RESULTS_FILE_NAME),
        )
        .unwrap();
        let back = ResultsDump::from_json(&dumped).unwrap();
        assert!(matches!(
            back.anomalies.as_slice(),
            [Anomaly::PartialSeries { actual: 1, .. }]
        ));
        assert!(dir.path().join("out").join(benchmatrix::report::TABULAR_FILE_NAME).exists());
    }

    #[test]
    fn unknown_flag_is_a_usage_error() {
        let err = parse(&["--frobnicate"]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
