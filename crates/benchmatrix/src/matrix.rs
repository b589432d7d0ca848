//! The execution matrix.
//!
//! Loop nesting is configurations → suites → subprojects → rounds.  The
//! toolchain is rebuilt once per configuration and Cargo's cache is only
//! valid for the currently installed toolchain, so every suite runs under
//! one configuration before the next configuration is installed.  Rounds
//! run strictly in order `0..rounds`.
//!
//! Build and test failures are fatal.  In bench mode a failed invocation
//! is logged and its output is still parsed; one that cannot even be
//! launched counts as a failed round without output.  A round that yields
//! nothing becomes an [`Anomaly::EmptyResult`] and the matrix moves on.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::anomaly::Anomaly;
use crate::config::{MatrixConfig, TargetConfig};
use crate::error::{MatrixError, MatrixResult};
use crate::exec::{CommandOutput, CommandRunner, require_success};
use crate::logging::log_timed;
use crate::parser::parse_bench_output;
use crate::store::ResultStore;
use crate::suite::{Configuration, Suite, SuiteIdentity};
use crate::toolchain::Toolchain;

/// What to do in each matrix cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    #[default]
    Bench,
    Build,
    Test,
}

impl RunMode {
    #[must_use]
    pub const fn cargo_subcommand(self) -> &'static str {
        match self {
            Self::Bench => "bench",
            Self::Build => "build",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cargo_subcommand())
    }
}

/// Performs the external work of the matrix.
pub trait CellExecutor {
    /// Called once before the first cell of `configuration`.
    fn prepare_configuration(&mut self, configuration: &Configuration) -> MatrixResult<()>;

    /// Run one cell and return its status and combined output.  Only
    /// failures to launch are errors; a non-zero status is returned as data.
    fn execute(
        &mut self,
        mode: RunMode,
        configuration: &Configuration,
        suite: &Suite,
        subproject: Option<&str>,
    ) -> MatrixResult<CommandOutput>;
}

/// Executor that installs the toolchain and drives real Cargo.
#[derive(Debug)]
pub struct CargoExecutor<R> {
    runner: R,
    toolchain: Toolchain,
    targets: Vec<TargetConfig>,
}

impl<R: CommandRunner> CargoExecutor<R> {
    pub fn new(runner: R, toolchain: Toolchain, targets: &[TargetConfig]) -> Self {
        Self {
            runner,
            toolchain,
            targets: targets.to_vec(),
        }
    }
}

impl<R: CommandRunner> CellExecutor for CargoExecutor<R> {
    fn prepare_configuration(&mut self, configuration: &Configuration) -> MatrixResult<()> {
        log_timed("toolchain install", &configuration.name, || {
            self.toolchain.install(&self.runner, configuration)
        })?;
        self.toolchain
            .write_cargo_config(configuration, &self.targets)?;
        Ok(())
    }

    fn execute(
        &mut self,
        mode: RunMode,
        configuration: &Configuration,
        suite: &Suite,
        subproject: Option<&str>,
    ) -> MatrixResult<CommandOutput> {
        let benchmark_path = self.toolchain.benchmark_path();
        let workdir = suite.working_dir(benchmark_path, subproject);
        let extra: &[String] = match mode {
            RunMode::Bench => &suite.extra_bench_flags,
            RunMode::Build | RunMode::Test => &[],
        };
        let command = self.toolchain.cargo_command(mode, configuration, extra);
        let output = self
            .runner
            .run(&command, self.toolchain.cargo_env(), &workdir)?;

        if mode == RunMode::Bench {
            let log_path = suite.log_path(benchmark_path, configuration);
            if let Err(e) = write_bench_log(&log_path, &output) {
                tracing::warn!(
                    suite = %suite.directory,
                    configuration = %configuration.name,
                    error = %e,
                    "cannot keep bench output log"
                );
            }
        }
        Ok(output)
    }
}

/// Keep the raw output of the latest bench round for debugging.
fn write_bench_log(path: &Path, output: &CommandOutput) -> MatrixResult<()> {
    std::fs::write(path, &output.output).map_err(|source| MatrixError::WriteFailed {
        path: path.to_path_buf(),
        source,
    })
}

/// Where the controller is in the nested iteration.  Indices are positions
/// in the configuration, suite and subproject lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixState {
    NotStarted,
    PerConfiguration {
        configuration: usize,
    },
    PerSuite {
        configuration: usize,
        suite: usize,
    },
    PerSubproject {
        configuration: usize,
        suite: usize,
        subproject: usize,
    },
    PerRound {
        configuration: usize,
        suite: usize,
        subproject: usize,
        round: usize,
    },
    Done,
}

/// Outcome of a completed matrix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatrixReport {
    /// Non-fatal conditions, in the order they occurred.
    pub anomalies: Vec<Anomaly>,
    /// Number of cells executed.
    pub cells: usize,
}

/// Drives the matrix for one definition.
pub struct MatrixController<'a, E> {
    configurations: &'a [Configuration],
    suites: &'a [Suite],
    rounds: usize,
    mode: RunMode,
    executor: E,
    state: MatrixState,
}

impl<'a, E: CellExecutor> MatrixController<'a, E> {
    pub fn new(config: &'a MatrixConfig, mode: RunMode, executor: E) -> Self {
        Self {
            configurations: &config.configurations,
            suites: &config.suites,
            rounds: config.rounds,
            mode,
            executor,
            state: MatrixState::NotStarted,
        }
    }

    #[must_use]
    pub const fn state(&self) -> MatrixState {
        self.state
    }

    /// Give back the executor, e.g. to inspect a scripted one.
    pub fn into_executor(self) -> E {
        self.executor
    }

    fn enter(&mut self, state: MatrixState) {
        tracing::trace!(?state, "matrix transition");
        self.state = state;
    }

    /// Run every cell, recording bench results into `store`.
    ///
    /// Fatal errors unwind immediately; anomalies are logged, collected and
    /// returned in the report.
    pub fn run(&mut self, store: &mut ResultStore) -> MatrixResult<MatrixReport> {
        if self.state != MatrixState::NotStarted {
            return Err(MatrixError::invariant("matrix controller already ran"));
        }
        if store.rounds() != self.rounds {
            return Err(MatrixError::invariant(format!(
                "result store expects {} rounds, matrix runs {}",
                store.rounds(),
                self.rounds
            )));
        }

        let mut report = MatrixReport::default();
        let configurations = self.configurations;
        let suites = self.suites;

        for (ci, configuration) in configurations.iter().enumerate() {
            self.enter(MatrixState::PerConfiguration { configuration: ci });
            tracing::info!(configuration = %configuration.name, target = %configuration.target, "preparing configuration");
            self.executor.prepare_configuration(configuration)?;

            for (si, suite) in suites.iter().enumerate() {
                self.enter(MatrixState::PerSuite {
                    configuration: ci,
                    suite: si,
                });

                for (pi, subproject) in suite.subprojects.entries().into_iter().enumerate() {
                    self.enter(MatrixState::PerSubproject {
                        configuration: ci,
                        suite: si,
                        subproject: pi,
                    });
                    let identity = SuiteIdentity::new(&suite.directory, subproject);

                    for round in 0..self.rounds {
                        self.enter(MatrixState::PerRound {
                            configuration: ci,
                            suite: si,
                            subproject: pi,
                            round,
                        });
                        tracing::info!(
                            suite = %identity,
                            configuration = %configuration.name,
                            round = round + 1,
                            rounds = self.rounds,
                            mode = %self.mode,
                            "running round"
                        );
                        let output = match self
                            .executor
                            .execute(self.mode, configuration, suite, subproject)
                        {
                            Ok(output) => output,
                            Err(e) if self.mode == RunMode::Bench => {
                                tracing::warn!(
                                    suite = %identity,
                                    configuration = %configuration.name,
                                    round,
                                    error = %e,
                                    "bench invocation could not run"
                                );
                                CommandOutput {
                                    status: -1,
                                    output: String::new(),
                                }
                            }
                            Err(e) => return Err(e),
                        };
                        report.cells += 1;
                        self.consume(store, &identity, configuration, round, &output, &mut report)?;
                    }
                }
            }
        }

        self.enter(MatrixState::Done);
        tracing::info!(
            cells = report.cells,
            benchmarks = store.len(),
            anomalies = report.anomalies.len(),
            "matrix complete"
        );
        Ok(report)
    }

    fn consume(
        &self,
        store: &mut ResultStore,
        identity: &SuiteIdentity,
        configuration: &Configuration,
        round: usize,
        output: &CommandOutput,
        report: &mut MatrixReport,
    ) -> MatrixResult<()> {
        match self.mode {
            RunMode::Build | RunMode::Test => {
                if self.mode == RunMode::Test {
                    tracing::info!(suite = %identity, output = %output.output, "cargo test");
                } else {
                    tracing::debug!(suite = %identity, output = %output.output, "cargo build");
                }
                require_success(&format!("cargo {} {identity}", self.mode), output)
            }
            RunMode::Bench => {
                if !output.success() {
                    tracing::warn!(
                        suite = %identity,
                        configuration = %configuration.name,
                        round,
                        status = output.status,
                        "bench invocation failed, parsing whatever it printed"
                    );
                }
                let mut parsed = 0_usize;
                for result in parse_bench_output(&output.output, identity.as_str()) {
                    parsed += 1;
                    if let Err(anomaly) =
                        store.record(&result.benchmark, &configuration.name, round, result.sample)
                    {
                        anomaly.log();
                        report.anomalies.push(anomaly);
                    }
                }
                if parsed == 0 {
                    let anomaly = Anomaly::EmptyResult {
                        suite: identity.to_string(),
                        configuration: configuration.name.clone(),
                        round,
                    };
                    anomaly.log();
                    report.anomalies.push(anomaly);
                }
                Ok(())
            }
        }
    }
}
