//! Blocking external command execution.
//!
//! Everything the matrix does to the outside world (git, `x.py`, Cargo,
//! `cargo-count`) goes through [`CommandRunner`], so tests can substitute a
//! scripted runner.  There is no timeout: a hung process blocks the run.

use std::io;
use std::path::Path;
use std::process::Command;

/// Status and combined output of one finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit status; `-1` when the process was killed by a signal.
    pub status: i32,
    /// Standard output followed by standard error.
    pub output: String,
}

impl CommandOutput {
    #[must_use]
    pub const fn success(&self) -> bool {
        self.status == 0
    }
}

/// Abstraction for running external commands.
pub trait CommandRunner {
    /// Run `command` (program first) in `cwd` with `env` added to the
    /// inherited environment, and wait for it.
    fn run(
        &self,
        command: &[String],
        env: &[(String, String)],
        cwd: &Path,
    ) -> io::Result<CommandOutput>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(
        &self,
        command: &[String],
        env: &[(String, String)],
        cwd: &Path,
    ) -> io::Result<CommandOutput> {
        (**self).run(command, env, cwd)
    }
}

/// Default process-backed runner.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessCommandRunner;

impl CommandRunner for ProcessCommandRunner {
    fn run(
        &self,
        command: &[String],
        env: &[(String, String)],
        cwd: &Path,
    ) -> io::Result<CommandOutput> {
        let Some((program, args)) = command.split_first() else {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty command"));
        };

        let mut process = Command::new(program);
        process.args(args).current_dir(cwd);
        for (key, value) in env {
            process.env(key, value);
        }

        let output = process.output()?;
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        let result = CommandOutput {
            status: output.status.code().unwrap_or(-1),
            output: combined,
        };
        if !result.success() {
            tracing::warn!(
                command = %command.join(" "),
                cwd = %cwd.display(),
                status = result.status,
                output = %result.output,
                "failed to run command"
            );
        }
        Ok(result)
    }
}

/// Log an OK/FAIL line for `step` and turn a failure into a fatal error.
pub(crate) fn require_success(step: &str, output: &CommandOutput) -> crate::MatrixResult<()> {
    if output.success() {
        tracing::info!(step, "OK");
        Ok(())
    } else {
        tracing::error!(step, status = output.status, "FAIL");
        Err(crate::MatrixError::external(step, output.status))
    }
}
