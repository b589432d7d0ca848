//! Fetching and patching benchmark suites.

use std::path::{Path, PathBuf};

use crate::error::{MatrixError, MatrixResult};
use crate::exec::{CommandRunner, require_success};
use crate::suite::Suite;

/// Clones, patches and removes suite checkouts under the benchmark root.
#[derive(Debug)]
pub struct Provisioner<R> {
    runner: R,
    benchmark_path: PathBuf,
    patch_dir: PathBuf,
}

impl<R: CommandRunner> Provisioner<R> {
    pub fn new(runner: R, benchmark_path: &Path, patch_dir: &Path) -> Self {
        Self {
            runner,
            benchmark_path: benchmark_path.to_path_buf(),
            patch_dir: patch_dir.to_path_buf(),
        }
    }

    /// Make `suite` available on disk.
    ///
    /// Suites without a repository are used as they are.  An existing
    /// checkout is left alone, so a patch is only applied right after a
    /// fresh clone.  Returns whether anything was cloned.
    pub fn provision(&self, suite: &Suite) -> MatrixResult<bool> {
        let Some(repo) = &suite.repo else {
            if let Some(patch) = &suite.patch {
                tracing::warn!(
                    suite = %suite.directory,
                    patch = %patch,
                    "patch specified for non-Git benchmark, ignored"
                );
            }
            return Ok(false);
        };

        let checkout = self.benchmark_path.join(&suite.directory);
        if checkout.is_dir() {
            tracing::debug!(suite = %suite.directory, "checkout exists, not cloning");
            return Ok(false);
        }

        let mut command = vec!["git".to_owned(), "clone".to_owned(), repo.clone()];
        if let Some(branch) = &suite.branch {
            command.push("--branch".to_owned());
            command.push(branch.clone());
        }
        command.push(suite.directory.clone());

        tracing::info!(suite = %suite.directory, repo = %repo, "cloning");
        let output = self.runner.run(&command, &[], &self.benchmark_path)?;
        require_success(&format!("git clone {}", suite.directory), &output)?;

        if let Some(patch) = &suite.patch {
            let patch_path = self.patch_dir.join(patch);
            tracing::info!(suite = %suite.directory, patch = %patch, "applying patch");
            let command = vec![
                "git".to_owned(),
                "apply".to_owned(),
                patch_path.display().to_string(),
            ];
            let output = self.runner.run(&command, &[], &checkout)?;
            require_success(&format!("git apply {patch}"), &output)?;
        }
        Ok(true)
    }

    /// Provision every suite in order, stopping at the first failure.
    pub fn provision_all(&self, suites: &[Suite]) -> MatrixResult<usize> {
        let mut cloned = 0;
        for suite in suites {
            if self.provision(suite)? {
                cloned += 1;
            }
        }
        Ok(cloned)
    }

    /// Remove the checkout of every suite that has a repository.  Local
    /// suites are never touched.  Returns the number of removed checkouts.
    pub fn clean(&self, suites: &[Suite]) -> MatrixResult<usize> {
        let mut removed = 0;
        for suite in suites.iter().filter(|s| s.repo.is_some()) {
            let checkout = self.benchmark_path.join(&suite.directory);
            match std::fs::remove_dir_all(&checkout) {
                Ok(()) => {
                    tracing::info!(suite = %suite.directory, "removed checkout");
                    removed += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!(suite = %suite.directory, "no checkout to remove");
                }
                Err(source) => {
                    return Err(MatrixError::WriteFailed {
                        path: checkout,
                        source,
                    });
                }
            }
        }
        Ok(removed)
    }
}
