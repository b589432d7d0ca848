//! Compiler bootstrap and Cargo invocation for one configuration.
//!
//! Installing the toolchain is the expensive step the matrix is ordered
//! around: it happens once per configuration, and every suite is then built
//! with the installed `cargo`/`rustc` so Cargo's cache stays warm.

use std::path::{Path, PathBuf};

use crate::config::{MatrixConfig, TargetConfig};
use crate::error::{MatrixError, MatrixResult};
use crate::exec::{CommandRunner, require_success};
use crate::matrix::RunMode;
use crate::suite::Configuration;

/// Hosts we know a target triple for.  Others may work; they just have not
/// been needed yet.
const SUPPORTED_HOSTS: &[(&str, &str, &str)] = &[
    ("linux", "x86_64", "x86_64-unknown-linux-gnu"),
    ("macos", "aarch64", "aarch64-apple-darwin"),
];

/// Environment variable `x.py` reads for flags applied past stage 0.
const STAGE_FLAGS_ENV: &str = "RUSTFLAGS_STAGE_NOT_0";

/// Target triple of the running host.
pub fn host_target() -> MatrixResult<&'static str> {
    host_target_for(std::env::consts::OS, std::env::consts::ARCH)
}

/// Target triple for an `(os, arch)` pair as reported by `std::env::consts`.
pub fn host_target_for(os: &str, arch: &str) -> MatrixResult<&'static str> {
    SUPPORTED_HOSTS
        .iter()
        .find(|(o, a, _)| *o == os && *a == arch)
        .map(|(_, _, triple)| *triple)
        .ok_or_else(|| MatrixError::UnsupportedHost {
            os: os.to_owned(),
            arch: arch.to_owned(),
        })
}

fn bin_dir(rust_path: &Path) -> PathBuf {
    rust_path.join("build/install-stage2-latest/bin")
}

/// Environment with the installed `rustc` first on `PATH`.  Fails when the
/// toolchain directory itself contains the `PATH` separator.
pub fn toolchain_env(rust_path: &Path) -> MatrixResult<Vec<(String, String)>> {
    let dir = bin_dir(rust_path);
    let dir = dir.to_string_lossy();
    if dir.contains(':') {
        return Err(MatrixError::invalid_config(format!(
            "toolchain path '{dir}' contains ':'"
        )));
    }
    let inherited = std::env::var("PATH").unwrap_or_default();
    let path = if inherited.is_empty() {
        dir.into_owned()
    } else {
        format!("{dir}:{inherited}")
    };
    Ok(vec![("PATH".to_owned(), path)])
}

/// Paths into a Rust compiler checkout plus the bits needed to drive it.
#[derive(Debug, Clone)]
pub struct Toolchain {
    rust_path: PathBuf,
    benchmark_path: PathBuf,
    runner: PathBuf,
    host: String,
    skip_install: bool,
    env: Vec<(String, String)>,
}

impl Toolchain {
    /// Derive toolchain paths from the matrix definition.
    pub fn new(config: &MatrixConfig, host: &str, skip_install: bool) -> MatrixResult<Self> {
        Ok(Self {
            rust_path: config.paths.rust_path.clone(),
            benchmark_path: config.benchmark_path().to_path_buf(),
            runner: config.paths.runner.clone(),
            host: host.to_owned(),
            skip_install,
            env: toolchain_env(&config.paths.rust_path)?,
        })
    }

    fn bin_dir(&self) -> PathBuf {
        bin_dir(&self.rust_path)
    }

    #[must_use]
    pub fn rustc(&self) -> PathBuf {
        self.bin_dir().join("rustc")
    }

    #[must_use]
    pub fn cargo(&self) -> PathBuf {
        self.bin_dir().join("cargo")
    }

    /// Remote test client; invoked through the runner wrapper.
    #[must_use]
    pub fn test_client(&self) -> PathBuf {
        self.rust_path.join(format!(
            "build/{host}/stage0-bootstrap-tools/{host}/release/remote-test-client",
            host = self.host
        ))
    }

    /// Build and install the compiler, std and Cargo with the
    /// configuration's flags.  Every step is fatal on failure.
    pub fn install<R: CommandRunner>(
        &self,
        runner: &R,
        configuration: &Configuration,
    ) -> MatrixResult<()> {
        if self.skip_install {
            tracing::info!(configuration = %configuration.name, "skipping toolchain install");
            return Ok(());
        }
        let x = self.rust_path.join("x.py").display().to_string();
        let flags_env = vec![(STAGE_FLAGS_ENV.to_owned(), configuration.rust_flags.clone())];
        let steps: [(&str, Vec<&str>, &[(String, String)]); 4] = [
            (
                "Building Rust",
                vec!["build", "std", "core", "rustc", "cargo"],
                &flags_env,
            ),
            (
                "Building remote-test-client",
                vec!["build", "src/tools/remote-test-client", "--target", self.host.as_str()],
                &[],
            ),
            ("Installing Rust compiler", vec!["install"], &flags_env),
            (
                "Installing Rust tools",
                vec!["install", "cargo", "library/std"],
                &flags_env,
            ),
        ];

        for (step, args, env) in steps {
            tracing::info!(configuration = %configuration.name, step, "running x.py");
            let mut command = vec!["python3".to_owned(), x.clone()];
            command.extend(args.iter().map(|a| (*a).to_owned()));
            let output = runner.run(&command, env, &self.rust_path)?;
            require_success(step, &output)?;
        }
        Ok(())
    }

    /// Contents of the Cargo config used while `configuration` is active.
    pub fn cargo_config_toml(
        &self,
        configuration: &Configuration,
        targets: &[TargetConfig],
    ) -> MatrixResult<String> {
        let mut build = toml::Table::new();
        build.insert(
            "rustflags".to_owned(),
            toml::Value::String(configuration.rust_flags.clone()),
        );

        let mut target_tables = toml::Table::new();
        for target in targets {
            let mut entry = toml::Table::new();
            if target.use_runner {
                entry.insert(
                    "runner".to_owned(),
                    toml::Value::String(format!(
                        "{} {}",
                        self.runner.display(),
                        self.test_client().display()
                    )),
                );
            }
            entry.insert(
                "linker".to_owned(),
                toml::Value::String(target.linker.display().to_string()),
            );
            target_tables.insert(target.name.clone(), toml::Value::Table(entry));
        }

        let mut root = toml::Table::new();
        root.insert("build".to_owned(), toml::Value::Table(build));
        if !target_tables.is_empty() {
            root.insert("target".to_owned(), toml::Value::Table(target_tables));
        }
        toml::to_string(&root).map_err(|e| MatrixError::Serialize(e.to_string()))
    }

    /// Write `<benchmark_path>/.cargo/config.toml` for `configuration`.
    pub fn write_cargo_config(
        &self,
        configuration: &Configuration,
        targets: &[TargetConfig],
    ) -> MatrixResult<PathBuf> {
        let dir = self.benchmark_path.join(".cargo");
        std::fs::create_dir_all(&dir)?;
        let path = dir.join("config.toml");
        let contents = self.cargo_config_toml(configuration, targets)?;
        std::fs::write(&path, contents).map_err(|source| MatrixError::WriteFailed {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(path = %path.display(), configuration = %configuration.name, "wrote cargo config");
        Ok(path)
    }

    /// `cargo <build|test|bench> --target <target> [extra...]`.
    #[must_use]
    pub fn cargo_command(
        &self,
        mode: RunMode,
        configuration: &Configuration,
        extra_flags: &[String],
    ) -> Vec<String> {
        let mut command = vec![
            self.cargo().display().to_string(),
            mode.cargo_subcommand().to_owned(),
            "--target".to_owned(),
            configuration.target.clone(),
        ];
        command.extend(extra_flags.iter().cloned());
        command
    }

    /// Environment for Cargo, see [`toolchain_env`].
    #[must_use]
    pub fn cargo_env(&self) -> &[(String, String)] {
        &self.env
    }

    #[must_use]
    pub fn benchmark_path(&self) -> &Path {
        &self.benchmark_path
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::exec::CommandOutput;

    const DEFINITION: &str = r#"
baseline = "purecap-bounds"
[paths]
rust_path = "rust"
[[targets]]
name = "aarch64-unknown-freebsd-purecap"
linker = "clang-morello.sh"
[[targets]]
name = "x86_64-unknown-linux-gnu"
linker = "/usr/bin/cc"
use_runner = false
[[configurations]]
name = "purecap-bounds"
target = "aarch64-unknown-freebsd-purecap"
[[configurations]]
name = "purecap-nobounds"
target = "aarch64-unknown-freebsd-purecap"
rust_flags = "-C drop-bounds-checks=yes"
[[suites]]
directory = "itoa"
"#;

    fn config_at(root: &Path) -> MatrixConfig {
        MatrixConfig::from_toml_str(DEFINITION, root).unwrap()
    }

    #[derive(Default)]
    struct RecordingRunner {
        calls: RefCell<Vec<(Vec<String>, Vec<(String, String)>)>>,
        fail_on_call: Option<usize>,
    }

    impl CommandRunner for RecordingRunner {
        fn run(
            &self,
            command: &[String],
            env: &[(String, String)],
            _cwd: &Path,
        ) -> std::io::Result<CommandOutput> {
            let mut calls = self.calls.borrow_mut();
            let index = calls.len();
            calls.push((command.to_vec(), env.to_vec()));
            let status = if self.fail_on_call == Some(index) { 9 } else { 0 };
            Ok(CommandOutput {
                status,
                output: String::new(),
            })
        }
    }

    #[test]
    fn known_hosts() {
        assert_eq!(
            host_target_for("linux", "x86_64").unwrap(),
            "x86_64-unknown-linux-gnu"
        );
        assert_eq!(
            host_target_for("macos", "aarch64").unwrap(),
            "aarch64-apple-darwin"
        );
        assert!(matches!(
            host_target_for("windows", "x86_64"),
            Err(MatrixError::UnsupportedHost { .. })
        ));
    }

    #[test]
    fn derived_paths() {
        let config = config_at(Path::new("/b"));
        let tc = Toolchain::new(&config, "x86_64-unknown-linux-gnu", false).unwrap();
        assert_eq!(
            tc.cargo(),
            PathBuf::from("/b/rust/build/install-stage2-latest/bin/cargo")
        );
        assert_eq!(
            tc.test_client(),
            PathBuf::from(
                "/b/rust/build/x86_64-unknown-linux-gnu/stage0-bootstrap-tools/x86_64-unknown-linux-gnu/release/remote-test-client"
            )
        );
    }

    #[test]
    fn colon_in_toolchain_path_is_rejected() {
        let config = config_at(Path::new("/b:c"));
        assert!(Toolchain::new(&config, "x86_64-unknown-linux-gnu", false).is_err());
    }

    #[test]
    fn install_runs_four_steps_with_stage_flags() {
        let config = config_at(Path::new("/b"));
        let tc = Toolchain::new(&config, "x86_64-unknown-linux-gnu", false).unwrap();
        let runner = RecordingRunner::default();
        tc.install(&runner, &config.configurations[1]).unwrap();

        let calls = runner.calls.borrow();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[0].0[2..], ["build", "std", "core", "rustc", "cargo"]);
        assert_eq!(
            calls[0].1,
            vec![(
                "RUSTFLAGS_STAGE_NOT_0".to_owned(),
                "-C drop-bounds-checks=yes".to_owned()
            )]
        );
        assert!(calls[1].1.is_empty());
        assert_eq!(calls[3].0[2..], ["install", "cargo", "library/std"]);
    }

    #[test]
    fn install_stops_at_first_failure() {
        let config = config_at(Path::new("/b"));
        let tc = Toolchain::new(&config, "x86_64-unknown-linux-gnu", false).unwrap();
        let runner = RecordingRunner {
            fail_on_call: Some(1),
            ..RecordingRunner::default()
        };
        let err = tc.install(&runner, &config.configurations[0]).unwrap_err();
        assert_eq!(err.exit_code(), 9);
        assert_eq!(runner.calls.borrow().len(), 2);
    }

    #[test]
    fn skip_install_runs_nothing() {
        let config = config_at(Path::new("/b"));
        let tc = Toolchain::new(&config, "x86_64-unknown-linux-gnu", true).unwrap();
        let runner = RecordingRunner::default();
        tc.install(&runner, &config.configurations[0]).unwrap();
        assert!(runner.calls.borrow().is_empty());
    }

    #[test]
    fn cargo_config_contents() {
        let config = config_at(Path::new("/b"));
        let tc = Toolchain::new(&config, "x86_64-unknown-linux-gnu", false).unwrap();
        let text = tc
            .cargo_config_toml(&config.configurations[1], &config.targets)
            .unwrap();
        let parsed: toml::Table = toml::from_str(&text).unwrap();
        assert_eq!(
            parsed["build"]["rustflags"].as_str(),
            Some("-C drop-bounds-checks=yes")
        );
        let purecap = &parsed["target"]["aarch64-unknown-freebsd-purecap"];
        assert_eq!(purecap["linker"].as_str(), Some("/b/rust/clang-morello.sh"));
        assert!(
            purecap["runner"]
                .as_str()
                .unwrap()
                .starts_with("/b/runner.sh /b/rust/build/")
        );
        let host = &parsed["target"]["x86_64-unknown-linux-gnu"];
        assert!(host.get("runner").is_none());
    }

    #[test]
    fn write_cargo_config_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_at(dir.path());
        let tc = Toolchain::new(&config, "x86_64-unknown-linux-gnu", false).unwrap();
        let path = tc
            .write_cargo_config(&config.configurations[0], &config.targets)
            .unwrap();
        assert_eq!(path, dir.path().join(".cargo/config.toml"));
        assert!(std::fs::read_to_string(path).unwrap().contains("[build]"));
    }

    #[test]
    fn cargo_command_shape() {
        let config = config_at(Path::new("/b"));
        let tc = Toolchain::new(&config, "x86_64-unknown-linux-gnu", false).unwrap();
        let cmd = tc.cargo_command(
            RunMode::Bench,
            &config.configurations[0],
            &["--features".to_owned(), "benchmarks".to_owned()],
        );
        assert_eq!(
            cmd[1..],
            [
                "bench",
                "--target",
                "aarch64-unknown-freebsd-purecap",
                "--features",
                "benchmarks"
            ]
        );
        let env = tc.cargo_env();
        assert!(env[0].1.starts_with("/b/rust/build/install-stage2-latest/bin"));
    }
}
