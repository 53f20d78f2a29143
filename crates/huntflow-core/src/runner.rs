use std::{
    collections::BTreeMap,
    ffi::OsString,
    io,
    path::{Path, PathBuf},
    process::Stdio,
};

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

use crate::phase::Phase;

pub const ENV_TARGET: &str = "TARGET";
pub const ENV_RESULTS_DIR: &str = "RESULTS_DIR";
pub const ENV_PHASE_NAME: &str = "PHASE_NAME";

/// Extension-to-launcher table used to pick an interpreter for a script.
///
/// Scripts whose extension has no entry are executed directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launchers {
    by_extension: BTreeMap<String, Vec<String>>,
}

impl Default for Launchers {
    fn default() -> Self {
        let mut by_extension = BTreeMap::new();
        by_extension.insert("sh".to_string(), vec!["bash".to_string()]);
        by_extension.insert("py".to_string(), vec!["python".to_string()]);
        Self { by_extension }
    }
}

impl Launchers {
    /// Built-in table extended (or overridden) by user entries. Leading dots on keys are ignored.
    pub fn with_overrides(overrides: &BTreeMap<String, Vec<String>>) -> Self {
        let mut launchers = Self::default();
        for (extension, tokens) in overrides {
            launchers
                .by_extension
                .insert(extension.trim_start_matches('.').to_string(), tokens.clone());
        }
        launchers
    }

    pub fn launcher_for(&self, script: &Path) -> &[String] {
        script
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.by_extension.get(ext))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Full argv: launcher tokens followed by the script path.
    pub fn command_line(&self, script: &Path) -> Vec<OsString> {
        let mut argv: Vec<OsString> = self
            .launcher_for(script)
            .iter()
            .map(OsString::from)
            .collect();
        argv.push(script.as_os_str().to_owned());
        argv
    }
}

/// Everything a phase script needs to know about its invocation.
#[derive(Debug, Clone, Copy)]
pub struct PhaseRequest<'a> {
    pub phase: Phase,
    pub script: &'a Path,
    pub target: &'a str,
    pub results_dir: &'a Path,
}

/// Captured result of a finished script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// `None` when the child was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("{} script not found: {}", phase.label(), path.display())]
    ScriptMissing { phase: Phase, path: PathBuf },
    #[error("error running {phase} script {}: {source}", path.display())]
    Spawn {
        phase: Phase,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Runs the external script behind a pipeline phase.
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    /// Run the script to completion. A non-zero exit is reported in the outcome, not as an error.
    async fn run(&self, request: &PhaseRequest<'_>) -> Result<ProcessOutcome, RunnerError>;
}

/// [`ScriptRunner`] that spawns child processes, blocking the pipeline until they exit.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    launchers: Launchers,
}

impl ProcessRunner {
    pub fn new(launchers: Launchers) -> Self {
        Self { launchers }
    }
}

#[async_trait]
impl ScriptRunner for ProcessRunner {
    async fn run(&self, request: &PhaseRequest<'_>) -> Result<ProcessOutcome, RunnerError> {
        let script = request.script;
        if !script.is_file() {
            return Err(RunnerError::ScriptMissing {
                phase: request.phase,
                path: script.to_path_buf(),
            });
        }
        if let Err(err) = mark_executable(script) {
            tracing::warn!(
                "Could not set executable permission on {}: {}",
                script.display(),
                err
            );
        }

        let mut command = match self.launchers.launcher_for(script).split_first() {
            Some((program, launcher_args)) => {
                let mut command = Command::new(program);
                command.args(launcher_args).arg(script);
                command
            }
            None => Command::new(script),
        };
        tracing::debug!("Launching {:?}", self.launchers.command_line(script));

        let output = command
            .env(ENV_TARGET, request.target)
            .env(ENV_RESULTS_DIR, request.results_dir)
            .env(ENV_PHASE_NAME, request.phase.name())
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| RunnerError::Spawn {
                phase: request.phase,
                path: script.to_path_buf(),
                source,
            })?;

        Ok(ProcessOutcome {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}
