use std::{
    path::Path,
    process::{Command, Output as ProcessOutput},
};

use crate::error::{DriftError, Result};

/// Capability to execute version-control subcommands in a working directory.
///
/// The engine never talks to `git` directly; everything flows through this
/// trait so tests can substitute scripted doubles. Implementations must be
/// safe for concurrent calls against different working directories;
/// concurrent calls against the same directory are tolerated, not prevented.
pub trait Gateway: Send + Sync {
    /// Run a subcommand and return its stdout as text.
    ///
    /// A non-zero exit is an error carrying the command line and stderr.
    fn run(&self, cwd: &Path, args: &[&str]) -> Result<String>;

    /// Run a subcommand purely for its exit code.
    ///
    /// Used for probes where the exit code is the answer (e.g.
    /// `git diff --quiet`). Only a spawn failure is an error; any exit code,
    /// zero or not, is a successful probe.
    fn run_exit_code(&self, cwd: &Path, args: &[&str]) -> Result<i32>;
}

/// Production [`Gateway`] that shells out to the `git` binary.
#[derive(Debug, Clone, Default)]
pub struct GitGateway;

impl GitGateway {
    /// Create a new git gateway.
    pub fn new() -> Self {
        Self
    }

    /// Spawn `git` with the given arguments and collect its output.
    fn spawn(&self, cwd: &Path, args: &[&str]) -> Result<ProcessOutput> {
        Command::new("git")
            .current_dir(cwd)
            .args(args)
            .output()
            .map_err(|e| {
                DriftError::OperationError(format!(
                    "Failed to execute git command: git {}: {e}",
                    args.join(" ")
                ))
            })
    }
}

impl Gateway for GitGateway {
    fn run(&self, cwd: &Path, args: &[&str]) -> Result<String> {
        let output = self.spawn(cwd, args)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let command = format!("git {}", args.join(" "));
            return Err(DriftError::GitError(format!(
                "{command}: {}",
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn run_exit_code(&self, cwd: &Path, args: &[&str]) -> Result<i32> {
        let output = self.spawn(cwd, args)?;
        // Signal-terminated processes report no code; treat as a failed probe.
        Ok(output.status.code().unwrap_or(-1))
    }
}
