use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};
use crate::cancel::CancelSignal;
use crate::error::{Result, ToolError};
use crate::package::Package;

#[cfg(windows)]
pub const EXEC_EXT: &str = ".exe";
#[cfg(not(windows))]
pub const EXEC_EXT: &str = "";

/// The external build tool: compiles a package into a directory and runs
/// compiled binaries.
#[allow(async_fn_in_trait)]
pub trait Toolchain {
    /// Builds `package` into `out_dir` and returns the path of the produced
    /// (unversioned) binary.
    async fn build(&self, package: &Package, out_dir: &Path, cancel: &CancelSignal) -> Result<PathBuf>;

    /// Runs `binary` with `args`, sharing this process's stdin, stdout and stderr.
    async fn run(
        &self,
        package: &Package,
        binary: &Path,
        args: &[String],
        cancel: &CancelSignal,
    ) -> Result<()>;
}

/// [`Toolchain`] backed by `go install`.
#[derive(Debug, Clone)]
pub struct GoToolchain {
    program: PathBuf,
}

impl Default for GoToolchain {
    fn default() -> Self {
        Self::new("go")
    }
}

impl GoToolchain {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn spawn_error(&self, error: std::io::Error) -> ToolError {
        ToolError::Spawn {
            program: self.program.display().to_string(),
            error,
        }
    }
}

impl Toolchain for GoToolchain {
    async fn build(&self, package: &Package, out_dir: &Path, cancel: &CancelSignal) -> Result<PathBuf> {
        if cancel.is_cancelled() {
            return Err(ToolError::Cancelled(package.to_string()));
        }
        info!(package = %package, out_dir = %out_dir.display(), "go install");
        let child = Command::new(&self.program)
            .arg("install")
            .arg(package.to_string())
            .env("GOBIN", out_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        // dropping the wait future kills the child
        let finished = tokio::select! {
            output = child.wait_with_output() => Some(output),
            _ = cancel.cancelled() => None,
        };
        let Some(output) = finished else {
            return Err(ToolError::Cancelled(package.to_string()));
        };
        let output = output.map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            // a terminal Ctrl-C reaches the child too, which may exit first
            if cancel.is_cancelled() {
                return Err(ToolError::Cancelled(package.to_string()));
            }
            let mut diagnostics = String::from_utf8_lossy(&output.stderr).into_owned();
            diagnostics.push_str(&String::from_utf8_lossy(&output.stdout));
            return Err(ToolError::Build {
                package: package.to_string(),
                status: output.status,
                diagnostics,
            });
        }
        Ok(out_dir.join(format!("{}{}", package.command_name(), EXEC_EXT)))
    }

    async fn run(
        &self,
        package: &Package,
        binary: &Path,
        args: &[String],
        cancel: &CancelSignal,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(ToolError::Cancelled(package.to_string()));
        }
        debug!(binary = %binary.display(), ?args, "running");
        let mut child = Command::new(binary)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|error| ToolError::Spawn {
                program: binary.display().to_string(),
                error,
            })?;

        let finished = tokio::select! {
            status = child.wait() => Some(status),
            _ = cancel.cancelled() => None,
        };
        let status = match finished {
            Some(status) => status.map_err(|e| ToolError::io("wait for", binary, e))?,
            None => {
                let _ = child.kill().await;
                return Err(ToolError::Cancelled(package.to_string()));
            }
        };
        if !status.success() {
            if cancel.is_cancelled() {
                return Err(ToolError::Cancelled(package.to_string()));
            }
            return Err(ToolError::Run {
                package: package.to_string(),
                status,
            });
        }
        Ok(())
    }
}
