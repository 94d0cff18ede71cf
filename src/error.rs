use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Errors produced while resolving, installing, running or evicting tools.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{file}:{line}: {message}")]
    Parse {
        file: String,
        line: usize,
        message: String,
    },

    #[error("could not find module for package {path} in the dependency manifest, it is stale (did you forget to `go mod tidy`?)")]
    Unresolved { path: String },

    #[error("failed to install {package}: {status}\n{diagnostics}")]
    Build {
        package: String,
        status: ExitStatus,
        diagnostics: String,
    },

    #[error("failed to run {package}: {status}")]
    Run { package: String, status: ExitStatus },

    #[error("failed to start {program}")]
    Spawn {
        program: String,
        #[source]
        error: io::Error,
    },

    #[error("failed to {action} {}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        error: io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{0} was cancelled")]
    Cancelled(String),
}

impl ToolError {
    pub(crate) fn parse(file: &str, line: usize, message: impl Into<String>) -> Self {
        ToolError::Parse {
            file: file.to_string(),
            line,
            message: message.into(),
        }
    }

    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, error: io::Error) -> Self {
        ToolError::Io {
            action,
            path: path.into(),
            error,
        }
    }

    /// True when the operation was interrupted rather than failing on its own.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ToolError::Cancelled(_))
    }
}

pub type Result<T> = std::result::Result<T, ToolError>;
