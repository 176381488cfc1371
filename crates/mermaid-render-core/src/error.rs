use std::io;
use std::path::PathBuf;
use std::time::Duration;

use mermaid_extract::FencePatternError;
use thiserror::Error;

pub const INSTALL_HINT: &str =
    "install Node.js, then run: npm install -g @mermaid-js/mermaid-cli";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    Success = 0,
    Usage = 1,
    Io = 2,
}

/// Bad invocation, detected before any work starts.
#[derive(Debug, Error)]
pub enum UsageError {
    #[error("File '{}' not found.", .0.display())]
    NotFound(PathBuf),

    #[error("Please provide a markdown file (.md extension): '{}'", .0.display())]
    WrongExtension(PathBuf),
}

/// Errors that abort the whole run.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Usage(#[from] UsageError),

    #[error("failed to read {}: {source}", .path.display())]
    ReadDocument { path: PathBuf, source: io::Error },

    #[error("failed to create output directory {}: {source}", .path.display())]
    CreateOutputDir { path: PathBuf, source: io::Error },

    #[error("invalid fence language '{language}': {source}")]
    Pattern {
        language: String,
        source: FencePatternError,
    },
}

impl ConvertError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Usage(_) => ExitCode::Usage,
            Self::ReadDocument { .. } | Self::CreateOutputDir { .. } | Self::Pattern { .. } => {
                ExitCode::Io
            }
        }
    }
}

/// Per-block failure; never aborts the run.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("renderer timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("renderer exited with {}: {stderr}", describe_exit(.code))]
    NonZeroExit { code: Option<i32>, stderr: String },

    #[error("renderer runtime not available; {hint}")]
    RuntimeUnavailable { hint: String },

    #[error("failed to launch {program}: {source}")]
    Spawn { program: String, source: io::Error },

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl RenderError {
    pub fn runtime_unavailable() -> Self {
        Self::RuntimeUnavailable {
            hint: INSTALL_HINT.to_owned(),
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "no status (terminated by signal)".to_owned(),
    }
}
