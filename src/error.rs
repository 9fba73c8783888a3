use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::ExitCode;

/// Failures that abort the current input line.
///
/// Every variant is reported to the user and mapped to a shell-conventional
/// exit status; none of them terminates the interactive loop. A child that
/// runs and exits non-zero is not an error here, it is the line's status.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("\", ', and ` characters are not allowed")]
    QuoteNotAllowed,

    #[error("invalid pipeline: {0}")]
    InvalidPipeline(&'static str),

    #[error("invalid redirection: {0}")]
    InvalidRedirection(&'static str),

    #[error("cannot open {}: {source}", .path.display())]
    FileAccess { path: PathBuf, source: io::Error },

    #[error("cannot create pipe: {0}")]
    Pipe(io::Error),

    #[error("command not found: {name}")]
    CommandNotFound { name: String },

    #[error("cannot run {program}: {source}")]
    Spawn { program: String, source: io::Error },
}

impl ShellError {
    /// Status reported for a line that died on this error.
    ///
    /// Parse errors use 2, I/O failures 1, and lookup/spawn failures the
    /// usual 127/126 the way common shells report them.
    pub fn status(&self) -> ExitCode {
        match self {
            Self::QuoteNotAllowed | Self::InvalidPipeline(_) | Self::InvalidRedirection(_) => 2,
            Self::FileAccess { .. } | Self::Pipe(_) => 1,
            Self::CommandNotFound { .. } => 127,
            Self::Spawn { source, .. } if source.kind() == io::ErrorKind::PermissionDenied => 126,
            Self::Spawn { .. } => 127,
        }
    }
}
