use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use crate::error::ShellError;

/// Token that separates pipeline stages.
pub const PIPE_OP: &str = "|";

/// A single pipeline stage: the command name followed by its arguments.
///
/// Invariant: `argv` is never empty, position 0 is the command name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub argv: Vec<String>,
}

impl Command {
    pub fn name(&self) -> &str {
        &self.argv[0]
    }

    pub fn args(&self) -> &[String] {
        &self.argv[1..]
    }
}

/// How the redirection target file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectMode {
    Input,
    Truncate,
    Append,
}

impl RedirectMode {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "<" => Some(RedirectMode::Input),
            ">" => Some(RedirectMode::Truncate),
            ">>" => Some(RedirectMode::Append),
            _ => None,
        }
    }
}

/// A redirection with its target already opened.
#[derive(Debug)]
pub struct Redirection {
    pub mode: RedirectMode,
    pub file: File,
}

/// Detects a trailing redirection pair, strips both tokens, and opens the
/// target file.
///
/// Only the rightmost operator counts; earlier ones remain ordinary tokens.
/// The operator must sit directly before the final token and cannot open the
/// line. Input redirection is refused when a pipe token remains, since it
/// would be ambiguous which stage reads the file.
pub fn resolve_redirection(
    mut tokens: Vec<String>,
) -> Result<(Vec<String>, Option<Redirection>), ShellError> {
    let found = tokens
        .iter()
        .enumerate()
        .rev()
        .find_map(|(pos, token)| RedirectMode::from_token(token).map(|mode| (pos, mode)));

    let Some((pos, mode)) = found else {
        return Ok((tokens, None));
    };

    if pos == 0 {
        return Err(ShellError::InvalidRedirection("no command to redirect"));
    }
    if pos + 2 != tokens.len() {
        return Err(ShellError::InvalidRedirection(
            "expected a single filename after the operator",
        ));
    }

    let path = PathBuf::from(tokens.remove(pos + 1));
    tokens.truncate(pos);

    if mode == RedirectMode::Input && tokens.iter().any(|token| token == PIPE_OP) {
        return Err(ShellError::InvalidRedirection(
            "cannot redirect input of a pipeline",
        ));
    }

    let file =
        open_target(&path, mode).map_err(|source| ShellError::FileAccess { path, source })?;
    Ok((tokens, Some(Redirection { mode, file })))
}

fn open_target(path: &Path, mode: RedirectMode) -> io::Result<File> {
    let mut options = OpenOptions::new();
    match mode {
        RedirectMode::Input => {
            options.read(true);
        }
        RedirectMode::Truncate => {
            options.write(true).create(true).truncate(true);
        }
        RedirectMode::Append => {
            options.write(true).create(true).append(true);
        }
    }
    // rw-rw-r-- when the open creates the file
    #[cfg(unix)]
    if mode != RedirectMode::Input {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o664);
    }
    options.open(path)
}

/// Splits a token sequence into pipeline stages at `|` tokens.
///
/// Every stage must be non-empty, so a pipe at either end of the line or two
/// adjacent pipes is an error.
pub fn split_pipeline(tokens: Vec<String>) -> Result<Vec<Command>, ShellError> {
    let mut stages = Vec::new();
    let mut argv = Vec::new();

    for token in tokens {
        if token == PIPE_OP {
            if argv.is_empty() {
                return Err(ShellError::InvalidPipeline(
                    "pipe without a command before it",
                ));
            }
            stages.push(Command {
                argv: std::mem::take(&mut argv),
            });
        } else {
            argv.push(token);
        }
    }

    if argv.is_empty() {
        return Err(ShellError::InvalidPipeline(
            "pipe without a command after it",
        ));
    }
    stages.push(Command { argv });

    Ok(stages)
}
