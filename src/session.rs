use std::collections::{BTreeMap, HashMap};
use std::env as stdenv;
use std::path::PathBuf;

use crate::ExitCode;

/// Mutable, per-process interpreter state threaded through every line.
///
/// The session contains:
/// - `locals`: shell-local variables, visible to `$name` substitution but
///   never exported to child processes.
/// - `aliases`: command-name replacements consulted against the first token.
/// - `history`: the lines executed so far, backing `!!`/`!N` recall.
/// - `current_dir`: the working directory for command execution.
/// - `last_status`: the status of the most recent line, shown in the prompt.
/// - `should_exit`: a flag that a REPL loop can check to know when to terminate.
#[derive(Debug, Clone)]
pub struct Session {
    pub locals: HashMap<String, String>,
    pub aliases: BTreeMap<String, String>,
    pub history: HistoryLog,
    pub current_dir: PathBuf,
    pub last_status: ExitCode,
    pub should_exit: bool,
}

impl Session {
    /// Capture the current process state into a fresh session.
    ///
    /// `current_dir` comes from `std::env::current_dir()`; the tables start
    /// empty and the status starts at 0.
    pub fn new() -> Self {
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            locals: HashMap::new(),
            aliases: BTreeMap::new(),
            history: HistoryLog::default(),
            current_dir,
            last_status: 0,
            should_exit: false,
        }
    }

    /// Value of `$name`: the process environment wins, then shell-locals,
    /// then the empty string.
    pub fn lookup_var(&self, name: &str) -> String {
        stdenv::var(name)
            .ok()
            .or_else(|| self.locals.get(name).cloned())
            .unwrap_or_default()
    }

    /// Set or override a shell-local variable.
    pub fn set_local(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.locals.insert(name.into(), value.into());
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Append-only log of executed lines, indexed from 1.
#[derive(Debug, Clone, Default)]
pub struct HistoryLog {
    entries: Vec<String>,
}

impl HistoryLog {
    pub fn append(&mut self, line: impl Into<String>) {
        self.entries.push(line.into());
    }

    /// Entry `index`, 1-based. Out-of-range indices (including 0) return `None`.
    pub fn get(&self, index: usize) -> Option<&str> {
        index
            .checked_sub(1)
            .and_then(|i| self.entries.get(i))
            .map(String::as_str)
    }

    pub fn last(&self) -> Option<&str> {
        self.entries.last().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The most recent `count` entries with their 1-based indices, oldest first.
    pub fn tail(&self, count: usize) -> impl Iterator<Item = (usize, &str)> {
        let skip = self.entries.len().saturating_sub(count);
        self.entries
            .iter()
            .enumerate()
            .skip(skip)
            .map(|(i, line)| (i + 1, line.as_str()))
    }
}
