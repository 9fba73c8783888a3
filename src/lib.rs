//! An interactive command interpreter: pipelines, I/O redirection, aliases,
//! shell-local variables and history recall.
//!
//! Each input line flows through history substitution, tokenization, the
//! substitution passes, redirection resolution and pipeline splitting before
//! the orchestrator runs its stages: built-ins in-process with their streams
//! rebound, everything else as child processes connected by OS pipes. The
//! main entry point is [`Interpreter`], which owns the session state (local
//! variables, aliases, history, working directory) and evaluates one line at
//! a time. See [`Interpreter::eval_line`] for the per-line contract and
//! [`Interpreter::repl`] for the interactive loop.

mod builtin;
mod error;
mod external;
mod interpreter;
mod lexer;
mod parser;
pub mod session;
pub mod stream;
mod subst;
#[cfg(test)]
mod testsupport;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// Just a convenient re-export of the interactive command runner.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::Interpreter;
