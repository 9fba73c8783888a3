use std::collections::HashMap;
use std::env;
use std::fs;
use std::io::{Read, Write};
use std::marker::PhantomData;
use std::path::PathBuf;

use anyhow::{Context, Result};
use argh::{EarlyExit, FromArgs};

use crate::ExitCode;
use crate::session::Session;

/// Number of entries the `history` listing shows.
const HISTORY_WINDOW: usize = 100;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed
/// directly in-process without spawning a child process.
pub trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "echo" or "cd".
    fn name() -> &'static str;

    /// Executes the command using the provided IO streams and session.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero
    /// for error.
    fn execute(
        self,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        session: &mut Session,
    ) -> Result<ExitCode>;
}

/// Object-safe face of a builtin, dispatched by name at runtime.
///
/// Argument parsing failures and execution errors are reported here so that
/// every invocation reduces to a plain exit status.
trait BuiltinOp {
    fn invoke(
        &self,
        argv: &[String],
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        session: &mut Session,
    ) -> ExitCode;
}

struct Entry<T>(PhantomData<T>);

impl<T: BuiltinCommand> BuiltinOp for Entry<T> {
    fn invoke(
        &self,
        argv: &[String],
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        session: &mut Session,
    ) -> ExitCode {
        let args: Vec<&str> = argv.iter().skip(1).map(String::as_str).collect();
        match T::from_args(&[T::name()], &args) {
            Ok(cmd) => match cmd.execute(stdin, stdout, session) {
                Ok(status) => status,
                Err(err) => {
                    eprintln!("{err}");
                    1
                }
            },
            Err(EarlyExit { output, status }) => match status {
                Ok(()) => {
                    // help text requested with --help
                    let _ = stdout.write_all(output.as_bytes());
                    0
                }
                Err(()) => {
                    eprintln!("{output}");
                    1
                }
            },
        }
    }
}

/// Name -> operation table consulted once per pipeline stage.
pub struct BuiltinRegistry {
    ops: HashMap<&'static str, Box<dyn BuiltinOp>>,
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            ops: HashMap::new(),
        };
        registry.register::<Ls>();
        registry.register::<Cd>();
        registry.register::<Pwd>();
        registry.register::<Alias>();
        registry.register::<Unalias>();
        registry.register::<Echo>();
        registry.register::<Exit>();
        registry.register::<History>();
        registry
    }

    fn register<T: BuiltinCommand + 'static>(&mut self) {
        self.ops.insert(T::name(), Box::new(Entry::<T>(PhantomData)));
    }

    /// True when `name` runs in-process instead of being spawned.
    pub fn contains(&self, name: &str) -> bool {
        self.ops.contains_key(name)
    }

    /// Runs the named builtin with the full argv (name at position 0).
    pub fn run(
        &self,
        argv: &[String],
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        session: &mut Session,
    ) -> ExitCode {
        let Some(name) = argv.first() else {
            return 127;
        };
        match self.ops.get(name.as_str()) {
            Some(op) => op.invoke(argv, stdin, stdout, session),
            None => 127,
        }
    }
}

impl Default for BuiltinRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(FromArgs)]
/// List directory entries, one name per line, sorted.
pub struct Ls {
    #[argh(positional)]
    /// directory to list; defaults to the current working directory.
    pub path: Option<String>,
}

impl BuiltinCommand for Ls {
    fn name() -> &'static str {
        "ls"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        session: &mut Session,
    ) -> Result<ExitCode> {
        let target = match &self.path {
            Some(path) => session.current_dir.join(path),
            None => session.current_dir.clone(),
        };

        let entries =
            fs::read_dir(&target).with_context(|| format!("ls: cannot access {}", target.display()))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry =
                entry.with_context(|| format!("ls: cannot read {}", target.display()))?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();

        for name in names {
            writeln!(stdout, "{name}")?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// If no target is provided, changes to the directory named by HOME.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        session: &mut Session,
    ) -> Result<ExitCode> {
        let target = match &self.target {
            Some(t) if !t.is_empty() => PathBuf::from(t),
            _ => {
                let home = session.lookup_var("HOME");
                if home.is_empty() {
                    anyhow::bail!("cd: no target and HOME not set");
                }
                PathBuf::from(home)
            }
        };

        let new_dir = if target.is_absolute() {
            target
        } else {
            session.current_dir.join(target)
        };

        let canonical = fs::canonicalize(&new_dir)
            .with_context(|| format!("cd: can't canonicalize {}", new_dir.display()))?;

        env::set_current_dir(&canonical)
            .with_context(|| format!("cd: can't chdir to {}", canonical.display()))?;
        session.current_dir = canonical;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        session: &mut Session,
    ) -> Result<ExitCode> {
        writeln!(stdout, "{}", session.current_dir.to_string_lossy())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Define aliases or list the current ones.
/// With no arguments, prints every alias sorted by name.
pub struct Alias {
    #[argh(positional, greedy)]
    /// name=value pairs to define, or names to look up.
    pub defs: Vec<String>,
}

impl BuiltinCommand for Alias {
    fn name() -> &'static str {
        "alias"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        session: &mut Session,
    ) -> Result<ExitCode> {
        if self.defs.is_empty() {
            for (name, value) in &session.aliases {
                writeln!(stdout, "alias {name}='{value}'")?;
            }
            return Ok(0);
        }

        let mut status = 0;
        for def in self.defs {
            // the split is at the first `=`; the value may contain more
            match def.split_once('=') {
                Some((name, value)) => {
                    session.aliases.insert(name.to_string(), value.to_string());
                }
                None => match session.aliases.get(&def) {
                    Some(value) => writeln!(stdout, "alias {def}='{value}'")?,
                    None => {
                        eprintln!("alias: {def}: not found");
                        status = 1;
                    }
                },
            }
        }
        Ok(status)
    }
}

#[derive(FromArgs)]
/// Remove alias definitions.
pub struct Unalias {
    #[argh(switch, short = 'a')]
    /// remove every alias.
    pub all: bool,

    #[argh(positional, greedy)]
    /// alias names to remove.
    pub names: Vec<String>,
}

impl BuiltinCommand for Unalias {
    fn name() -> &'static str {
        "unalias"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        session: &mut Session,
    ) -> Result<ExitCode> {
        if self.all {
            session.aliases.clear();
            return Ok(0);
        }
        if self.names.is_empty() {
            anyhow::bail!("usage: unalias [-a] name...");
        }

        let mut status = 0;
        for name in self.names {
            if session.aliases.remove(&name).is_none() {
                eprintln!("unalias: {name}: not found");
                status = 1;
            }
        }
        Ok(status)
    }
}

#[derive(FromArgs)]
/// Write the arguments to standard output, separated by spaces.
/// By default, a trailing newline is printed.
pub struct Echo {
    #[argh(switch, short = 'n')]
    /// do not output the trailing newline.
    pub no_newline: bool,

    #[argh(positional, greedy)]
    /// values to print as-is, separated by spaces.
    pub args: Vec<String>,
}

impl BuiltinCommand for Echo {
    fn name() -> &'static str {
        "echo"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        _session: &mut Session,
    ) -> Result<ExitCode> {
        let joined = self.args.join(" ");
        if self.no_newline {
            write!(stdout, "{joined}")?;
        } else {
            writeln!(stdout, "{joined}")?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Announce the shutdown and leave the shell once the current line finishes.
pub struct Exit {
    #[argh(positional, greedy)]
    /// ignored; the shell always exits with the last line's status.
    pub _args: Vec<String>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        session: &mut Session,
    ) -> Result<ExitCode> {
        writeln!(stdout, "shell closed")?;
        session.should_exit = true;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Show the most recently executed lines, oldest first.
pub struct History {}

impl BuiltinCommand for History {
    fn name() -> &'static str {
        "history"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        session: &mut Session,
    ) -> Result<ExitCode> {
        for (index, line) in session.history.tail(HISTORY_WINDOW) {
            writeln!(stdout, "   {index} {line}")?;
        }
        Ok(0)
    }
}
