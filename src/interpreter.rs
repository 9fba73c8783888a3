use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::ExitCode;
use crate::builtin::BuiltinRegistry;
use crate::error::ShellError;
use crate::external::{self, SpawnedStage};
use crate::lexer;
use crate::parser::{self, Command, RedirectMode, Redirection};
use crate::session::Session;
use crate::stream::{StageInput, StageOutput, buffer_handle};
use crate::subst;

/// A shell-like interpreter: pipelines, redirection, aliases, local
/// variables and history recall over a set of built-in commands plus
/// external program execution.
///
/// The interpreter owns a [`Session`] (the variable, alias and history
/// tables, the working directory and the last exit status) and evaluates one
/// raw input line at a time.
///
/// Example
/// ```
/// use whelk::Interpreter;
/// let mut sh = Interpreter::default();
/// let code = sh.eval_line("echo hello world");
/// assert_eq!(code, 0);
/// ```
pub struct Interpreter {
    session: Session,
    builtins: BuiltinRegistry,
}

impl Interpreter {
    pub fn new() -> Self {
        Self {
            session: Session::new(),
            builtins: BuiltinRegistry::new(),
        }
    }

    /// Read-only view of the session state.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Evaluates one raw input line and returns its exit status.
    ///
    /// The resolved line (after `!!`/`!N` substitution) is what gets appended
    /// to the history, before execution, so even lines that later fail to
    /// parse are recallable. Empty input returns the previous status
    /// untouched.
    pub fn eval_line(&mut self, line: &str) -> ExitCode {
        self.eval_line_with_output(line, StageOutput::Inherit)
    }

    /// Same as [`Interpreter::eval_line`] with the pipeline's final output
    /// bound to `output` instead of the terminal.
    pub fn eval_line_with_output(&mut self, line: &str, output: StageOutput) -> ExitCode {
        if line.trim().is_empty() {
            return self.session.last_status;
        }

        let resolved = subst::substitute_history(line, &self.session.history);
        self.session.history.append(resolved.as_str());

        let status = match self.run_resolved(&resolved, output) {
            Ok(status) => status,
            Err(err) => {
                eprintln!("whelk: {err}");
                log::warn!("line failed: {err}");
                err.status()
            }
        };
        self.session.last_status = status;
        status
    }

    /// Runs newline-separated command lines non-interactively and returns the
    /// final status.
    pub fn run_script(&mut self, script: &str) -> ExitCode {
        for line in script.lines() {
            self.eval_line(line);
            if self.session.should_exit {
                break;
            }
        }
        self.session.last_status
    }

    /// Runs the interactive read-eval-print loop until `exit` or end of
    /// input. `Ctrl-C` discards the current line and re-prompts.
    pub fn repl(&mut self) -> rustyline::Result<()> {
        let mut rl = DefaultEditor::new()?;

        loop {
            match rl.readline(&self.prompt()) {
                Ok(line) => {
                    self.eval_line(&line);
                    if !line.trim().is_empty() {
                        // arrow-key recall matches the history builtin
                        if let Some(resolved) = self.session.history.last() {
                            rl.add_history_entry(resolved)?;
                        }
                    }
                    if self.session.should_exit {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err),
            }
        }

        Ok(())
    }

    fn prompt(&self) -> String {
        let face = if self.session.last_status == 0 {
            ":)"
        } else {
            ":("
        };
        format!("{} {} $ ", self.session.current_dir.display(), face)
    }

    fn run_resolved(&mut self, line: &str, output: StageOutput) -> Result<ExitCode, ShellError> {
        let tokens = lexer::tokenize(line)?;
        let tokens = subst::extract_assignments(tokens, &mut self.session);
        let tokens = subst::substitute_vars(tokens, &self.session);
        let tokens = subst::substitute_alias(tokens, &self.session);

        if tokens.is_empty() {
            return Ok(0);
        }
        log::debug!("tokens: {tokens:?}");

        let (tokens, redirection) = parser::resolve_redirection(tokens)?;
        let pipeline = parser::split_pipeline(tokens)?;
        log::debug!(
            "{} stage(s), redirected: {}",
            pipeline.len(),
            redirection.is_some()
        );

        self.execute(pipeline, redirection, output)
    }

    /// Wires up and runs every stage of the pipeline.
    ///
    /// External stages are all spawned before anything runs, builtins then
    /// execute in stage order on this thread, and finally every child is
    /// waited on. A link between two builtins is an in-memory buffer; any
    /// link touching an external process is an OS pipe. The last stage's
    /// status is the pipeline's.
    fn execute(
        &mut self,
        pipeline: Vec<Command>,
        redirection: Option<Redirection>,
        output: StageOutput,
    ) -> Result<ExitCode, ShellError> {
        let mut input = StageInput::Inherit;
        let mut final_out = Some(output);

        if let Some(redirection) = redirection {
            match redirection.mode {
                RedirectMode::Input => input = StageInput::File(redirection.file),
                _ => final_out = Some(StageOutput::File(redirection.file)),
            }
        }

        let is_builtin: Vec<bool> = pipeline
            .iter()
            .map(|command| self.builtins.contains(command.name()))
            .collect();

        let stage_count = pipeline.len();
        let mut statuses = vec![0; stage_count];
        let mut pending_builtins: Vec<(usize, Command, StageInput, StageOutput)> = Vec::new();
        let mut running: Vec<(usize, SpawnedStage)> = Vec::new();
        let mut spawn_error: Option<ShellError> = None;

        for (i, command) in pipeline.into_iter().enumerate() {
            let last = i + 1 == stage_count;

            let (stage_out, next_input) = if last {
                (
                    final_out.take().unwrap_or(StageOutput::Inherit),
                    StageInput::Inherit,
                )
            } else if is_builtin[i] && is_builtin[i + 1] {
                let handle = buffer_handle();
                (StageOutput::Buffer(handle.clone()), StageInput::Buffer(handle))
            } else {
                match os_pipe::pipe() {
                    Ok((reader, writer)) => (StageOutput::Pipe(writer), StageInput::Pipe(reader)),
                    Err(err) => {
                        spawn_error = Some(ShellError::Pipe(err));
                        break;
                    }
                }
            };

            let stage_in = std::mem::replace(&mut input, next_input);

            if is_builtin[i] {
                pending_builtins.push((i, command, stage_in, stage_out));
            } else {
                match external::spawn_stage(&command, stage_in, stage_out, &self.session) {
                    Ok(spawned) => running.push((i, spawned)),
                    Err(err) => {
                        spawn_error = Some(err);
                        break;
                    }
                }
            }
        }

        // close any pipe end still held here so children can finish
        drop(input);

        if spawn_error.is_none() {
            for (i, command, stage_in, stage_out) in pending_builtins {
                let mut reader = stage_in.into_reader();
                let mut writer = stage_out.into_writer();
                statuses[i] =
                    self.builtins
                        .run(&command.argv, &mut *reader, &mut *writer, &mut self.session);
            }
        } else {
            drop(pending_builtins);
        }

        for (i, stage) in running {
            match external::wait_stage(stage) {
                Ok(status) => statuses[i] = status,
                Err(err) => {
                    log::error!("failed waiting for child: {err}");
                    statuses[i] = 1;
                }
            }
        }

        match spawn_error {
            Some(err) => Err(err),
            None => Ok(statuses.last().copied().unwrap_or(0)),
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}
