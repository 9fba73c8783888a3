use std::fs::OpenOptions;
use std::path::PathBuf;

use anyhow::Context;
use argh::FromArgs;
use log::LevelFilter;
use simplelog::{Config, WriteLogger};

use whelk::Interpreter;

#[derive(FromArgs)]
/// An interactive command interpreter with pipelines, redirection, aliases,
/// shell-local variables and history recall.
struct Args {
    /// run the given newline-separated command lines instead of prompting
    #[argh(option, short = 'c')]
    command: Option<String>,

    /// append diagnostic logs to this file
    #[argh(option)]
    log_file: Option<PathBuf>,

    /// log filter used with --log-file (error, warn, info, debug, trace)
    #[argh(option, default = "LevelFilter::Info")]
    log_level: LevelFilter,
}

fn main() -> anyhow::Result<()> {
    let args: Args = argh::from_env();

    if let Some(path) = &args.log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("cannot open log file {}", path.display()))?;
        WriteLogger::init(args.log_level, Config::default(), file)
            .context("cannot install the logger")?;
    }

    let mut interpreter = Interpreter::new();
    match args.command {
        Some(script) => std::process::exit(interpreter.run_script(&script)),
        None => interpreter.repl().context("cannot read input")?,
    }
    Ok(())
}
