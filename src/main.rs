//! Replit CLI: Execute a file or run the REPL.

use std::env;
use std::fs;
use std::io::{self, Write};
use std::process;

use colored::Colorize;
use tracing::{debug, error};

use replit_lang::config::Config;
use replit_lang::{logging, repl, InterpretResult, VM};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// CLI command to execute.
#[derive(Debug, PartialEq, Eq)]
enum Command {
    /// Run a script file
    Run { file: String },
    /// Start the REPL
    Repl,
}

fn print_usage() {
    eprintln!("Replit {}", VERSION);
    eprintln!();
    eprintln!("Usage: replit [script]");
    eprintln!();
    eprintln!("  replit            Start interactive REPL");
    eprintln!("  replit file.rp    Run a script file");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  REPLIT_LOG            tracing filter (default: warn)");
    eprintln!("  REPLIT_DISASSEMBLE=1  print bytecode before running");
    eprintln!("  REPLIT_HISTORY        REPL history file");
    eprintln!("  NO_COLOR              disable colored output");
}

/// A single argument is always a script path; more than one is a usage error.
fn parse_args(args: &[String]) -> Option<Command> {
    match args {
        [] => Some(Command::Repl),
        [file] => Some(Command::Run { file: file.clone() }),
        _ => None,
    }
}

fn main() {
    let config = Config::from_env();
    if !config.color {
        colored::control::set_override(false);
    }
    logging::init(&config);

    let args: Vec<String> = env::args().skip(1).collect();
    let command = match parse_args(&args) {
        Some(command) => command,
        None => {
            eprintln!("{}", "Too many arguments".red());
            print_usage();
            process::exit(64);
        }
    };

    match command {
        Command::Repl => run_repl(&config),
        Command::Run { file } => run_file(&file, &config),
    }
}

fn run_file(path: &str, config: &Config) {
    debug!(target: "replit::cli", path, "running file");

    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("{} Could not read '{}': {}", "Error:".red(), path, e);
            process::exit(74);
        }
    };

    let mut vm = VM::new().with_disassembly(config.disassemble);
    let stdout = io::stdout();
    let stderr = io::stderr();
    let result = vm.interpret(&source, &mut stdout.lock(), &mut stderr.lock());
    let _ = io::stdout().flush();

    match result {
        InterpretResult::Ok => {}
        InterpretResult::CompileError => process::exit(65),
        InterpretResult::RuntimeError => process::exit(70),
    }
}

fn run_repl(config: &Config) {
    if let Err(e) = repl::run_repl(config) {
        error!(target: "replit::cli", error = %e, "REPL terminated");
        eprintln!("{} {}", "Error:".red(), e);
        process::exit(74);
    }
}
