//! Line-oriented interactive loop.
//!
//! Each input line is handed to one `interpret` call on a shared VM, so
//! globals defined on one line are visible on the next.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use colored::Colorize;
use tracing::debug;

use crate::bytecode::{InterpretResult, VM};
use crate::config::Config;

const PROMPT: &str = "> ";

pub struct Repl {
    vm: VM,
    history: Vec<String>,
    history_file: PathBuf,
}

impl Repl {
    pub fn new(config: &Config) -> Self {
        let mut repl = Self {
            vm: VM::new().with_disassembly(config.disassemble),
            history: Vec::new(),
            history_file: config.history_path.clone(),
        };
        repl.load_history();
        repl
    }

    /// Lines entered so far, including those loaded from the history file.
    pub fn history(&self) -> &[String] {
        &self.history
    }

    fn load_history(&mut self) {
        if let Ok(content) = std::fs::read_to_string(&self.history_file) {
            for line in content.lines() {
                if !line.trim().is_empty() {
                    self.history.push(line.to_string());
                }
            }
        }
        debug!(
            target: "replit::cli",
            entries = self.history.len(),
            path = %self.history_file.display(),
            "loaded history"
        );
    }

    fn save_history(&self) {
        if let Some(parent) = self.history_file.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let content = self.history.join("\n");
        if let Err(error) = std::fs::write(&self.history_file, content) {
            debug!(target: "replit::cli", %error, "could not save history");
        }
    }

    /// Read lines from `input` until end of input, `exit` or `quit`.
    pub fn run<R, W, E>(&mut self, mut input: R, out: &mut W, err: &mut E) -> io::Result<()>
    where
        R: BufRead,
        W: Write,
        E: Write,
    {
        writeln!(out, "Replit REPL")?;
        writeln!(out, "Type 'exit' or 'quit' to leave.")?;

        loop {
            write!(out, "{}", PROMPT)?;
            out.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                writeln!(out)?;
                break;
            }

            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line == "exit" || line == "quit" {
                break;
            }

            self.history.push(line.to_string());
            self.execute(line, out, err)?;
        }

        self.save_history();
        writeln!(out, "Goodbye!")?;
        Ok(())
    }

    fn execute<W: Write, E: Write>(&mut self, line: &str, out: &mut W, err: &mut E) -> io::Result<()> {
        match self.vm.interpret(line, out, err) {
            InterpretResult::Ok => {}
            InterpretResult::CompileError => writeln!(err, "{}", "Compile error".yellow())?,
            InterpretResult::RuntimeError => writeln!(err, "{}", "Runtime error".red())?,
        }
        Ok(())
    }
}

/// Run the REPL on the process's standard streams.
pub fn run_repl(config: &Config) -> io::Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let stderr = io::stderr();
    Repl::new(config).run(stdin.lock(), &mut stdout.lock(), &mut stderr.lock())
}
