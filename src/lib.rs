//! Replit: a small dynamically-typed scripting language.
//!
//! Source text is scanned into tokens, compiled to bytecode in a single pass
//! and executed on a stack-based virtual machine.
//!
//! ```
//! let output = replit_lang::run("print 1 + 2;").unwrap();
//! assert_eq!(output, "3\n");
//! ```

pub mod bytecode;
pub mod config;
pub mod error;
pub mod lexer;
pub mod logging;
pub mod repl;
pub mod span;

use std::io::Write;

use error::ReplitError;

pub use bytecode::{InterpretResult, VM};

/// Compile and run a program, returning everything it printed.
pub fn run(source: &str) -> Result<String, ReplitError> {
    let chunk = bytecode::compile_source(source)?;
    let mut output = Vec::new();
    bytecode::VM::new().run(&chunk, &mut output)?;
    Ok(String::from_utf8_lossy(&output).into_owned())
}

/// Interpret a program on a fresh VM using the process's standard streams.
pub fn interpret(source: &str) -> InterpretResult {
    let stdout = std::io::stdout();
    let stderr = std::io::stderr();
    let mut out = stdout.lock();
    let mut err = stderr.lock();
    let result = VM::new().interpret(source, &mut out, &mut err);
    let _ = out.flush();
    result
}
