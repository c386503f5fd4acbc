//! Error types for compilation and execution.

use std::fmt;

use thiserror::Error;

use crate::lexer::{Token, TokenKind};

/// Where a compile error points in the token stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorLocation {
    /// The error was found at end of input.
    AtEnd,
    /// The error was found at the given lexeme.
    AtLexeme(String),
    /// The scanner produced the error; the message already says what went wrong.
    Lexical,
}

impl ErrorLocation {
    pub fn of(token: &Token) -> Self {
        match token.kind {
            TokenKind::Eof => Self::AtEnd,
            TokenKind::Error => Self::Lexical,
            TokenKind::Newline => Self::AtLexeme("\\n".to_string()),
            _ => Self::AtLexeme(token.lexeme.clone()),
        }
    }
}

impl fmt::Display for ErrorLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AtEnd => write!(f, " at end"),
            Self::AtLexeme(lexeme) => write!(f, " at '{}'", lexeme),
            Self::Lexical => Ok(()),
        }
    }
}

/// A lexical or syntactic error found while compiling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[line {line}] Error{location}: {message}")]
pub struct CompileError {
    pub message: String,
    pub line: u32,
    pub location: ErrorLocation,
}

impl CompileError {
    pub fn new(message: impl Into<String>, line: u32, location: ErrorLocation) -> Self {
        Self {
            message: message.into(),
            line,
            location,
        }
    }

    pub fn at_token(token: &Token, message: impl Into<String>) -> Self {
        Self::new(message, token.line(), ErrorLocation::of(token))
    }

    pub fn line(&self) -> u32 {
        self.line
    }
}

/// Runtime errors. Every variant aborts the current execution.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("{message}")]
    TypeError { message: String, line: u32 },

    #[error("Stack underflow")]
    StackUnderflow { line: u32 },

    #[error("Unknown opcode {opcode}")]
    UnknownOpcode { opcode: u8, line: u32 },

    #[error("Undefined variable '{name}'")]
    UndefinedVariable { name: String, line: u32 },

    #[error("Invalid constant index {index}")]
    InvalidConstant { index: usize, line: u32 },

    #[error("Instruction truncated at offset {offset}")]
    Truncated { offset: usize, line: u32 },

    #[error("Failed to write output: {source}")]
    Output {
        #[source]
        source: std::io::Error,
        line: u32,
    },
}

impl RuntimeError {
    pub fn type_error(message: impl Into<String>, line: u32) -> Self {
        Self::TypeError {
            message: message.into(),
            line,
        }
    }

    pub fn stack_underflow(line: u32) -> Self {
        Self::StackUnderflow { line }
    }

    pub fn unknown_opcode(opcode: u8, line: u32) -> Self {
        Self::UnknownOpcode { opcode, line }
    }

    pub fn undefined_variable(name: impl Into<String>, line: u32) -> Self {
        Self::UndefinedVariable {
            name: name.into(),
            line,
        }
    }

    pub fn line(&self) -> u32 {
        match self {
            Self::TypeError { line, .. } => *line,
            Self::StackUnderflow { line } => *line,
            Self::UnknownOpcode { line, .. } => *line,
            Self::UndefinedVariable { line, .. } => *line,
            Self::InvalidConstant { line, .. } => *line,
            Self::Truncated { line, .. } => *line,
            Self::Output { line, .. } => *line,
        }
    }

    /// Render as a one-line diagnostic prefixed with the source line.
    pub fn report(&self) -> String {
        format!("[line {}] Runtime error: {}", self.line(), self)
    }
}

/// All diagnostics from one compile pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileErrors(pub Vec<CompileError>);

impl CompileErrors {
    pub fn iter(&self) -> std::slice::Iter<'_, CompileError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CompileErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileErrors {}

/// A unified error type for all phases.
#[derive(Debug, Error)]
pub enum ReplitError {
    #[error("{0}")]
    Compile(#[from] CompileErrors),

    #[error("{}", .0.report())]
    Runtime(#[from] RuntimeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
