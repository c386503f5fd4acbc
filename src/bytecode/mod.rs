//! Bytecode module for the Replit VM.
//!
//! Source text is compiled straight to bytecode in a single pass and then
//! executed by a stack machine.
//!
//! # Architecture
//!
//! - `instruction`: OpCode definitions for the bytecode instruction set
//! - `value`: Dynamically-tagged runtime values
//! - `chunk`: Bytecode chunks containing instructions and constant pools
//! - `compiler`: Parses tokens and emits bytecode in the same pass
//! - `vm`: Stack-based virtual machine for executing bytecode
//! - `disassembler`: Debug output for bytecode inspection

pub mod chunk;
pub mod compiler;
pub mod disassembler;
pub mod instruction;
pub mod value;
pub mod vm;

pub use chunk::Chunk;
pub use compiler::{compile_source, Compiler};
pub use disassembler::disassemble_chunk;
pub use instruction::OpCode;
pub use value::Value;
pub use vm::{InterpretResult, VM};
