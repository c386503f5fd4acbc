//! Stack-based virtual machine for executing bytecode.

use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::bytecode::chunk::Chunk;
use crate::bytecode::compiler::Compiler;
use crate::bytecode::disassembler::disassemble_chunk;
use crate::bytecode::instruction::OpCode;
use crate::bytecode::value::Value;
use crate::error::RuntimeError;
use crate::lexer::Scanner;

/// Result type for VM operations.
pub type VMResult<T> = Result<T, RuntimeError>;

/// Completion status of one `interpret` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpretResult {
    Ok,
    CompileError,
    RuntimeError,
}

/// The virtual machine.
///
/// A VM is built once and may run many chunks. The operand stack is reset
/// for every execution; globals survive between executions.
pub struct VM {
    /// The value stack.
    stack: Vec<Value>,
    /// Global variables.
    globals: HashMap<String, Value>,
    /// Offset of the next byte to read in the active chunk.
    ip: usize,
    /// Offset of the instruction being executed, for line lookup.
    op_start: usize,
    /// Write each compiled chunk's listing to the diagnostic stream.
    disassemble: bool,
}

impl VM {
    pub fn new() -> Self {
        Self {
            stack: Vec::with_capacity(256),
            globals: HashMap::new(),
            ip: 0,
            op_start: 0,
            disassemble: false,
        }
    }

    /// Enable or disable disassembly output in `interpret`.
    pub fn with_disassembly(mut self, enabled: bool) -> Self {
        self.disassemble = enabled;
        self
    }

    /// Lex, compile and execute one source text.
    ///
    /// PRINT output goes to `out`; diagnostics go to `err`, one per line.
    pub fn interpret(
        &mut self,
        source: &str,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> InterpretResult {
        self.stack.clear();

        let tokens = Scanner::new(source).scan_tokens();
        let mut chunk = Chunk::new();
        if let Err(errors) = Compiler::compile(&tokens, &mut chunk) {
            for error in errors.iter() {
                // A broken diagnostic stream has nowhere left to report to.
                let _ = writeln!(err, "{}", error);
            }
            return InterpretResult::CompileError;
        }

        if self.disassemble {
            let _ = write!(err, "{}", disassemble_chunk(&chunk, "script"));
        }

        match self.run(&chunk, out) {
            Ok(()) => InterpretResult::Ok,
            Err(error) => {
                let _ = writeln!(err, "{}", error.report());
                InterpretResult::RuntimeError
            }
        }
    }

    /// Execute an already-compiled chunk.
    pub fn run(&mut self, chunk: &Chunk, out: &mut dyn Write) -> VMResult<()> {
        self.stack.clear();
        self.ip = 0;
        self.op_start = 0;

        let result = self.execute(chunk, out);
        if let Err(error) = &result {
            debug!(target: "replit::vm", line = error.line(), %error, "runtime error");
            self.stack.clear();
        }
        result
    }

    /// Look up a global binding.
    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    /// Current operand stack depth.
    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    /// Main execution loop.
    fn execute(&mut self, chunk: &Chunk, out: &mut dyn Write) -> VMResult<()> {
        loop {
            self.op_start = self.ip;
            let byte = self.read_byte(chunk)?;
            let opcode = OpCode::from_u8(byte)
                .ok_or_else(|| RuntimeError::unknown_opcode(byte, self.line(chunk)))?;

            trace!(
                target: "replit::vm",
                offset = self.op_start,
                op = opcode.mnemonic(),
                depth = self.stack.len(),
                "execute"
            );

            match opcode {
                OpCode::Constant => {
                    let value = self.read_constant(chunk)?;
                    self.push(value);
                }

                OpCode::Add => {
                    let line = self.line(chunk);
                    self.binary_op(chunk, |a, b| match (a, b) {
                        (Value::Number(x), Value::Number(y)) => Ok(Value::Number(x + y)),
                        (a, b) if a.is_string() || b.is_string() => {
                            Ok(Value::String(Rc::new(format!("{}{}", a, b))))
                        }
                        _ => Err(RuntimeError::type_error("Operands must be numbers", line)),
                    })?
                }

                OpCode::Subtract => self.arithmetic_op(chunk, |x, y| x - y)?,
                OpCode::Multiply => self.arithmetic_op(chunk, |x, y| x * y)?,
                OpCode::Divide => self.arithmetic_op(chunk, |x, y| x / y)?,
                OpCode::Modulo => self.arithmetic_op(chunk, |x, y| x % y)?,

                OpCode::Negate => {
                    let value = self.pop(chunk)?;
                    match value {
                        Value::Number(n) => self.push(Value::Number(-n)),
                        _ => {
                            return Err(RuntimeError::type_error(
                                "Operand must be a number",
                                self.line(chunk),
                            ))
                        }
                    }
                }

                OpCode::Not => {
                    let value = self.pop(chunk)?;
                    self.push(Value::Bool(value.is_falsey()));
                }

                OpCode::Equal => self.binary_op(chunk, |a, b| Ok(Value::Bool(a == b)))?,
                OpCode::Greater => self.comparison_op(chunk, |x, y| x > y)?,
                OpCode::Less => self.comparison_op(chunk, |x, y| x < y)?,

                OpCode::Print => {
                    let value = self.pop(chunk)?;
                    writeln!(out, "{}", value).map_err(|source| RuntimeError::Output {
                        source,
                        line: self.line(chunk),
                    })?;
                }

                OpCode::Pop => {
                    self.pop(chunk)?;
                }

                OpCode::DefineGlobal => {
                    let name = self.read_name(chunk)?;
                    let value = self.pop(chunk)?;
                    self.globals.insert(name, value);
                }

                OpCode::GetGlobal => {
                    let name = self.read_name(chunk)?;
                    let line = self.line(chunk);
                    let value = match self.globals.get(&name) {
                        Some(value) => value.clone(),
                        None => return Err(RuntimeError::undefined_variable(name, line)),
                    };
                    self.push(value);
                }

                OpCode::SetGlobal => {
                    let name = self.read_name(chunk)?;
                    let value = self.peek(chunk, 0)?.clone();
                    let line = self.line(chunk);
                    match self.globals.get_mut(&name) {
                        Some(slot) => *slot = value,
                        None => return Err(RuntimeError::undefined_variable(name, line)),
                    }
                }

                OpCode::JumpIfFalse => {
                    let offset = self.read_u16(chunk)?;
                    if self.peek(chunk, 0)?.is_falsey() {
                        self.ip += offset as usize;
                    }
                }

                OpCode::Jump => {
                    let offset = self.read_u16(chunk)?;
                    self.ip += offset as usize;
                }

                OpCode::Loop => {
                    let offset = self.read_u16(chunk)? as usize;
                    self.ip = self.ip.checked_sub(offset).ok_or_else(|| {
                        RuntimeError::Truncated {
                            offset: self.op_start,
                            line: self.line(chunk),
                        }
                    })?;
                }

                // No calling convention exists yet.
                OpCode::Call => {
                    return Err(RuntimeError::unknown_opcode(byte, self.line(chunk)));
                }

                OpCode::Return => return Ok(()),
            }
        }
    }

    fn line(&self, chunk: &Chunk) -> u32 {
        chunk.get_line(self.op_start)
    }

    fn read_byte(&mut self, chunk: &Chunk) -> VMResult<u8> {
        let byte = chunk
            .code
            .get(self.ip)
            .copied()
            .ok_or_else(|| RuntimeError::Truncated {
                offset: self.ip,
                line: self.line(chunk),
            })?;
        self.ip += 1;
        Ok(byte)
    }

    fn read_u16(&mut self, chunk: &Chunk) -> VMResult<u16> {
        let value = chunk
            .read_u16(self.ip)
            .ok_or_else(|| RuntimeError::Truncated {
                offset: self.ip,
                line: self.line(chunk),
            })?;
        self.ip += 2;
        Ok(value)
    }

    fn read_constant(&mut self, chunk: &Chunk) -> VMResult<Value> {
        let index = self.read_byte(chunk)? as usize;
        chunk
            .constants
            .get(index)
            .cloned()
            .ok_or_else(|| RuntimeError::InvalidConstant {
                index,
                line: self.line(chunk),
            })
    }

    fn read_name(&mut self, chunk: &Chunk) -> VMResult<String> {
        match self.read_constant(chunk)? {
            Value::String(name) => Ok(name.as_ref().clone()),
            other => Err(RuntimeError::type_error(
                format!("Global name must be a string, got {}", other.type_name()),
                self.line(chunk),
            )),
        }
    }

    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn pop(&mut self, chunk: &Chunk) -> VMResult<Value> {
        let line = self.line(chunk);
        self.stack
            .pop()
            .ok_or_else(|| RuntimeError::stack_underflow(line))
    }

    fn peek(&self, chunk: &Chunk, distance: usize) -> VMResult<&Value> {
        let index = self
            .stack
            .len()
            .checked_sub(1 + distance)
            .ok_or_else(|| RuntimeError::stack_underflow(self.line(chunk)))?;
        Ok(&self.stack[index])
    }

    fn binary_op<F>(&mut self, chunk: &Chunk, op: F) -> VMResult<()>
    where
        F: FnOnce(Value, Value) -> VMResult<Value>,
    {
        let b = self.pop(chunk)?;
        let a = self.pop(chunk)?;
        let result = op(a, b)?;
        self.push(result);
        Ok(())
    }

    fn arithmetic_op<F>(&mut self, chunk: &Chunk, op: F) -> VMResult<()>
    where
        F: FnOnce(f64, f64) -> f64,
    {
        let line = self.line(chunk);
        self.binary_op(chunk, |a, b| match (a, b) {
            (Value::Number(x), Value::Number(y)) => Ok(Value::Number(op(x, y))),
            _ => Err(RuntimeError::type_error("Operands must be numbers", line)),
        })
    }

    fn comparison_op<F>(&mut self, chunk: &Chunk, op: F) -> VMResult<()>
    where
        F: FnOnce(f64, f64) -> bool,
    {
        let line = self.line(chunk);
        self.binary_op(chunk, |a, b| match (a, b) {
            (Value::Number(x), Value::Number(y)) => Ok(Value::Bool(op(x, y))),
            _ => Err(RuntimeError::type_error("Operands must be numbers", line)),
        })
    }
}

impl Default for VM {
    fn default() -> Self {
        Self::new()
    }
}
