//! Bytecode chunk containing instructions, constants and line information.

use crate::bytecode::instruction::OpCode;
use crate::bytecode::value::Value;

/// Largest constant pool a chunk can address with a one-byte operand.
pub const MAX_CONSTANTS: usize = u8::MAX as usize + 1;

/// A chunk of bytecode: built once by the compiler, then only read by the VM.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// The bytecode instructions and their operand bytes.
    pub code: Vec<u8>,
    /// Source line for every byte in `code`.
    pub lines: Vec<u32>,
    /// The constant pool.
    pub constants: Vec<Value>,
}

impl Chunk {
    pub fn new() -> Self {
        Self {
            code: Vec::new(),
            lines: Vec::new(),
            constants: Vec::new(),
        }
    }

    /// Write an opcode to the chunk.
    pub fn write_op(&mut self, op: OpCode, line: u32) {
        self.code.push(op as u8);
        self.lines.push(line);
    }

    /// Write a raw byte to the chunk.
    pub fn write_byte(&mut self, byte: u8, line: u32) {
        self.code.push(byte);
        self.lines.push(line);
    }

    /// Write a 16-bit value to the chunk (little-endian).
    pub fn write_u16(&mut self, value: u16, line: u32) {
        self.write_byte((value & 0xff) as u8, line);
        self.write_byte((value >> 8) as u8, line);
    }

    /// Read a 16-bit value from the chunk at offset.
    pub fn read_u16(&self, offset: usize) -> Option<u16> {
        let lo = *self.code.get(offset)? as u16;
        let hi = *self.code.get(offset + 1)? as u16;
        Some(lo | (hi << 8))
    }

    /// Overwrite the 16-bit value at `offset`.
    pub fn patch_u16(&mut self, offset: usize, value: u16) {
        self.code[offset] = (value & 0xff) as u8;
        self.code[offset + 1] = (value >> 8) as u8;
    }

    /// Append a constant to the pool and return its index. No deduplication.
    pub fn add_constant(&mut self, value: Value) -> usize {
        self.constants.push(value);
        self.constants.len() - 1
    }

    /// Get the current offset in the code.
    pub fn current_offset(&self) -> usize {
        self.code.len()
    }

    /// Get the line number at a given offset.
    pub fn get_line(&self, offset: usize) -> u32 {
        self.lines.get(offset).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }
}

impl Default for Chunk {
    fn default() -> Self {
        Self::new()
    }
}
