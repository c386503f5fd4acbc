//! Bytecode disassembler for debugging.

use std::fmt::{self, Write};

use crate::bytecode::chunk::Chunk;
use crate::bytecode::instruction::OpCode;

/// Disassemble a chunk into human-readable output.
pub fn disassemble_chunk(chunk: &Chunk, name: &str) -> String {
    let mut output = String::new();
    // Writing into a String cannot fail.
    let _ = write_chunk(chunk, name, &mut output);
    output
}

fn write_chunk(chunk: &Chunk, name: &str, output: &mut String) -> fmt::Result {
    writeln!(output, "== {} ==", name)?;
    if chunk.is_empty() {
        writeln!(output, "(empty)")?;
    }

    let mut offset = 0;
    while offset < chunk.code.len() {
        offset = write_instruction(chunk, offset, output)?;
    }
    Ok(())
}

/// Write a single instruction, returning the offset of the next one.
fn write_instruction(chunk: &Chunk, offset: usize, output: &mut String) -> Result<usize, fmt::Error> {
    write!(output, "{:04} ", offset)?;

    // Line number, or | if same as previous
    let line = chunk.get_line(offset);
    if offset > 0 && line == chunk.get_line(offset - 1) {
        write!(output, "   | ")?;
    } else {
        write!(output, "{:4} ", line)?;
    }

    let byte = chunk.code[offset];
    let opcode = match OpCode::from_u8(byte) {
        Some(op) => op,
        None => {
            writeln!(output, "Unknown opcode {}", byte)?;
            return Ok(offset + 1);
        }
    };

    let name = opcode.mnemonic();
    let next = offset + 1 + opcode.operand_size();

    match opcode.operand_size() {
        0 => writeln!(output, "{}", name)?,

        1 => match chunk.code.get(offset + 1) {
            None => writeln!(output, "{:<16} <truncated>", name)?,
            Some(&operand) => match opcode {
                OpCode::Constant
                | OpCode::DefineGlobal
                | OpCode::GetGlobal
                | OpCode::SetGlobal => match chunk.constants.get(operand as usize) {
                    Some(value) if value.is_string() && opcode != OpCode::Constant => {
                        writeln!(output, "{:<16} {:4} {}", name, operand, value)?
                    }
                    Some(value) if value.is_string() => {
                        writeln!(output, "{:<16} {:4} \"{}\"", name, operand, value)?
                    }
                    Some(value) => writeln!(output, "{:<16} {:4} {}", name, operand, value)?,
                    None => writeln!(output, "{:<16} {:4} (invalid)", name, operand)?,
                },
                _ => writeln!(output, "{:<16} {:4}", name, operand)?,
            },
        },

        _ => match chunk.read_u16(offset + 1) {
            None => writeln!(output, "{:<16} <truncated>", name)?,
            Some(jump) => {
                let jump = jump as usize;
                if opcode == OpCode::Loop {
                    match next.checked_sub(jump) {
                        Some(target) => {
                            writeln!(output, "{:<16} {:4} -> {}", name, jump, target)?
                        }
                        None => writeln!(output, "{:<16} {:4} -> (invalid)", name, jump)?,
                    }
                } else {
                    writeln!(output, "{:<16} {:4} -> {}", name, jump, next + jump)?
                }
            }
        },
    }

    Ok(next.min(chunk.code.len()))
}
