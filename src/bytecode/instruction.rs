//! Bytecode instruction definitions for the Replit VM.

/// Opcodes for the bytecode virtual machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    // ============ Constants & Stack ============
    /// Load a constant from the constant pool: CONSTANT <index:u8>
    Constant = 0,

    // ============ Arithmetic ============
    /// Add two values, or concatenate when either is a string: a + b
    Add,
    /// Subtract two numbers: a - b
    Subtract,
    /// Multiply two numbers: a * b
    Multiply,
    /// Divide two numbers: a / b
    Divide,
    /// Floating-point remainder: a % b
    Modulo,
    /// Negate a number: -a
    Negate,

    // ============ Logic & Comparison ============
    /// Logical not using the falsiness rule: !a
    Not,
    /// Structural equality: a == b
    Equal,
    /// Numeric greater-than: a > b
    Greater,
    /// Numeric less-than: a < b
    Less,

    // ============ Statements ============
    /// Pop and print the top of the stack followed by a line break
    Print,
    /// Pop the top value from the stack
    Pop,

    // ============ Globals ============
    /// Define a global from the top of the stack: DEFINE_GLOBAL <name_index:u8>
    DefineGlobal,
    /// Push a global's value: GET_GLOBAL <name_index:u8>
    GetGlobal,
    /// Assign an existing global, leaving the value on the stack: SET_GLOBAL <name_index:u8>
    SetGlobal,

    // ============ Control Flow ============
    /// Jump forward if the top of the stack is falsey (no pop): JUMP_IF_FALSE <offset:u16>
    JumpIfFalse,
    /// Unconditional forward jump: JUMP <offset:u16>
    Jump,
    /// Jump backward: LOOP <offset:u16>
    Loop,

    // ============ Functions ============
    /// Call a function: CALL <arg_count:u8>. Reserved; never emitted.
    Call,
    /// Halt the current execution
    Return,
}

impl OpCode {
    /// Get the number of operand bytes for this opcode.
    pub fn operand_size(self) -> usize {
        match self {
            // No operands
            OpCode::Add
            | OpCode::Subtract
            | OpCode::Multiply
            | OpCode::Divide
            | OpCode::Modulo
            | OpCode::Negate
            | OpCode::Not
            | OpCode::Equal
            | OpCode::Greater
            | OpCode::Less
            | OpCode::Print
            | OpCode::Pop
            | OpCode::Return => 0,

            // 1 byte operand
            OpCode::Constant
            | OpCode::DefineGlobal
            | OpCode::GetGlobal
            | OpCode::SetGlobal
            | OpCode::Call => 1,

            // 2 byte operand
            OpCode::JumpIfFalse | OpCode::Jump | OpCode::Loop => 2,
        }
    }

    /// Convert from u8 to OpCode.
    pub fn from_u8(byte: u8) -> Option<OpCode> {
        if byte <= OpCode::Return as u8 {
            // SAFETY: `OpCode` is `repr(u8)` with contiguous discriminants
            // from 0 through `Return`.
            Some(unsafe { std::mem::transmute::<u8, OpCode>(byte) })
        } else {
            None
        }
    }

    /// Upper-case mnemonic used in disassembly.
    pub fn mnemonic(self) -> &'static str {
        match self {
            OpCode::Constant => "CONSTANT",
            OpCode::Add => "ADD",
            OpCode::Subtract => "SUBTRACT",
            OpCode::Multiply => "MULTIPLY",
            OpCode::Divide => "DIVIDE",
            OpCode::Modulo => "MODULO",
            OpCode::Negate => "NEGATE",
            OpCode::Not => "NOT",
            OpCode::Equal => "EQUAL",
            OpCode::Greater => "GREATER",
            OpCode::Less => "LESS",
            OpCode::Print => "PRINT",
            OpCode::Pop => "POP",
            OpCode::DefineGlobal => "DEFINE_GLOBAL",
            OpCode::GetGlobal => "GET_GLOBAL",
            OpCode::SetGlobal => "SET_GLOBAL",
            OpCode::JumpIfFalse => "JUMP_IF_FALSE",
            OpCode::Jump => "JUMP",
            OpCode::Loop => "LOOP",
            OpCode::Call => "CALL",
            OpCode::Return => "RETURN",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_roundtrip() {
        for i in 0..=OpCode::Return as u8 {
            let op = OpCode::from_u8(i).expect("valid opcode");
            assert_eq!(i, op as u8);
        }
    }

    #[test]
    fn test_invalid_opcode() {
        assert!(OpCode::from_u8(OpCode::Return as u8 + 1).is_none());
        assert!(OpCode::from_u8(255).is_none());
    }

    #[test]
    fn test_operand_sizes() {
        assert_eq!(OpCode::Constant.operand_size(), 1);
        assert_eq!(OpCode::Loop.operand_size(), 2);
        assert_eq!(OpCode::Print.operand_size(), 0);
    }
}
