//! Opcode set, per-opcode encoded sizes and the instruction codec.
//!
//! Every byte in a chunk's code is either an opcode or one of its operand
//! bytes. `Instruction::decode` is the single reader of that layout and
//! `Instruction::encode` the single writer, so the disassembler and the VM
//! can never disagree with the emitter about operand width.

use core::fmt;

use crate::{CoreError, CoreResult};

/// Operation tag, one byte in the code stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum OpCode {
    /// Push a constant addressed by a 1-byte index.
    Constant = 0,
    /// Push a constant addressed by a 3-byte little-endian index.
    ConstantLong = 1,
    /// Pop the result and stop.
    Return = 2,
    /// Arithmetic negation of the top of stack.
    Negate = 3,
    /// `a + b`.
    Add = 4,
    /// `a - b`.
    Subtract = 5,
    /// `a * b`.
    Multiply = 6,
    /// `a / b`.
    Divide = 7,
}

impl OpCode {
    /// Every opcode, in byte order.
    pub const ALL: [OpCode; 8] = [
        OpCode::Constant,
        OpCode::ConstantLong,
        OpCode::Return,
        OpCode::Negate,
        OpCode::Add,
        OpCode::Subtract,
        OpCode::Multiply,
        OpCode::Divide,
    ];

    /// Encoded size in bytes, opcode included.
    pub const fn size(self) -> usize {
        match self {
            OpCode::Constant => 2,
            OpCode::ConstantLong => 4,
            OpCode::Return
            | OpCode::Negate
            | OpCode::Add
            | OpCode::Subtract
            | OpCode::Multiply
            | OpCode::Divide => 1,
        }
    }

    /// Listing name.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            OpCode::Constant => "OP_CONSTANT",
            OpCode::ConstantLong => "OP_CONSTANT_LONG",
            OpCode::Return => "OP_RETURN",
            OpCode::Negate => "OP_NEGATE",
            OpCode::Add => "OP_ADD",
            OpCode::Subtract => "OP_SUBTRACT",
            OpCode::Multiply => "OP_MULTIPLY",
            OpCode::Divide => "OP_DIVIDE",
        }
    }

    /// Number of operand bytes following the opcode.
    pub const fn operand_width(self) -> usize {
        self.size() - 1
    }

    /// Values this opcode pops before pushing its result.
    pub const fn pops(self) -> usize {
        match self {
            OpCode::Constant | OpCode::ConstantLong => 0,
            OpCode::Return | OpCode::Negate => 1,
            OpCode::Add | OpCode::Subtract | OpCode::Multiply | OpCode::Divide => 2,
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

impl TryFrom<u8> for OpCode {
    type Error = CoreError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        OpCode::ALL
            .get(byte as usize)
            .copied()
            .ok_or(CoreError::UnknownOpcode { byte, offset: 0 })
    }
}

/* ─────────────────────────── Table des tailles ─────────────────────────── */

const fn build_size_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < OpCode::ALL.len() {
        let op = OpCode::ALL[i];
        table[op as usize] = op.size() as u8;
        i += 1;
    }
    table
}

/// Encoded size per opcode byte; `0` marks a byte with no registered opcode.
pub static INSTRUCTION_SIZES: [u8; 256] = build_size_table();

// `ALL` must list opcodes in byte order for `TryFrom<u8>` to index it.
const _: () = {
    let mut i = 0;
    while i < OpCode::ALL.len() {
        assert!(OpCode::ALL[i] as usize == i);
        i += 1;
    }
};

/// Encoded size of the instruction starting with `byte`, if it is a known opcode.
pub fn instruction_size(byte: u8) -> Option<usize> {
    match INSTRUCTION_SIZES[byte as usize] {
        0 => None,
        n => Some(n as usize),
    }
}

/* ─────────────────────────── Instruction ─────────────────────────── */

/// One decoded instruction with its operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// Narrow constant load.
    Constant(u8),
    /// Wide constant load (24-bit index).
    ConstantLong(u32),
    /// Return.
    Return,
    /// Negate.
    Negate,
    /// Add.
    Add,
    /// Subtract.
    Subtract,
    /// Multiply.
    Multiply,
    /// Divide.
    Divide,
}

impl Instruction {
    /// Opcode tag of this instruction.
    pub const fn opcode(&self) -> OpCode {
        match self {
            Instruction::Constant(_) => OpCode::Constant,
            Instruction::ConstantLong(_) => OpCode::ConstantLong,
            Instruction::Return => OpCode::Return,
            Instruction::Negate => OpCode::Negate,
            Instruction::Add => OpCode::Add,
            Instruction::Subtract => OpCode::Subtract,
            Instruction::Multiply => OpCode::Multiply,
            Instruction::Divide => OpCode::Divide,
        }
    }

    /// Encoded size in bytes.
    pub const fn size(&self) -> usize {
        self.opcode().size()
    }

    /// Constant pool index for the two load forms.
    pub const fn constant_index(&self) -> Option<usize> {
        match *self {
            Instruction::Constant(ix) => Some(ix as usize),
            Instruction::ConstantLong(ix) => Some(ix as usize),
            _ => None,
        }
    }

    /// Append the encoded bytes to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.opcode() as u8);
        match *self {
            Instruction::Constant(ix) => out.push(ix),
            Instruction::ConstantLong(ix) => {
                let [b0, b1, b2, _] = ix.to_le_bytes();
                out.extend_from_slice(&[b0, b1, b2]);
            }
            _ => {}
        }
    }

    /// Decode the instruction at `offset`, returning it and the offset just past it.
    pub fn decode(code: &[u8], offset: usize) -> CoreResult<(Self, usize)> {
        let byte = *code
            .get(offset)
            .ok_or(CoreError::UnexpectedEof { needed: 1, at: offset })?;
        let opcode =
            OpCode::try_from(byte).map_err(|_| CoreError::UnknownOpcode { byte, offset })?;

        let width = opcode.operand_width();
        let operands = code.get(offset + 1..offset + 1 + width).ok_or(CoreError::Truncated {
            opcode,
            offset,
            needed: width,
            available: code.len().saturating_sub(offset + 1),
        })?;

        let instruction = match opcode {
            OpCode::Constant => Instruction::Constant(operands[0]),
            OpCode::ConstantLong => Instruction::ConstantLong(
                u32::from(operands[0]) | u32::from(operands[1]) << 8 | u32::from(operands[2]) << 16,
            ),
            OpCode::Return => Instruction::Return,
            OpCode::Negate => Instruction::Negate,
            OpCode::Add => Instruction::Add,
            OpCode::Subtract => Instruction::Subtract,
            OpCode::Multiply => Instruction::Multiply,
            OpCode::Divide => Instruction::Divide,
        };
        Ok((instruction, offset + opcode.size()))
    }
}
