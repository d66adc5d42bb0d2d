//! Bytecode helpers (opcodes, chunk structure, disassembly, image, validation).

/// Opcode set, size table and instruction codec.
pub mod opcode;
/// Chunk representation plus its line table.
pub mod chunk;
/// Textual listings.
pub mod disasm;
/// Binary image (`to_bytes` / `from_bytes`).
pub mod image;
/// Structural validation.
pub mod verify;

pub use chunk::{Chunk, LineRunIter, LineTable, MAX_CONSTANTS};
pub use opcode::{instruction_size, Instruction, OpCode, INSTRUCTION_SIZES};
