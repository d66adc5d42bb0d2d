//! Structural validation of a chunk before it is handed to a VM.

use crate::bytecode::chunk::Chunk;
use crate::bytecode::opcode::Instruction;
use crate::{CoreError, CoreResult};

/// Basic structural validation of a chunk.
///
/// Walks the code with the shared decoder: every byte must belong to a known
/// instruction with all of its operand bytes present, every constant load
/// must stay inside the pool, and the line table must cover offset 0.
pub fn verify_chunk(chunk: &Chunk) -> CoreResult<()> {
    if !chunk.is_empty() && chunk.lines().lookup(0).is_none() {
        return Err(CoreError::corrupted("line table does not cover offset 0"));
    }

    let code = chunk.code();
    let pool = chunk.constants().len();
    let mut offset = 0;
    while offset < code.len() {
        let (instruction, next) = Instruction::decode(code, offset)?;
        if let Some(index) = instruction.constant_index() {
            if index >= pool {
                return Err(CoreError::ConstantOutOfRange { index, len: pool });
            }
        }
        offset = next;
    }
    Ok(())
}
