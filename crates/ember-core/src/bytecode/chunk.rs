//! Chunk: encoded code, constant pool, and a run-length line table.

use core::ops::Range;

use super::opcode::{Instruction, OpCode};
use crate::{CoreError, CoreResult, Value};

/// Highest number of constants the 24-bit wide operand can address.
pub const MAX_CONSTANTS: usize = 1 << 24;

/// Last pool size for which `write_constant` still emits the narrow form.
const NARROW_CONSTANT_LIMIT: usize = 256;

/* ─────────────────────────── Table de lignes ─────────────────────────── */

/// Run-length mapping from code offset to source line.
///
/// `offsets[i]` is the first code offset of run `i` and `lines[i]` its
/// source line. Offsets are strictly increasing; a query resolves to the run
/// with the greatest start not above the queried offset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineTable {
    offsets: Vec<usize>,
    lines: Vec<u32>,
}

impl LineTable {
    /// Create an empty line table.
    pub fn new() -> Self { Self::default() }

    /// Number of runs.
    pub fn len(&self) -> usize { self.offsets.len() }

    /// Whether no run was recorded yet.
    pub fn is_empty(&self) -> bool { self.offsets.is_empty() }

    /// Line of the most recent run.
    pub fn last_line(&self) -> Option<u32> { self.lines.last().copied() }

    /// Start offsets of every run.
    pub fn offsets(&self) -> &[usize] { &self.offsets }

    /// Line of every run, co-indexed with [`LineTable::offsets`].
    pub fn lines(&self) -> &[u32] { &self.lines }

    /// Open a new run at `offset`.
    ///
    /// Callers keep offsets strictly increasing; `Chunk::write` is the only
    /// producer inside this crate.
    pub fn push(&mut self, offset: usize, line: u32) {
        debug_assert!(self.offsets.last().map_or(true, |&last| last < offset));
        self.offsets.push(offset);
        self.lines.push(line);
    }

    /// Line for `offset`, by binary search over the run starts.
    ///
    /// Knows nothing about the code length: any offset at or past the first
    /// run start resolves to some run. Use [`Chunk::line`] for a bounded query.
    pub fn lookup(&self, offset: usize) -> Option<u32> {
        let run = self.offsets.partition_point(|&start| start <= offset);
        run.checked_sub(1).map(|ix| self.lines[ix])
    }

    /// Iterate runs as `(start..end, line)`, the last run ending at `code_len`.
    pub fn runs(&self, code_len: usize) -> LineRunIter<'_> {
        LineRunIter { table: self, index: 0, code_len }
    }
}

/// Iterator returned by [`LineTable::runs`].
pub struct LineRunIter<'a> {
    table: &'a LineTable,
    index: usize,
    code_len: usize,
}

impl<'a> Iterator for LineRunIter<'a> {
    type Item = (Range<usize>, u32);

    fn next(&mut self) -> Option<Self::Item> {
        let start = *self.table.offsets.get(self.index)?;
        let line = self.table.lines[self.index];
        self.index += 1;
        let end = self.table.offsets.get(self.index).copied().unwrap_or(self.code_len);
        Some((start..end, line))
    }
}

/* ─────────────────────────── Chunk ─────────────────────────── */

/// Append-only bytecode container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Chunk {
    code: Vec<u8>,
    constants: Vec<Value>,
    lines: LineTable,
}

impl Chunk {
    /// Create an empty chunk.
    pub fn new() -> Self {
        Self {
            code: Vec::with_capacity(16),
            constants: Vec::with_capacity(4),
            lines: LineTable::new(),
        }
    }

    /// Rebuild a chunk from already validated parts (image decoding).
    pub(crate) fn from_parts(code: Vec<u8>, constants: Vec<Value>, lines: LineTable) -> Self {
        Self { code, constants, lines }
    }

    /// Encoded instruction stream.
    pub fn code(&self) -> &[u8] { &self.code }

    /// Constant pool.
    pub fn constants(&self) -> &[Value] { &self.constants }

    /// Constant at `index`, if any.
    pub fn constant(&self, index: usize) -> Option<Value> { self.constants.get(index).copied() }

    /// Line table.
    pub fn lines(&self) -> &LineTable { &self.lines }

    /// Code length in bytes.
    pub fn len(&self) -> usize { self.code.len() }

    /// Whether no byte was written.
    pub fn is_empty(&self) -> bool { self.code.is_empty() }

    /// Append a constant and return its index.
    pub fn add_constant(&mut self, value: Value) -> usize {
        self.constants.push(value);
        self.constants.len() - 1
    }

    /// Append one raw byte produced by source line `line`.
    ///
    /// A new line run starts when the code is empty or `line` differs from
    /// the line of the previous byte; otherwise the byte joins the current run.
    pub fn write(&mut self, byte: u8, line: u32) {
        if self.lines.last_line() != Some(line) {
            self.lines.push(self.code.len(), line);
        }
        self.code.push(byte);
    }

    /// Append an operand-less opcode.
    pub fn write_op(&mut self, op: OpCode, line: u32) {
        self.write(op as u8, line);
    }

    /// Append a decoded instruction, operands included.
    pub fn write_instruction(&mut self, instruction: &Instruction, line: u32) {
        let mut bytes = Vec::with_capacity(instruction.size());
        instruction.encode(&mut bytes);
        for byte in bytes {
            self.write(byte, line);
        }
    }

    /// Add `value` to the pool and emit the load that pushes it.
    ///
    /// The narrow form is used while the pool holds at most 256 entries
    /// after insertion; past that every load is wide, whatever the index.
    /// Returns the constant index.
    pub fn write_constant(&mut self, value: Value, line: u32) -> CoreResult<usize> {
        if self.constants.len() >= MAX_CONSTANTS {
            return Err(CoreError::ConstantPoolFull { limit: MAX_CONSTANTS });
        }
        let index = self.add_constant(value);
        let instruction = if self.constants.len() <= NARROW_CONSTANT_LIMIT {
            Instruction::Constant(index as u8)
        } else {
            Instruction::ConstantLong(index as u32)
        };
        self.write_instruction(&instruction, line);
        Ok(index)
    }

    /// Source line of the byte at `offset`.
    pub fn line(&self, offset: usize) -> CoreResult<u32> {
        if offset >= self.code.len() {
            return Err(CoreError::LineOutOfRange { offset, len: self.code.len() });
        }
        self.lines
            .lookup(offset)
            .ok_or(CoreError::LineOutOfRange { offset, len: self.code.len() })
    }
}
