//! Compact binary image of a chunk, for tooling that stores bytecode on disk.
//!
//! ```text
//! magic "EMBC" | version u16 | reserved u16
//! u32 n_consts | f64 * n_consts
//! u32 code_len | u8 * code_len
//! u32 n_runs   | (u32 offset, u32 line) * n_runs
//! u32 crc32 of everything above
//! ```
//!
//! All integers are little-endian.

use crate::bytecode::chunk::{Chunk, LineTable};
use crate::{ByteReader, ByteWriter, CoreError, CoreResult};

const MAGIC: &[u8; 4] = b"EMBC";
const IMAGE_VERSION: u16 = 1;

impl Chunk {
    /// Encode the chunk to a compact binary payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        w.write_bytes(MAGIC);
        w.write_u16_le(IMAGE_VERSION);
        w.write_u16_le(0); // reserved

        w.write_u32_le(self.constants().len() as u32);
        for value in self.constants() {
            w.write_f64_le(*value);
        }

        w.write_u32_le(self.code().len() as u32);
        w.write_bytes(self.code());

        let table = self.lines();
        w.write_u32_le(table.len() as u32);
        for (offset, line) in table.offsets().iter().zip(table.lines()) {
            w.write_u32_le(*offset as u32);
            w.write_u32_le(*line);
        }

        let crc = crc32fast::hash(w.as_slice());
        w.write_u32_le(crc);
        w.into_vec()
    }

    /// Decode a chunk from [`Chunk::to_bytes`] output.
    pub fn from_bytes(data: &[u8]) -> CoreResult<Self> {
        if data.len() < MAGIC.len() + 2 + 2 + 4 {
            return Err(CoreError::corrupted("image too short"));
        }

        let (payload, crc_bytes) = data.split_at(data.len() - 4);
        let found = ByteReader::new(crc_bytes).read_u32_le()?;
        let expected = crc32fast::hash(payload);
        if expected != found {
            return Err(CoreError::HashMismatch { expected, found });
        }

        let mut r = ByteReader::new(payload);
        if r.read_bytes(MAGIC.len())? != MAGIC {
            return Err(CoreError::InvalidMagic);
        }
        let version = r.read_u16_le()?;
        if version != IMAGE_VERSION {
            return Err(CoreError::UnsupportedVersion(version));
        }
        let _reserved = r.read_u16_le()?;

        let const_count = r.read_u32_le()? as usize;
        if const_count > r.remaining() / 8 {
            return Err(CoreError::corrupted("constant count exceeds payload"));
        }
        let mut constants = Vec::with_capacity(const_count);
        for _ in 0..const_count {
            constants.push(r.read_f64_le()?);
        }

        let code_len = r.read_u32_le()? as usize;
        let code = r.read_bytes(code_len)?.to_vec();

        let run_count = r.read_u32_le()? as usize;
        if run_count > r.remaining() / 8 {
            return Err(CoreError::corrupted("line run count exceeds payload"));
        }
        let mut lines = LineTable::new();
        for _ in 0..run_count {
            let offset = r.read_u32_le()? as usize;
            let line = r.read_u32_le()?;
            check_run(&lines, offset, code.len())?;
            lines.push(offset, line);
        }
        if !code.is_empty() && lines.is_empty() {
            return Err(CoreError::corrupted("code without line table"));
        }

        if r.remaining() != 0 {
            return Err(CoreError::corrupted("trailing bytes"));
        }

        Ok(Chunk::from_parts(code, constants, lines))
    }
}

fn check_run(table: &LineTable, offset: usize, code_len: usize) -> CoreResult<()> {
    if offset >= code_len {
        return Err(CoreError::corrupted("line run starts past the code"));
    }
    match table.offsets().last() {
        None if offset != 0 => Err(CoreError::corrupted("first line run must start at offset 0")),
        Some(&last) if offset <= last => Err(CoreError::corrupted("line runs out of order")),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::OpCode;
    use pretty_assertions::assert_eq;

    fn sample() -> Chunk {
        let mut chunk = Chunk::new();
        chunk.write_constant(1.2, 123).unwrap();
        chunk.write_constant(3.4, 123).unwrap();
        chunk.write_op(OpCode::Add, 124);
        chunk.write_op(OpCode::Return, 125);
        chunk
    }

    #[test]
    fn image_roundtrip() {
        let chunk = sample();
        let bytes = chunk.to_bytes();
        assert_eq!(&bytes[..4], b"EMBC");
        assert_eq!(Chunk::from_bytes(&bytes), Ok(chunk));
    }

    #[test]
    fn empty_chunk_roundtrip() {
        let chunk = Chunk::new();
        assert_eq!(Chunk::from_bytes(&chunk.to_bytes()), Ok(chunk));
    }

    #[test]
    fn flipped_byte_is_a_hash_mismatch() {
        let mut bytes = sample().to_bytes();
        bytes[10] ^= 0xFF;
        assert!(matches!(Chunk::from_bytes(&bytes), Err(CoreError::HashMismatch { .. })));
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let mut w = ByteWriter::new();
        w.write_bytes(b"NOPE");
        w.write_u16_le(IMAGE_VERSION);
        w.write_u16_le(0);
        let crc = crc32fast::hash(w.as_slice());
        w.write_u32_le(crc);
        assert_eq!(Chunk::from_bytes(w.as_slice()), Err(CoreError::InvalidMagic));
    }

    #[test]
    fn unordered_line_runs_are_rejected() {
        let mut w = ByteWriter::new();
        w.write_bytes(MAGIC);
        w.write_u16_le(IMAGE_VERSION);
        w.write_u16_le(0);
        w.write_u32_le(0);
        w.write_u32_le(2);
        w.write_bytes(&[OpCode::Add as u8, OpCode::Return as u8]);
        w.write_u32_le(2);
        for (offset, line) in [(1u32, 5u32), (0, 6)] {
            w.write_u32_le(offset);
            w.write_u32_le(line);
        }
        let crc = crc32fast::hash(w.as_slice());
        w.write_u32_le(crc);

        assert_eq!(
            Chunk::from_bytes(w.as_slice()),
            Err(CoreError::corrupted("first line run must start at offset 0"))
        );
    }

    #[test]
    fn short_input_is_rejected() {
        assert_eq!(Chunk::from_bytes(b"EMB"), Err(CoreError::corrupted("image too short")));
    }
}
