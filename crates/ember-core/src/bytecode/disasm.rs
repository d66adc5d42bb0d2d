//! Textual disassembly of a chunk.
//!
//! Both listings walk the code with [`Instruction::decode`], advancing by
//! the decoded size. A byte with no registered opcode is rendered and
//! skipped one byte at a time so the walk can go on past it.

use core::fmt::Write;

use crate::bytecode::chunk::Chunk;
use crate::bytecode::opcode::Instruction;
use crate::{format_value, CoreError};

/// Widest instruction, in bytes; the listing reserves this many byte columns.
const BYTE_COLUMNS: usize = 4;

/// Full listing with a header, one row per instruction.
pub fn disassemble(chunk: &Chunk, title: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== {title} ===");
    let _ = writeln!(out, "OFFSET B0 B1 B2 B3 LINE   OPCODE");
    let _ = writeln!(out, "------ -- -- -- -- -----  ----------------");

    let mut offset = 0;
    while offset < chunk.len() {
        offset = disassemble_instruction(chunk, offset, &mut out);
    }
    out
}

/// Render the instruction at `offset` as one row and return the offset of the next one.
///
/// An offset at or past the end of the code renders an `<end of code>` row.
pub fn disassemble_instruction(chunk: &Chunk, offset: usize, out: &mut String) -> usize {
    let code = chunk.code();
    if offset >= code.len() {
        let _ = writeln!(out, "{offset:06} <end of code>");
        return offset + 1;
    }
    let decoded = Instruction::decode(code, offset);
    let next = match decoded {
        Ok((_, next)) => next,
        Err(CoreError::Truncated { .. }) => code.len(),
        Err(_) => offset + 1,
    };

    let _ = write!(out, "{offset:06} ");
    let raw = &code[offset..next.min(code.len())];
    for byte in raw.iter().take(BYTE_COLUMNS) {
        let _ = write!(out, "{byte:02X} ");
    }
    for _ in raw.len()..BYTE_COLUMNS {
        out.push_str("   ");
    }

    match chunk.line(offset) {
        Ok(line) if offset > 0 && chunk.line(offset - 1) == Ok(line) => out.push_str("    |  "),
        Ok(line) => {
            let _ = write!(out, "{line:5}  ");
        }
        Err(_) => out.push_str("    ?  "),
    }

    match decoded {
        Ok((instruction, _)) => render(chunk, &instruction, out),
        Err(CoreError::Truncated { opcode, .. }) => {
            let _ = write!(out, "{opcode} <truncated>");
        }
        Err(_) => {
            let _ = write!(out, "Unknown opcode: {}", code[offset]);
        }
    }
    out.push('\n');
    next
}

fn render(chunk: &Chunk, instruction: &Instruction, out: &mut String) {
    let name = instruction.opcode().mnemonic();
    match instruction.constant_index() {
        Some(index) => {
            let _ = write!(out, "{name:<16} {index:4} '{}'", show_constant(chunk, index));
        }
        None => out.push_str(name),
    }
}

fn show_constant(chunk: &Chunk, index: usize) -> String {
    chunk.constant(index).map_or_else(|| "<invalid>".into(), format_value)
}

/// One-line-per-instruction variant used by quick CLI previews.
pub fn disassemble_compact(chunk: &Chunk) -> String {
    let mut out = String::new();
    let code = chunk.code();
    let mut offset = 0;
    while offset < code.len() {
        match Instruction::decode(code, offset) {
            Ok((instruction, next)) => {
                let name = instruction.opcode().mnemonic();
                match instruction.constant_index() {
                    Some(ix) => {
                        let _ = writeln!(out, "{offset:04}: {name} {ix} ;; {}", show_constant(chunk, ix));
                    }
                    None => {
                        let _ = writeln!(out, "{offset:04}: {name}");
                    }
                }
                offset = next;
            }
            Err(CoreError::Truncated { opcode, .. }) => {
                let _ = writeln!(out, "{offset:04}: {opcode} <truncated>");
                break;
            }
            Err(_) => {
                let _ = writeln!(out, "{offset:04}: ?? 0x{:02X}", code[offset]);
                offset += 1;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::opcode::OpCode;
    use pretty_assertions::assert_eq;

    fn listing_chunk() -> Chunk {
        let mut chunk = Chunk::new();
        chunk.write_constant(1.2, 123).unwrap();
        chunk.write_constant(3.4, 124).unwrap();
        chunk.write_constant(5.6, 124).unwrap();
        chunk.write_op(OpCode::Return, 125);
        chunk
    }

    #[test]
    fn full_listing_golden() {
        let text = disassemble(&listing_chunk(), "test chunk");
        let expected = "\
=== test chunk ===
OFFSET B0 B1 B2 B3 LINE   OPCODE
------ -- -- -- -- -----  ----------------
000000 00 00         123  OP_CONSTANT         0 '1.2'
000002 00 01         124  OP_CONSTANT         1 '3.4'
000004 00 02           |  OP_CONSTANT         2 '5.6'
000006 02            125  OP_RETURN
";
        assert_eq!(text, expected);
    }

    #[test]
    fn instruction_returns_next_offset() {
        let chunk = listing_chunk();
        let mut out = String::new();
        assert_eq!(disassemble_instruction(&chunk, 0, &mut out), 2);
        assert_eq!(disassemble_instruction(&chunk, 6, &mut out), 7);
        assert_eq!(out.lines().count(), 2);
    }

    #[test]
    fn wide_constant_decodes_its_three_byte_index() {
        let mut chunk = Chunk::new();
        for i in 0..300 {
            chunk.add_constant(f64::from(i));
        }
        chunk.write_instruction(&Instruction::ConstantLong(299), 4);
        let mut out = String::new();
        let next = disassemble_instruction(&chunk, 0, &mut out);
        assert_eq!(next, 4);
        assert_eq!(out, "000000 01 2B 01 00     4  OP_CONSTANT_LONG  299 '299'\n");
    }

    #[test]
    fn unknown_opcode_advances_one_byte() {
        let mut chunk = Chunk::new();
        chunk.write(0xEE, 1);
        chunk.write(0xEF, 1);
        chunk.write_op(OpCode::Return, 2);

        let text = disassemble(&chunk, "corrupt");
        let rows = text.lines().skip(3).collect::<Vec<_>>();
        assert_eq!(
            rows,
            vec![
                "000000 EE              1  Unknown opcode: 238",
                "000001 EF              |  Unknown opcode: 239",
                "000002 02              2  OP_RETURN",
            ]
        );
    }

    #[test]
    fn truncated_operand_ends_the_walk() {
        let mut chunk = Chunk::new();
        chunk.add_constant(1.0);
        chunk.write_op(OpCode::Add, 1);
        chunk.write(OpCode::ConstantLong as u8, 1);
        chunk.write(0, 1);

        let mut out = String::new();
        let next = disassemble_instruction(&chunk, 1, &mut out);
        assert_eq!(next, chunk.len());
        assert!(out.ends_with("OP_CONSTANT_LONG <truncated>\n"), "{out}");
    }

    #[test]
    fn out_of_range_constant_is_marked() {
        let mut chunk = Chunk::new();
        chunk.write_instruction(&Instruction::Constant(3), 1);
        let compact = disassemble_compact(&chunk);
        assert_eq!(compact, "0000: OP_CONSTANT 3 ;; <invalid>\n");
    }

    #[test]
    fn compact_listing_visits_every_instruction() {
        let text = disassemble_compact(&listing_chunk());
        assert_eq!(
            text,
            "0000: OP_CONSTANT 0 ;; 1.2\n0002: OP_CONSTANT 1 ;; 3.4\n0004: OP_CONSTANT 2 ;; 5.6\n0006: OP_RETURN\n"
        );
    }

    #[test]
    fn offset_past_the_code_renders_end_marker() {
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::Return, 1);

        let mut out = String::new();
        assert_eq!(disassemble_instruction(&chunk, 1, &mut out), 2);
        assert_eq!(disassemble_instruction(&chunk, 5, &mut out), 6);
        assert_eq!(out, "000001 <end of code>\n000005 <end of code>\n");
        assert_eq!(disassemble_instruction(&Chunk::new(), 0, &mut String::new()), 1);
    }
}
