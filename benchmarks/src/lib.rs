//! Générateurs de chunks partagés par les benches.

use ember_core::{Chunk, CoreResult, OpCode};

/// Folds `terms` constants with alternating add/subtract/multiply/divide and
/// returns the result; the pool crosses the wide-load threshold past 256 terms.
pub fn arithmetic_chain(terms: usize) -> CoreResult<Chunk> {
    const OPS: [OpCode; 4] = [OpCode::Add, OpCode::Subtract, OpCode::Multiply, OpCode::Divide];

    let mut chunk = Chunk::new();
    let mut line = 1;
    chunk.write_constant(1.0, line)?;
    for i in 1..terms.max(1) {
        if i % 8 == 0 {
            line += 1;
        }
        chunk.write_constant(1.0 + (i % 7) as f64, line)?;
        chunk.write_op(OPS[i % OPS.len()], line);
    }
    chunk.write_op(OpCode::Negate, line);
    chunk.write_op(OpCode::Return, line);
    Ok(chunk)
}
