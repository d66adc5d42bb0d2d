//! Runtime failures of the interpreter and the coarse result status.

use ember_core::{CoreError, OpCode};
use thiserror::Error;

/// What went wrong while executing one instruction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorKind {
    /// An operator popped more values than the stack held.
    #[error("stack underflow: {op} needs {needed} operand(s), found {found}")]
    StackUnderflow {
        /// Operator being executed.
        op: OpCode,
        /// Operands it pops.
        needed: usize,
        /// Values present on the stack.
        found: usize,
    },

    /// A push would exceed [`crate::VmOptions::stack_limit`].
    #[error("stack overflow: limit of {limit} values reached")]
    StackOverflow {
        /// Configured limit.
        limit: usize,
    },

    /// A load resolved past the end of the constant pool.
    #[error("constant index {index} out of range (pool holds {len})")]
    ConstantOutOfRange {
        /// Decoded index.
        index: usize,
        /// Pool size.
        len: usize,
    },

    /// Unknown opcode or truncated operand.
    #[error("malformed bytecode: {0}")]
    Malformed(CoreError),

    /// The code ran out before a `Return`.
    #[error("reached end of code without OP_RETURN")]
    EndOfCode,

    /// [`crate::VmOptions::step_limit`] instructions ran without finishing.
    #[error("step budget of {limit} instructions exhausted")]
    StepLimit {
        /// Configured budget.
        limit: u64,
    },

    /// The interrupt handle was raised.
    #[error("interrupted")]
    Interrupted,
}

/// A fatal runtime error, located in the chunk.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} (offset {offset}{})", .line.map(|l| format!(", line {l}")).unwrap_or_default())]
pub struct RuntimeError {
    /// Cause.
    pub kind: ErrorKind,
    /// Offset of the instruction that failed.
    pub offset: usize,
    /// Source line of that instruction, when the line table covers it.
    pub line: Option<u32>,
}

/// Terminal status of one interpretation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpretResult {
    /// `Return` executed.
    Ok,
    /// Reserved for a front-end; never produced by this crate.
    CompileError,
    /// The run stopped on a [`RuntimeError`].
    RuntimeError,
}

impl InterpretResult {
    /// Conventional process exit code (sysexits `EX_DATAERR` / `EX_SOFTWARE`).
    pub const fn exit_code(self) -> u8 {
        match self {
            InterpretResult::Ok => 0,
            InterpretResult::CompileError => 65,
            InterpretResult::RuntimeError => 70,
        }
    }
}

impl<T> From<&Result<T, RuntimeError>> for InterpretResult {
    fn from(result: &Result<T, RuntimeError>) -> Self {
        match result {
            Ok(_) => InterpretResult::Ok,
            Err(_) => InterpretResult::RuntimeError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn display_includes_location() {
        let err = RuntimeError {
            kind: ErrorKind::StackUnderflow { op: OpCode::Return, needed: 1, found: 0 },
            offset: 0,
            line: Some(3),
        };
        assert_eq!(
            err.to_string(),
            "stack underflow: OP_RETURN needs 1 operand(s), found 0 (offset 0, line 3)"
        );
    }

    #[test]
    fn display_without_line() {
        let err = RuntimeError { kind: ErrorKind::EndOfCode, offset: 4, line: None };
        assert_eq!(err.to_string(), "reached end of code without OP_RETURN (offset 4)");
    }

    #[test]
    fn status_from_result() {
        let ok: Result<f64, RuntimeError> = Ok(1.0);
        let err: Result<f64, RuntimeError> =
            Err(RuntimeError { kind: ErrorKind::Interrupted, offset: 0, line: None });
        assert_eq!(InterpretResult::from(&ok), InterpretResult::Ok);
        assert_eq!(InterpretResult::from(&err), InterpretResult::RuntimeError);
        assert_eq!(InterpretResult::RuntimeError.exit_code(), 70);
    }
}
