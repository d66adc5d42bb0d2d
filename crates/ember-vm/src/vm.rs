//! The fetch-decode-execute loop.

use core::fmt::Write;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use ember_core::{disasm::disassemble_instruction, format_value, Chunk, Instruction, OpCode, Value};
use tracing::{debug, instrument, trace, warn};

use crate::error::{ErrorKind, RuntimeError};
use crate::options::VmOptions;

/// Lifecycle of a [`Vm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmState {
    /// No run started yet.
    Idle,
    /// Inside [`Vm::interpret`].
    Running,
    /// The last run returned (successfully or not).
    Halted,
}

/// Stack-based interpreter over a borrowed [`Chunk`].
///
/// The chunk is only borrowed for the duration of one `interpret` call; the
/// VM keeps its instruction pointer and stack between runs for inspection,
/// and resets both when the next run starts.
#[derive(Debug)]
pub struct Vm {
    options: VmOptions,
    ip: usize,
    stack: Vec<Value>,
    state: VmState,
    interrupt: Arc<AtomicBool>,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    /// VM with default options.
    pub fn new() -> Self {
        Self::with_options(VmOptions::default())
    }

    /// VM with explicit options.
    pub fn with_options(options: VmOptions) -> Self {
        let capacity = options.stack_limit.min(crate::options::DEFAULT_STACK_LIMIT);
        Self {
            options,
            ip: 0,
            stack: Vec::with_capacity(capacity),
            state: VmState::Idle,
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Active options.
    pub fn options(&self) -> &VmOptions {
        &self.options
    }

    /// Current lifecycle state.
    pub fn state(&self) -> VmState {
        self.state
    }

    /// Operand stack, bottom first.
    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    /// Instruction pointer (byte offset into the last chunk run).
    pub fn ip(&self) -> usize {
        self.ip
    }

    /// Flag polled once per instruction; storing `true` stops the current
    /// run with [`ErrorKind::Interrupted`]. The flag is cleared when observed.
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    /// Run `chunk` from offset 0 until `Return`, yielding the returned value.
    #[instrument(skip_all, name = "interpret", fields(code_len = chunk.len()))]
    pub fn interpret(&mut self, chunk: &Chunk) -> Result<Value, RuntimeError> {
        self.execute(chunk, None)
    }

    /// Same as [`Vm::interpret`], appending the stack and the disassembled
    /// row of every instruction to `trace` before it executes.
    #[instrument(skip_all, name = "interpret", fields(code_len = chunk.len()))]
    pub fn interpret_traced(&mut self, chunk: &Chunk, trace: &mut String) -> Result<Value, RuntimeError> {
        self.execute(chunk, Some(trace))
    }

    fn execute(&mut self, chunk: &Chunk, trace: Option<&mut String>) -> Result<Value, RuntimeError> {
        self.ip = 0;
        self.stack.clear();
        self.state = VmState::Running;
        debug!(constants = chunk.constants().len(), "run start");

        let result = self.run(chunk, trace);
        self.state = VmState::Halted;

        match &result {
            Ok(value) => debug!(result = *value, "run finished"),
            Err(err) => warn!(error = %err, "run aborted"),
        }
        result
    }

    fn run(&mut self, chunk: &Chunk, mut trace: Option<&mut String>) -> Result<Value, RuntimeError> {
        let mut steps: u64 = 0;
        loop {
            let offset = self.ip;

            if self.interrupt.swap(false, Ordering::Relaxed) {
                return Err(fault(chunk, offset, ErrorKind::Interrupted));
            }
            if let Some(limit) = self.options.step_limit {
                if steps >= limit {
                    return Err(fault(chunk, offset, ErrorKind::StepLimit { limit }));
                }
            }
            steps += 1;

            if offset >= chunk.len() {
                return Err(fault(chunk, offset, ErrorKind::EndOfCode));
            }

            if let Some(out) = trace.as_deref_mut() {
                self.trace_row(chunk, offset, out);
            } else if self.options.trace {
                let mut row = String::new();
                self.trace_row(chunk, offset, &mut row);
                trace!(target: "ember_vm::trace", "{}", row.trim_end());
            }

            let (instruction, next) = Instruction::decode(chunk.code(), offset)
                .map_err(|e| fault(chunk, offset, ErrorKind::Malformed(e)))?;
            self.ip = next;

            match self.step(chunk, instruction) {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => {}
                Err(kind) => return Err(fault(chunk, offset, kind)),
            }
        }
    }

    /// Execute one decoded instruction; `Some` carries the value of a `Return`.
    fn step(&mut self, chunk: &Chunk, instruction: Instruction) -> Result<Option<Value>, ErrorKind> {
        match instruction {
            Instruction::Constant(ix) => {
                let value = read_constant(chunk, usize::from(ix))?;
                self.push(value)?;
            }
            Instruction::ConstantLong(ix) => {
                let value = read_constant(chunk, ix as usize)?;
                self.push(value)?;
            }
            Instruction::Add => self.binary(OpCode::Add, |a, b| a + b)?,
            Instruction::Subtract => self.binary(OpCode::Subtract, |a, b| a - b)?,
            Instruction::Multiply => self.binary(OpCode::Multiply, |a, b| a * b)?,
            Instruction::Divide => self.binary(OpCode::Divide, |a, b| a / b)?,
            Instruction::Negate => {
                let value = self.pop(OpCode::Negate)?;
                self.push(-value)?;
            }
            Instruction::Return => return self.pop(OpCode::Return).map(Some),
        }
        Ok(None)
    }

    /// Pops `b` then `a` and pushes `op(a, b)`, keeping source operand order.
    fn binary(&mut self, op: OpCode, f: impl FnOnce(Value, Value) -> Value) -> Result<(), ErrorKind> {
        if self.stack.len() < op.pops() {
            return Err(self.underflow(op));
        }
        let b = self.pop(op)?;
        let a = self.pop(op)?;
        self.push(f(a, b))
    }

    fn push(&mut self, value: Value) -> Result<(), ErrorKind> {
        if self.stack.len() >= self.options.stack_limit {
            return Err(ErrorKind::StackOverflow { limit: self.options.stack_limit });
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self, op: OpCode) -> Result<Value, ErrorKind> {
        let underflow = self.underflow(op);
        self.stack.pop().ok_or(underflow)
    }

    fn underflow(&self, op: OpCode) -> ErrorKind {
        ErrorKind::StackUnderflow { op, needed: op.pops(), found: self.stack.len() }
    }

    fn trace_row(&self, chunk: &Chunk, offset: usize, out: &mut String) {
        out.push_str("          ");
        for value in &self.stack {
            let _ = write!(out, "[ {} ]", format_value(*value));
        }
        out.push('\n');
        disassemble_instruction(chunk, offset, out);
    }
}

fn read_constant(chunk: &Chunk, index: usize) -> Result<Value, ErrorKind> {
    chunk
        .constant(index)
        .ok_or(ErrorKind::ConstantOutOfRange { index, len: chunk.constants().len() })
}

fn fault(chunk: &Chunk, offset: usize, kind: ErrorKind) -> RuntimeError {
    RuntimeError { kind, offset, line: chunk.line(offset).ok() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn chunk_of(values: &[Value], ops: &[OpCode]) -> Chunk {
        let mut chunk = Chunk::new();
        for v in values {
            chunk.write_constant(*v, 1).unwrap();
        }
        for op in ops {
            chunk.write_op(*op, 1);
        }
        chunk
    }

    #[test]
    fn state_moves_idle_running_halted() {
        let mut vm = Vm::new();
        assert_eq!(vm.state(), VmState::Idle);
        let chunk = chunk_of(&[2.0], &[OpCode::Return]);
        assert_eq!(vm.interpret(&chunk), Ok(2.0));
        assert_eq!(vm.state(), VmState::Halted);
        assert_eq!(vm.ip(), chunk.len());
    }

    #[test]
    fn multiply_multiplies() {
        let chunk = chunk_of(&[2.0, 3.0], &[OpCode::Multiply, OpCode::Return]);
        assert_eq!(Vm::new().interpret(&chunk), Ok(6.0));
    }

    #[test]
    fn stack_is_reset_between_runs() {
        let mut vm = Vm::new();
        let leftover = chunk_of(&[1.0, 2.0], &[OpCode::Return]);
        assert_eq!(vm.interpret(&leftover), Ok(2.0));
        assert_eq!(vm.stack(), &[1.0]);

        let underflow = chunk_of(&[], &[OpCode::Return]);
        let err = vm.interpret(&underflow).unwrap_err();
        assert_eq!(err.kind, ErrorKind::StackUnderflow { op: OpCode::Return, needed: 1, found: 0 });
    }

    #[test]
    fn binary_underflow_leaves_operand_in_place() {
        let mut vm = Vm::new();
        let chunk = chunk_of(&[1.0], &[OpCode::Add, OpCode::Return]);
        let err = vm.interpret(&chunk).unwrap_err();
        assert_eq!(err.kind, ErrorKind::StackUnderflow { op: OpCode::Add, needed: 2, found: 1 });
        assert_eq!(err.offset, 2);
        assert_eq!(vm.stack(), &[1.0]);
    }

    #[test]
    fn stack_limit_is_enforced() {
        let mut vm = Vm::with_options(VmOptions::default().with_stack_limit(2));
        let chunk = chunk_of(&[1.0, 2.0, 3.0], &[OpCode::Return]);
        let err = vm.interpret(&chunk).unwrap_err();
        assert_eq!(err.kind, ErrorKind::StackOverflow { limit: 2 });
        assert_eq!(err.offset, 4);
    }

    #[test]
    fn trace_shows_stack_before_each_instruction() {
        let mut chunk = Chunk::new();
        chunk.write_constant(1.2, 7).unwrap();
        chunk.write_op(OpCode::Negate, 7);
        chunk.write_op(OpCode::Return, 8);

        let mut trace = String::new();
        let result = Vm::new().interpret_traced(&chunk, &mut trace);
        assert_eq!(result, Ok(-1.2));
        let expected = "          \n\
000000 00 00           7  OP_CONSTANT         0 '1.2'\n          [ 1.2 ]\n\
000002 03              |  OP_NEGATE\n          [ -1.2 ]\n\
000003 02              8  OP_RETURN\n";
        assert_eq!(trace, expected);
    }
}
