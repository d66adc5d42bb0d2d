//! ember-vm: interpréteur de bytecode Ember
//!
//! Exécute un [`Chunk`] produit par `ember-core` :
//! - `Vm` : pointeur d'instruction + pile d'opérandes (`f64`), réinitialisés à chaque run
//! - `VmOptions` : trace par instruction, limite de pile, budget d'instructions
//! - `RuntimeError` / `ErrorKind` : underflow, bytecode malformé, constante hors pool…
//! - `InterpretResult` : statut terminal (`Ok`, `CompileError` réservé, `RuntimeError`)
//!
//! Les événements passent par `tracing` (pas de subscriber ici) : `debug` au
//! début/fin de run, `trace` par instruction quand `VmOptions::trace` est actif.
//!
//! ```
//! use ember_core::{Chunk, OpCode};
//!
//! let mut chunk = Chunk::new();
//! chunk.write_constant(8.0, 1).unwrap();
//! chunk.write_constant(2.0, 1).unwrap();
//! chunk.write_op(OpCode::Divide, 1);
//! chunk.write_op(OpCode::Return, 1);
//!
//! assert_eq!(ember_vm::interpret(&chunk), Ok(4.0));
//! ```

#![deny(missing_docs)]

mod error;
mod options;
mod vm;

pub use error::{ErrorKind, InterpretResult, RuntimeError};
pub use options::{VmOptions, DEFAULT_STACK_LIMIT};
pub use vm::{Vm, VmState};

use ember_core::{Chunk, Value};

/// Interpret `chunk` on a fresh VM with default options.
pub fn interpret(chunk: &Chunk) -> Result<Value, RuntimeError> {
    Vm::new().interpret(chunk)
}
