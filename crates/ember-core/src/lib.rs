//! ember-core: format de bytecode partagé
//!
//! Fournit :
//! - `Value` (un `f64` brut) + `format_value`
//! - `OpCode`, `Instruction` et la table statique des tailles d'instruction
//! - `Chunk` (code, constantes, table de lignes RLE) et son API d'émission
//! - le désassembleur textuel et le vérificateur structurel
//! - l'image binaire d'un chunk (`to_bytes` / `from_bytes`, CRC32)
//! - IO mémoire (little-endian) : `ByteWriter`, `ByteReader`
//! - Erreurs `CoreError` + alias `CoreResult<T>`
//!
//! Features :
//! - `serde` : derive (dé)sérialisation sur les structures utiles

#![deny(missing_docs)]

/* ─────────────────────────── Imports ─────────────────────────── */

use std::borrow::Cow;

use thiserror::Error;

/* ─────────────────────────── Modules publics ─────────────────────────── */

/// Primitives de bytecode (opcodes, chunk, désassembleur, image, vérification).
pub mod bytecode;

pub use bytecode::disasm;
pub use bytecode::verify;
pub use bytecode::{Chunk, Instruction, LineTable, OpCode};

/* ─────────────────────────── Valeurs ─────────────────────────── */

/// A runtime value. This core only knows raw 64-bit floats.
pub type Value = f64;

/// Render a value the way listings and traces show it (shortest round-trip form).
pub fn format_value(value: Value) -> String {
    format!("{value}")
}

/* ─────────────────────────── Résultat commun ─────────────────────────── */

/// Alias résultat commun au core.
pub type CoreResult<T> = core::result::Result<T, CoreError>;

/* ─────────────────────────── Byte Writer (LE) ─────────────────────────── */

/// Buffer d’écriture (croît automatiquement).
#[derive(Debug, Default, Clone)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    /// Crée un writer vide.
    pub fn new() -> Self { Self { buf: Vec::new() } }
    /// Accès en lecture au contenu.
    pub fn as_slice(&self) -> &[u8] { &self.buf }
    /// Récupère le buffer (consomme).
    pub fn into_vec(self) -> Vec<u8> { self.buf }
    /// Ajoute des octets bruts.
    pub fn write_bytes(&mut self, bytes: &[u8]) { self.buf.extend_from_slice(bytes); }
    /// Écrit un u16 little-endian.
    pub fn write_u16_le(&mut self, v: u16) { self.buf.extend_from_slice(&v.to_le_bytes()); }
    /// Écrit un u32 little-endian.
    pub fn write_u32_le(&mut self, v: u32) { self.buf.extend_from_slice(&v.to_le_bytes()); }
    /// Écrit un f64 little-endian.
    pub fn write_f64_le(&mut self, v: f64) { self.buf.extend_from_slice(&v.to_le_bytes()); }
}

/* ─────────────────────────── Byte Reader (LE) ─────────────────────────── */

/// Lecteur séquentiel sur un slice d’octets (helpers LE).
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    off: usize,
}

impl<'a> ByteReader<'a> {
    /// Construit un lecteur.
    pub fn new(data: &'a [u8]) -> Self { Self { data, off: 0 } }
    /// Offset courant.
    pub fn offset(&self) -> usize { self.off }
    /// Taille restante.
    pub fn remaining(&self) -> usize { self.data.len().saturating_sub(self.off) }

    /// Lit `n` octets (ou erreur si EOF).
    pub fn read_bytes(&mut self, n: usize) -> CoreResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(CoreError::UnexpectedEof { needed: n, at: self.off });
        }
        let start = self.off;
        self.off += n;
        Ok(&self.data[start..self.off])
    }

    /// Lit un u16 LE.
    pub fn read_u16_le(&mut self) -> CoreResult<u16> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    /// Lit un u32 LE.
    pub fn read_u32_le(&mut self) -> CoreResult<u32> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Lit un f64 LE.
    pub fn read_f64_le(&mut self) -> CoreResult<f64> {
        let b = self.read_bytes(8)?;
        Ok(f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
    }
}

/* ─────────────────────────── Erreurs ─────────────────────────── */

/// Erreurs de bas niveau communes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Byte with no registered opcode.
    #[error("unknown opcode {byte} at offset {offset}")]
    UnknownOpcode {
        /// Raw byte found in the code stream.
        byte: u8,
        /// Offset of that byte.
        offset: usize,
    },
    /// Instruction whose operand bytes run past the end of the code.
    #[error("truncated {opcode} at offset {offset}: needs {needed} operand byte(s), {available} left")]
    Truncated {
        /// Opcode being decoded.
        opcode: OpCode,
        /// Offset of the opcode byte.
        offset: usize,
        /// Operand bytes the opcode requires.
        needed: usize,
        /// Operand bytes actually present.
        available: usize,
    },
    /// Operand resolves past the end of the constant pool.
    #[error("constant index {index} out of range (pool holds {len})")]
    ConstantOutOfRange {
        /// Decoded index.
        index: usize,
        /// Pool size.
        len: usize,
    },
    /// The wide operand cannot address another constant.
    #[error("constant pool full ({limit} entries max)")]
    ConstantPoolFull {
        /// Maximum number of addressable constants.
        limit: usize,
    },
    /// Line query outside the written code.
    #[error("no line recorded for offset {offset} (code length {len})")]
    LineOutOfRange {
        /// Queried offset.
        offset: usize,
        /// Code length at query time.
        len: usize,
    },
    /// Magic d’image invalide (attendu `b"EMBC"`).
    #[error("invalid chunk image magic")]
    InvalidMagic,
    /// Version d’image non supportée.
    #[error("unsupported chunk image version {0}")]
    UnsupportedVersion(u16),
    /// Fin de buffer inattendue.
    #[error("unexpected EOF: need {needed} bytes at {at}")]
    UnexpectedEof {
        /// Nombre d’octets manquants.
        needed: usize,
        /// Offset où l’erreur s’est produite.
        at: usize,
    },
    /// CRC32 mismatch detected while decoding an image.
    #[error("hash mismatch (crc32): expected=0x{expected:08X}, found=0x{found:08X}")]
    HashMismatch {
        /// CRC32 recomputed from the payload.
        expected: u32,
        /// CRC32 value read from the payload.
        found: u32,
    },
    /// Données corrompues (format).
    #[error("corrupted: {0}")]
    Corrupted(Cow<'static, str>),
}

impl CoreError {
    /// Construit une erreur « corrompu ».
    pub fn corrupted(msg: impl Into<Cow<'static, str>>) -> Self { CoreError::Corrupted(msg.into()) }
}

/* ─────────────────────────── Prélude (reexports utiles) ─────────────────────────── */

/// Prélude pratique pour importer les types/funcs clés du crate.
pub mod prelude {
    /// Réexports utiles pour une importation rapide.
    pub use super::{
        bytecode::{Chunk, Instruction, LineTable, OpCode, MAX_CONSTANTS},
        format_value, ByteReader, ByteWriter, CoreError, CoreResult, Value,
    };
}

/* ─────────────────────────── Tests ─────────────────────────── */
