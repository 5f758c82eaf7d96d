// This module defines the error types for both lowering stages using the thiserror crate.
// StructurizeError covers the structural failures: a loop whose exits share no common
// post-dominator, a conditional branch whose targets never reconverge, a switch that
// cannot be structured yet, loops missing the preheader or latch the pass relies on, and
// blocks whose terminator is not their last instruction.
// EncodeError covers defects in the instruction stream handed to the encoder: operand
// kinds the binary format cannot express, operand lists that disagree with the declared
// instruction shape, and opcodes missing from the metadata table. DecodeError is used by
// the reference reader and ParseError by the textual IR reader. CompileError wraps the
// stage errors with the name of the function being compiled. None of these are
// recoverable: callers stop and discard every buffer.

//! Error types for structurization and encoding.

use crate::ir::{BlockId, Opcode};
use thiserror::Error;

/// Failure to annotate a function's control flow.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructurizeError {
    #[error("no common post-dominator for the exits of the loop headed by {header}")]
    NoLoopMerge { header: BlockId },

    #[error("no common post-dominator for the targets of the branch in {block}")]
    NoSelectionMerge { block: BlockId },

    #[error("switch terminator in {block} cannot be structured yet")]
    UnsupportedSwitch { block: BlockId },

    #[error("loop headed by {header} has no {missing}")]
    MalformedLoop { header: BlockId, missing: &'static str },

    #[error("terminator at index {index} of {block} is not the last instruction")]
    MisplacedTerminator { block: BlockId, index: usize },
}

/// Malformed instruction stream reaching the encoder.
///
/// Every variant points at a defect in an earlier lowering stage. Callers must
/// treat it as fatal and discard everything encoded so far; the pipeline does so
/// by failing the whole module.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("opcode {opcode} is not in the instruction table")]
    UnknownOpcode { opcode: Opcode },

    #[error("{name} declares {declared} operands (variadic: {variadic}), got {actual}")]
    OperandCountMismatch {
        name: &'static str,
        declared: usize,
        variadic: bool,
        actual: usize,
    },

    #[error("operand {index} of {name} is not a register or immediate")]
    UnexpectedOperand { name: &'static str, index: usize },

    #[error("{name} needs {words} words, more than a header can count")]
    WordCountOverflow { name: &'static str, words: usize },

    #[error("register index {index} does not fit in a word")]
    RegisterOverflow { index: u32 },
}

/// Malformed word stream handed to the reader.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("header word at {offset} has a word count of zero")]
    ZeroWordCount { offset: usize },

    #[error("instruction at {offset} needs {needed} words, only {available} left")]
    Truncated { offset: usize, needed: usize, available: usize },

    #[error("byte stream length {len} is not a multiple of four")]
    UnalignedBytes { len: usize },

    #[error("bad module magic {found:#010x}")]
    BadMagic { found: u32 },

    #[error("module header needs 5 words, got {len}")]
    ShortHeader { len: usize },
}

/// Textual IR that could not be read.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

/// Error for a whole compilation run.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("structurizing {function}: {source}")]
    Structurize {
        function: String,
        #[source]
        source: StructurizeError,
    },

    #[error("encoding {function}: {source}")]
    Encode {
        function: String,
        #[source]
        source: EncodeError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Result type alias for compile operations.
pub type CompileResult<T> = Result<T, CompileError>;
