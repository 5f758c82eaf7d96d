//! Binary encoding of structured functions.
//!
//! - [`words`] - word sinks and byte order
//! - [`encoder`] - operand emitter and instruction encoder
//! - [`emitter`] - per-function stream with block labels
//! - [`decoder`] - reference reader

pub mod decoder;
pub mod emitter;
pub mod encoder;
pub mod words;

pub use decoder::{decode_stream, DecodedInstruction, WordReader};
pub use emitter::{EmitSummary, FunctionEmitter};
pub use encoder::{encode_operand, header_word, split_header, InstructionEncoder};
pub use words::{bytes_to_words, write_words, words_to_bytes, Endianness, WordSink};
