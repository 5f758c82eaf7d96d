//! Reference reader for encoded streams.
//!
//! Walks header words, hands back each instruction's operand words and, for
//! typed-result opcodes, restores the in-memory order `[result, type, args..]`.
//! Used by the tests and the CLI dump; it does not rebuild blocks.

use crate::core::error::DecodeError;
use crate::ir::{InstrInfo, Opcode};

use super::encoder::split_header;

/// One instruction read back from a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedInstruction {
    /// Word offset of the header within the stream.
    pub offset: usize,
    pub opcode: Opcode,
    /// Operand words in MC order.
    pub operands: Vec<u32>,
}

/// Iterator over raw `(offset, opcode, operand words)` in wire order.
pub struct WordReader<'w> {
    words: &'w [u32],
    pos: usize,
}

impl<'w> WordReader<'w> {
    pub fn new(words: &'w [u32]) -> Self {
        Self { words, pos: 0 }
    }
}

impl<'w> Iterator for WordReader<'w> {
    type Item = Result<(usize, Opcode, &'w [u32]), DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.pos;
        let &header = self.words.get(offset)?;
        let (count, opcode) = split_header(header);
        let count = count as usize;
        if count == 0 {
            self.pos = self.words.len();
            return Some(Err(DecodeError::ZeroWordCount { offset }));
        }
        let available = self.words.len() - offset;
        if count > available {
            self.pos = self.words.len();
            return Some(Err(DecodeError::Truncated { offset, needed: count, available }));
        }
        self.pos += count;
        Some(Ok((offset, opcode, &self.words[offset + 1..offset + count])))
    }
}

/// Decode a whole stream, undoing the typed-result reordering.
pub fn decode_stream<I: InstrInfo + ?Sized>(
    words: &[u32],
    info: &I,
) -> Result<Vec<DecodedInstruction>, DecodeError> {
    WordReader::new(words)
        .map(|item| {
            let (offset, opcode, wire) = item?;
            let mut operands = wire.to_vec();
            if info.is_typed_result(opcode) && operands.len() >= 2 {
                operands.swap(0, 1);
            }
            Ok(DecodedInstruction { offset, opcode, operands })
        })
        .collect()
}
