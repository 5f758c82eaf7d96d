// This module implements the instruction encoder. Each instruction becomes one header
// word packing the total word count in the high half and the opcode in the low half,
// followed by one word per operand. Registers are written as their dense index plus
// one, keeping zero free as the "no id" value of the format; immediates are written
// bit for bit. Instructions that define a result and take a type id as their second
// operand are stored result-first in memory but the format lists the type first, so
// operands 0 and 1 swap places on the way out. Everything is validated before the
// first word is written, so a sink never holds half an instruction.

//! Operand emitter and instruction encoder.

use crate::core::error::EncodeError;
use crate::ir::{InstrDesc, InstrInfo, Instruction, Opcode, Operand};

use super::words::WordSink;

/// Largest word count a header can carry.
pub const MAX_WORD_COUNT: usize = u16::MAX as usize;

/// Pack word count and opcode into a header word.
pub fn header_word(word_count: u16, opcode: Opcode) -> u32 {
    (u32::from(word_count) << 16) | u32::from(opcode.0)
}

/// Split a header word into word count and opcode.
pub fn split_header(word: u32) -> (u16, Opcode) {
    ((word >> 16) as u16, Opcode(word as u16))
}

/// Word form of one operand.
pub fn encode_operand(op: Operand, name: &'static str, index: usize) -> Result<u32, EncodeError> {
    match op {
        Operand::Reg(reg) => reg
            .index()
            .checked_add(1)
            .ok_or(EncodeError::RegisterOverflow { index: reg.index() }),
        Operand::Imm(value) => Ok(value),
        Operand::Block(_) => Err(EncodeError::UnexpectedOperand { name, index }),
    }
}

/// Encodes instructions against a metadata table.
pub struct InstructionEncoder<'i, I: InstrInfo + ?Sized> {
    info: &'i I,
}

impl<'i, I: InstrInfo + ?Sized> InstructionEncoder<'i, I> {
    pub fn new(info: &'i I) -> Self {
        Self { info }
    }

    /// Encode `inst` into `sink`, returning the number of words written.
    pub fn encode<S: WordSink + ?Sized>(
        &self,
        inst: &Instruction,
        sink: &mut S,
    ) -> Result<usize, EncodeError> {
        self.encode_parts(inst.opcode, &inst.operands, sink)
    }

    /// Encode an instruction given as opcode and operand list.
    pub fn encode_parts<S: WordSink + ?Sized>(
        &self,
        opcode: Opcode,
        operands: &[Operand],
        sink: &mut S,
    ) -> Result<usize, EncodeError> {
        let desc = self.info.desc(opcode).ok_or(EncodeError::UnknownOpcode { opcode })?;
        check_operand_count(desc, operands.len())?;

        let word_count = operands.len() + 1;
        if word_count > MAX_WORD_COUNT {
            return Err(EncodeError::WordCountOverflow { name: desc.name, words: word_count });
        }

        let mut words = Vec::with_capacity(word_count);
        words.push(header_word(word_count as u16, opcode));
        if desc.is_typed_result() {
            words.push(encode_operand(operands[1], desc.name, 1)?);
            words.push(encode_operand(operands[0], desc.name, 0)?);
            for (index, &op) in operands.iter().enumerate().skip(2) {
                words.push(encode_operand(op, desc.name, index)?);
            }
        } else {
            for (index, &op) in operands.iter().enumerate() {
                words.push(encode_operand(op, desc.name, index)?);
            }
        }

        log::trace!("{} -> {:08x?}", desc.name, words);
        for word in &words {
            sink.push_word(*word);
        }
        Ok(words.len())
    }
}

fn check_operand_count(desc: &InstrDesc, actual: usize) -> Result<(), EncodeError> {
    if desc.accepts(actual) {
        Ok(())
    } else {
        Err(EncodeError::OperandCountMismatch {
            name: desc.name,
            declared: desc.roles.len(),
            variadic: desc.variadic,
            actual,
        })
    }
}
