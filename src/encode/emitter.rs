//! Per-function word stream.
//!
//! Each block is emitted as `OpLabel %label` followed by its instructions in
//! order. Block operands are replaced by the target block's label register on
//! the way through; the encoder itself knows nothing about blocks.

use crate::core::error::EncodeError;
use crate::ir::{Function, InstrInfo, Opcode, Operand};

use super::encoder::InstructionEncoder;
use super::words::WordSink;

/// Counts for one emitted function.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitSummary {
    pub instructions: usize,
    pub words: usize,
}

pub struct FunctionEmitter<'i, I: InstrInfo + ?Sized> {
    encoder: InstructionEncoder<'i, I>,
}

impl<'i, I: InstrInfo + ?Sized> FunctionEmitter<'i, I> {
    pub fn new(info: &'i I) -> Self {
        Self { encoder: InstructionEncoder::new(info) }
    }

    pub fn emit<S: WordSink + ?Sized>(
        &self,
        func: &Function,
        sink: &mut S,
    ) -> Result<EmitSummary, EncodeError> {
        self.emit_observed(func, sink, &mut |_, _| {})
    }

    /// Like [`emit`](Self::emit), calling `observer` with the opcode and word
    /// count of every instruction written.
    pub fn emit_observed<S: WordSink + ?Sized>(
        &self,
        func: &Function,
        sink: &mut S,
        observer: &mut dyn FnMut(Opcode, usize),
    ) -> Result<EmitSummary, EncodeError> {
        let mut summary = EmitSummary::default();
        let mut scratch: Vec<Operand> = Vec::new();

        for block in &func.blocks {
            let words = self
                .encoder
                .encode_parts(Opcode::LABEL, &[Operand::Reg(block.label)], sink)?;
            observer(Opcode::LABEL, words);
            summary.instructions += 1;
            summary.words += words;

            for inst in &block.insts {
                scratch.clear();
                scratch.extend(inst.operands.iter().map(|&op| match op {
                    Operand::Block(target) => func
                        .blocks
                        .get(target.index())
                        .map_or(op, |b| Operand::Reg(b.label)),
                    other => other,
                }));
                let words = self.encoder.encode_parts(inst.opcode, &scratch, sink)?;
                observer(inst.opcode, words);
                summary.instructions += 1;
                summary.words += words;
            }
        }

        log::debug!(
            "{}: emitted {} instructions in {} words",
            func.name,
            summary.instructions,
            summary.words
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::encoder::header_word;
    use crate::ir::{BlockId, CoreInstrTable, Instruction};

    #[test]
    fn test_blocks_become_labels() {
        let mut func = Function::new("jump");
        let entry = func.add_block("entry");
        let exit = func.add_block("exit");
        func.push(entry, Instruction::new(Opcode::BRANCH, vec![Operand::Block(exit)]));
        func.push(exit, Instruction::new(Opcode::RETURN, vec![]));

        let table = CoreInstrTable::new();
        let mut words = Vec::new();
        let summary = FunctionEmitter::new(&table).emit(&func, &mut words).unwrap();
        assert_eq!(summary, EmitSummary { instructions: 4, words: 7 });
        assert_eq!(
            words,
            vec![
                header_word(2, Opcode::LABEL),
                1,
                header_word(2, Opcode::BRANCH),
                2,
                header_word(2, Opcode::LABEL),
                2,
                header_word(1, Opcode::RETURN),
            ]
        );
    }

    #[test]
    fn test_dangling_block_reference_fails() {
        let mut func = Function::new("dangling");
        let entry = func.add_block("entry");
        func.push(entry, Instruction::new(Opcode::BRANCH, vec![Operand::Block(BlockId(9))]));

        let table = CoreInstrTable::new();
        let mut words = Vec::new();
        let err = FunctionEmitter::new(&table).emit(&func, &mut words).unwrap_err();
        assert_eq!(err, EncodeError::UnexpectedOperand { name: "OpBranch", index: 0 });
    }

    #[test]
    fn test_observer_sees_every_instruction() {
        let mut func = Function::new("ret");
        let entry = func.add_block("entry");
        func.push(entry, Instruction::new(Opcode::RETURN, vec![]));

        let table = CoreInstrTable::new();
        let mut seen = Vec::new();
        let mut words = Vec::new();
        FunctionEmitter::new(&table)
            .emit_observed(&func, &mut words, &mut |op, n| seen.push((op, n)))
            .unwrap();
        assert_eq!(seen, vec![(Opcode::LABEL, 2), (Opcode::RETURN, 1)]);
    }
}
