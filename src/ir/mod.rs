//! Register-based machine IR consumed by the structurizer and the encoder.
//!
//! A [`Function`] owns its blocks, a block owns its instructions, and every
//! cross reference (terminator targets, merge annotations, analyses) goes
//! through a [`BlockId`] index so nothing needs to hold a borrow into the
//! function while it is being mutated.
//!
//! Operands are stored in MC order: an instruction that defines a result keeps
//! it in operand 0 even when the binary format wants the type id first. The
//! reordering happens only at encode time.

pub mod instr_info;
pub mod opcode;

pub use instr_info::{CoreInstrTable, InstrDesc, InstrInfo, OperandRole};
pub use opcode::{LoopControl, Opcode, SelectionControl, TerminatorKind};

use std::fmt;

/// Index of a block inside its function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

impl BlockId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// Virtual register with a dense, zero-based index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VReg(pub u32);

impl VReg {
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for VReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    Reg(VReg),
    Imm(u32),
    /// Block reference; resolved to the block's label register before encoding.
    Block(BlockId),
}

impl Operand {
    pub fn as_block(self) -> Option<BlockId> {
        match self {
            Operand::Block(block) => Some(block),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operands: Vec<Operand>,
}

impl Instruction {
    pub fn new(opcode: Opcode, operands: Vec<Operand>) -> Self {
        Self { opcode, operands }
    }

    /// `OpLoopMerge merge continue control`.
    pub fn loop_merge(merge: BlockId, continue_target: BlockId, control: LoopControl) -> Self {
        Self::new(
            Opcode::LOOP_MERGE,
            vec![
                Operand::Block(merge),
                Operand::Block(continue_target),
                Operand::Imm(control.0),
            ],
        )
    }

    /// `OpSelectionMerge merge control`.
    pub fn selection_merge(merge: BlockId, control: SelectionControl) -> Self {
        Self::new(
            Opcode::SELECTION_MERGE,
            vec![Operand::Block(merge), Operand::Imm(control.0)],
        )
    }

    pub fn terminator_kind(&self) -> Option<TerminatorKind> {
        TerminatorKind::classify(self.opcode)
    }

    /// Branch targets in operand order. Empty for non-terminators, so merge
    /// annotations never contribute CFG edges.
    pub fn targets(&self) -> impl Iterator<Item = BlockId> + '_ {
        let is_branch = matches!(
            self.terminator_kind(),
            Some(TerminatorKind::Branch | TerminatorKind::BranchConditional | TerminatorKind::Switch)
        );
        self.operands
            .iter()
            .filter(move |_| is_branch)
            .filter_map(|op| op.as_block())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicBlock {
    pub name: String,
    /// Result id the block is known by in the binary stream.
    pub label: VReg,
    pub insts: Vec<Instruction>,
}

impl BasicBlock {
    /// Position of the block's terminator. A block holds at most one, and it is
    /// always the last instruction.
    pub fn terminator_index(&self) -> Option<usize> {
        let last = self.insts.len().checked_sub(1)?;
        self.insts[last].terminator_kind().map(|_| last)
    }

    pub fn terminator(&self) -> Option<&Instruction> {
        self.terminator_index().map(|idx| &self.insts[idx])
    }

    pub fn terminator_kind(&self) -> Option<TerminatorKind> {
        self.terminator().and_then(Instruction::terminator_kind)
    }

    /// Index of the first terminator that is followed by another instruction.
    pub fn misplaced_terminator(&self) -> Option<usize> {
        let body = self.insts.len().saturating_sub(1);
        self.insts[..body].iter().position(|inst| inst.terminator_kind().is_some())
    }

    /// Insert `inst` directly before the terminator, or append it when the block
    /// falls through.
    pub fn insert_before_terminator(&mut self, inst: Instruction) {
        match self.terminator_index() {
            Some(idx) => self.insts.insert(idx, inst),
            None => self.insts.push(inst),
        }
    }

    /// The merge annotation this block already carries, if any.
    pub fn merge_annotation(&self) -> Option<&Instruction> {
        self.insts.iter().find(|inst| inst.opcode.is_merge())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    pub blocks: Vec<BasicBlock>,
    next_vreg: u32,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), blocks: Vec::new(), next_vreg: 0 }
    }

    pub fn entry(&self) -> BlockId {
        BlockId(0)
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> {
        (0..self.blocks.len() as u32).map(BlockId)
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.index()]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id.index()]
    }

    /// Allocate a fresh virtual register.
    pub fn new_vreg(&mut self) -> VReg {
        let reg = VReg(self.next_vreg);
        self.next_vreg += 1;
        reg
    }

    /// Number of virtual registers handed out so far, labels included.
    pub fn vreg_count(&self) -> u32 {
        self.next_vreg
    }

    /// Make sure registers below `count` are never handed out again.
    pub fn reserve_vregs(&mut self, count: u32) {
        self.next_vreg = self.next_vreg.max(count);
    }

    /// Append an empty block with a fresh label register.
    pub fn add_block(&mut self, name: impl Into<String>) -> BlockId {
        let label = self.new_vreg();
        self.add_block_with_label(name, label)
    }

    pub fn add_block_with_label(&mut self, name: impl Into<String>, label: VReg) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.reserve_vregs(label.0 + 1);
        self.blocks.push(BasicBlock { name: name.into(), label, insts: Vec::new() });
        id
    }

    pub fn push(&mut self, block: BlockId, inst: Instruction) {
        self.block_mut(block).insts.push(inst);
    }

    /// CFG successors. A block without a terminator falls through to the next
    /// block in layout order.
    pub fn successors(&self, id: BlockId) -> Vec<BlockId> {
        let block = self.block(id);
        match block.terminator() {
            Some(term) => {
                let mut succs: Vec<BlockId> = Vec::new();
                for target in term.targets() {
                    if !succs.contains(&target) {
                        succs.push(target);
                    }
                }
                succs
            }
            None if id.index() + 1 < self.blocks.len() => vec![BlockId(id.0 + 1)],
            None => Vec::new(),
        }
    }

    /// Look up a block by name.
    pub fn find_block(&self, name: &str) -> Option<BlockId> {
        self.blocks
            .iter()
            .position(|b| b.name == name)
            .map(|idx| BlockId(idx as u32))
    }
}

/// Ordered collection of functions; order is the module layout order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Module {
    pub functions: Vec<Function>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }
}
