// Opcode numbering of the structured target and the closed classification of block
// terminators. Opcodes are carried as a plain `u16` newtype because the instruction
// stream is produced by an external selector and may contain any opcode the metadata
// table knows about; control flow decisions, however, never match on raw numbers.
// They go through `TerminatorKind::classify`, so adding a terminator means extending
// one enum and the compiler points at every match that must handle it.

//! Target opcodes and terminator classification.

use std::fmt;

/// Numeric opcode as it appears in the low half of an instruction header word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Opcode(pub u16);

impl Opcode {
    pub const NOP: Opcode = Opcode(0);
    pub const NAME: Opcode = Opcode(5);
    pub const TYPE_VOID: Opcode = Opcode(19);
    pub const TYPE_BOOL: Opcode = Opcode(20);
    pub const TYPE_INT: Opcode = Opcode(21);
    pub const TYPE_FLOAT: Opcode = Opcode(22);
    pub const TYPE_POINTER: Opcode = Opcode(32);
    pub const TYPE_FUNCTION: Opcode = Opcode(33);
    pub const CONSTANT_TRUE: Opcode = Opcode(41);
    pub const CONSTANT_FALSE: Opcode = Opcode(42);
    pub const CONSTANT: Opcode = Opcode(43);
    pub const FUNCTION_CALL: Opcode = Opcode(57);
    pub const VARIABLE: Opcode = Opcode(59);
    pub const LOAD: Opcode = Opcode(61);
    pub const STORE: Opcode = Opcode(62);
    pub const COPY_OBJECT: Opcode = Opcode(83);
    pub const I_ADD: Opcode = Opcode(128);
    pub const F_ADD: Opcode = Opcode(129);
    pub const I_SUB: Opcode = Opcode(130);
    pub const F_SUB: Opcode = Opcode(131);
    pub const I_MUL: Opcode = Opcode(132);
    pub const F_MUL: Opcode = Opcode(133);
    pub const LOGICAL_OR: Opcode = Opcode(166);
    pub const LOGICAL_AND: Opcode = Opcode(167);
    pub const LOGICAL_NOT: Opcode = Opcode(168);
    pub const SELECT: Opcode = Opcode(169);
    pub const I_EQUAL: Opcode = Opcode(170);
    pub const I_NOT_EQUAL: Opcode = Opcode(171);
    pub const U_GREATER_THAN: Opcode = Opcode(172);
    pub const S_GREATER_THAN: Opcode = Opcode(173);
    pub const U_LESS_THAN: Opcode = Opcode(176);
    pub const S_LESS_THAN: Opcode = Opcode(177);
    pub const PHI: Opcode = Opcode(245);
    pub const LOOP_MERGE: Opcode = Opcode(246);
    pub const SELECTION_MERGE: Opcode = Opcode(247);
    pub const LABEL: Opcode = Opcode(248);
    pub const BRANCH: Opcode = Opcode(249);
    pub const BRANCH_CONDITIONAL: Opcode = Opcode(250);
    pub const SWITCH: Opcode = Opcode(251);
    pub const KILL: Opcode = Opcode(252);
    pub const RETURN: Opcode = Opcode(253);
    pub const RETURN_VALUE: Opcode = Opcode(254);
    pub const UNREACHABLE: Opcode = Opcode(255);

    /// Whether this opcode is one of the structurizer's merge annotations.
    pub fn is_merge(self) -> bool {
        self == Opcode::LOOP_MERGE || self == Opcode::SELECTION_MERGE
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op{}", self.0)
    }
}

/// Every way a block can end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminatorKind {
    Branch,
    BranchConditional,
    Switch,
    Return,
    ReturnValue,
    Kill,
    Unreachable,
}

impl TerminatorKind {
    /// Classify an opcode, `None` for anything that does not end a block.
    pub fn classify(opcode: Opcode) -> Option<Self> {
        let kind = match opcode {
            Opcode::BRANCH => TerminatorKind::Branch,
            Opcode::BRANCH_CONDITIONAL => TerminatorKind::BranchConditional,
            Opcode::SWITCH => TerminatorKind::Switch,
            Opcode::RETURN => TerminatorKind::Return,
            Opcode::RETURN_VALUE => TerminatorKind::ReturnValue,
            Opcode::KILL => TerminatorKind::Kill,
            Opcode::UNREACHABLE => TerminatorKind::Unreachable,
            _ => return None,
        };
        Some(kind)
    }
}

/// Loop control mask carried by `OpLoopMerge`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopControl(pub u32);

impl LoopControl {
    pub const NONE: LoopControl = LoopControl(0);
}

/// Selection control mask carried by `OpSelectionMerge`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionControl(pub u32);

impl SelectionControl {
    pub const NONE: SelectionControl = SelectionControl(0);
}
