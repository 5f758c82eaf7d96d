//! Instruction metadata side table.
//!
//! The encoder never guesses what an operand means. It asks an [`InstrInfo`]
//! implementation for the declared operand list of an opcode: how many results
//! the instruction defines, which role each declared operand plays and whether
//! trailing operands may follow. [`CoreInstrTable`] covers the instructions the
//! rest of this crate produces and the common arithmetic, memory and type
//! instructions a selector emits.

use super::opcode::Opcode;
use hashbrown::HashMap;

/// What a declared operand slot holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandRole {
    /// A result or value id.
    Id,
    /// A type id.
    Type,
    /// A literal word.
    Imm,
    /// A block label.
    Block,
}

/// Declared shape of one opcode.
#[derive(Debug, Clone, Copy)]
pub struct InstrDesc {
    pub name: &'static str,
    pub opcode: Opcode,
    /// Number of leading operands that are results defined by the instruction.
    pub num_defs: u8,
    /// Roles of the declared operands, in MC order (result first).
    pub roles: &'static [OperandRole],
    /// Whether operands past `roles` are allowed.
    pub variadic: bool,
}

impl InstrDesc {
    /// Whether an instruction with `count` operands matches this declaration.
    pub fn accepts(&self, count: usize) -> bool {
        if self.variadic {
            count >= self.roles.len()
        } else {
            count == self.roles.len()
        }
    }

    /// One result id in operand 0 and a type id in operand 1.
    ///
    /// The binary format lists the type before the result it describes, so
    /// these instructions get their first two operands swapped on encode.
    pub fn is_typed_result(&self) -> bool {
        self.num_defs == 1
            && self.roles.len() >= 2
            && self.roles[0] == OperandRole::Id
            && self.roles[1] == OperandRole::Type
    }
}

/// Lookup of declared operand lists by opcode.
pub trait InstrInfo {
    fn desc(&self, opcode: Opcode) -> Option<&InstrDesc>;

    /// Lookup by mnemonic, used by the textual IR.
    fn desc_by_name(&self, name: &str) -> Option<&InstrDesc>;

    fn is_typed_result(&self, opcode: Opcode) -> bool {
        self.desc(opcode).is_some_and(InstrDesc::is_typed_result)
    }
}

use OperandRole::{Block, Id, Imm, Type};

const fn desc(
    name: &'static str,
    opcode: Opcode,
    num_defs: u8,
    roles: &'static [OperandRole],
    variadic: bool,
) -> InstrDesc {
    InstrDesc { name, opcode, num_defs, roles, variadic }
}

const BINARY: &[OperandRole] = &[Id, Type, Id, Id];

static CORE_INSTRUCTIONS: &[InstrDesc] = &[
    desc("OpNop", Opcode::NOP, 0, &[], false),
    desc("OpName", Opcode::NAME, 0, &[Id], true),
    desc("OpTypeVoid", Opcode::TYPE_VOID, 1, &[Id], false),
    desc("OpTypeBool", Opcode::TYPE_BOOL, 1, &[Id], false),
    desc("OpTypeInt", Opcode::TYPE_INT, 1, &[Id, Imm, Imm], false),
    desc("OpTypeFloat", Opcode::TYPE_FLOAT, 1, &[Id, Imm], false),
    desc("OpTypePointer", Opcode::TYPE_POINTER, 1, &[Id, Imm, Type], false),
    desc("OpTypeFunction", Opcode::TYPE_FUNCTION, 1, &[Id, Type], true),
    desc("OpConstantTrue", Opcode::CONSTANT_TRUE, 1, &[Id, Type], false),
    desc("OpConstantFalse", Opcode::CONSTANT_FALSE, 1, &[Id, Type], false),
    desc("OpConstant", Opcode::CONSTANT, 1, &[Id, Type, Imm], true),
    desc("OpFunctionCall", Opcode::FUNCTION_CALL, 1, &[Id, Type, Id], true),
    desc("OpVariable", Opcode::VARIABLE, 1, &[Id, Type, Imm], true),
    desc("OpLoad", Opcode::LOAD, 1, &[Id, Type, Id], true),
    desc("OpStore", Opcode::STORE, 0, &[Id, Id], true),
    desc("OpCopyObject", Opcode::COPY_OBJECT, 1, &[Id, Type, Id], false),
    desc("OpIAdd", Opcode::I_ADD, 1, BINARY, false),
    desc("OpFAdd", Opcode::F_ADD, 1, BINARY, false),
    desc("OpISub", Opcode::I_SUB, 1, BINARY, false),
    desc("OpFSub", Opcode::F_SUB, 1, BINARY, false),
    desc("OpIMul", Opcode::I_MUL, 1, BINARY, false),
    desc("OpFMul", Opcode::F_MUL, 1, BINARY, false),
    desc("OpLogicalOr", Opcode::LOGICAL_OR, 1, BINARY, false),
    desc("OpLogicalAnd", Opcode::LOGICAL_AND, 1, BINARY, false),
    desc("OpLogicalNot", Opcode::LOGICAL_NOT, 1, &[Id, Type, Id], false),
    desc("OpSelect", Opcode::SELECT, 1, &[Id, Type, Id, Id, Id], false),
    desc("OpIEqual", Opcode::I_EQUAL, 1, BINARY, false),
    desc("OpINotEqual", Opcode::I_NOT_EQUAL, 1, BINARY, false),
    desc("OpUGreaterThan", Opcode::U_GREATER_THAN, 1, BINARY, false),
    desc("OpSGreaterThan", Opcode::S_GREATER_THAN, 1, BINARY, false),
    desc("OpULessThan", Opcode::U_LESS_THAN, 1, BINARY, false),
    desc("OpSLessThan", Opcode::S_LESS_THAN, 1, BINARY, false),
    desc("OpPhi", Opcode::PHI, 1, &[Id, Type], true),
    desc("OpLoopMerge", Opcode::LOOP_MERGE, 0, &[Block, Block, Imm], true),
    desc("OpSelectionMerge", Opcode::SELECTION_MERGE, 0, &[Block, Imm], false),
    desc("OpLabel", Opcode::LABEL, 1, &[Id], false),
    desc("OpBranch", Opcode::BRANCH, 0, &[Block], false),
    desc("OpBranchConditional", Opcode::BRANCH_CONDITIONAL, 0, &[Id, Block, Block], true),
    desc("OpSwitch", Opcode::SWITCH, 0, &[Id, Block], true),
    desc("OpKill", Opcode::KILL, 0, &[], false),
    desc("OpReturn", Opcode::RETURN, 0, &[], false),
    desc("OpReturnValue", Opcode::RETURN_VALUE, 0, &[Id], false),
    desc("OpUnreachable", Opcode::UNREACHABLE, 0, &[], false),
];

/// Built-in table for the core instruction set.
pub struct CoreInstrTable {
    by_opcode: HashMap<Opcode, usize>,
    by_name: HashMap<&'static str, usize>,
}

impl CoreInstrTable {
    pub fn new() -> Self {
        let mut by_opcode = HashMap::with_capacity(CORE_INSTRUCTIONS.len());
        let mut by_name = HashMap::with_capacity(CORE_INSTRUCTIONS.len());
        for (idx, desc) in CORE_INSTRUCTIONS.iter().enumerate() {
            by_opcode.insert(desc.opcode, idx);
            by_name.insert(desc.name, idx);
        }
        Self { by_opcode, by_name }
    }
}

impl Default for CoreInstrTable {
    fn default() -> Self {
        Self::new()
    }
}

impl InstrInfo for CoreInstrTable {
    fn desc(&self, opcode: Opcode) -> Option<&InstrDesc> {
        self.by_opcode.get(&opcode).map(|&idx| &CORE_INSTRUCTIONS[idx])
    }

    fn desc_by_name(&self, name: &str) -> Option<&InstrDesc> {
        self.by_name.get(name).map(|&idx| &CORE_INSTRUCTIONS[idx])
    }
}
