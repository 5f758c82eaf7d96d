//! Encoder tests: word layout, typed-result reordering and the reference
//! reader.

use spvlower::core::EncodeError;
use spvlower::encode::{decode_stream, header_word, FunctionEmitter, InstructionEncoder};
use spvlower::ir::{
    CoreInstrTable, InstrDesc, InstrInfo, Instruction, Opcode, Operand, OperandRole, VReg,
};
use spvlower::structurize::structurize;
use spvlower::tir;

const K: Opcode = Opcode(0x1234);

static CUSTOM: [InstrDesc; 2] = [
    InstrDesc {
        name: "OpTypedThing",
        opcode: K,
        num_defs: 1,
        roles: &[OperandRole::Id, OperandRole::Type, OperandRole::Id],
        variadic: false,
    },
    InstrDesc {
        name: "OpUntypedThing",
        opcode: Opcode(0x1235),
        num_defs: 0,
        roles: &[OperandRole::Id, OperandRole::Type, OperandRole::Id],
        variadic: false,
    },
];

/// Metadata table holding only the two instructions above.
struct CustomTable;

impl InstrInfo for CustomTable {
    fn desc(&self, opcode: Opcode) -> Option<&InstrDesc> {
        CUSTOM.iter().find(|d| d.opcode == opcode)
    }

    fn desc_by_name(&self, name: &str) -> Option<&InstrDesc> {
        CUSTOM.iter().find(|d| d.name == name)
    }
}

fn regs(indices: &[u32]) -> Vec<Operand> {
    indices.iter().map(|&i| Operand::Reg(VReg(i))).collect()
}

#[test]
fn test_typed_instruction_word_layout() {
    let encoder = InstructionEncoder::new(&CustomTable);
    let inst = Instruction::new(K, regs(&[5, 2, 7]));

    let mut words = Vec::new();
    assert_eq!(encoder.encode(&inst, &mut words).unwrap(), 4);
    assert_eq!(words, vec![((3 + 1) << 16) | 0x1234, 2 + 1, 5 + 1, 7 + 1]);
}

#[test]
fn test_untyped_instruction_keeps_order() {
    let encoder = InstructionEncoder::new(&CustomTable);
    let inst = Instruction::new(Opcode(0x1235), regs(&[5, 2, 7]));

    let mut words = Vec::new();
    encoder.encode(&inst, &mut words).unwrap();
    assert_eq!(words, vec![(4 << 16) | 0x1235, 6, 3, 8]);
}

#[test]
fn test_round_trip_restores_result_first_order() {
    let table = CustomTable;
    let encoder = InstructionEncoder::new(&table);
    let original = Instruction::new(K, regs(&[5, 2, 7]));

    let mut words = Vec::new();
    encoder.encode(&original, &mut words).unwrap();
    let decoded = decode_stream(&words, &table).unwrap();

    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded[0].opcode, K);
    let restored: Vec<Operand> =
        decoded[0].operands.iter().map(|&w| Operand::Reg(VReg(w - 1))).collect();
    assert_eq!(restored, original.operands);
}

#[test]
fn test_encoding_errors_write_nothing() {
    let encoder = InstructionEncoder::new(&CustomTable);
    let mut words = vec![0xdead_beef];

    let short = Instruction::new(K, regs(&[5, 2]));
    assert!(matches!(
        encoder.encode(&short, &mut words),
        Err(EncodeError::OperandCountMismatch { actual: 2, .. })
    ));

    let block_operand = Instruction::new(
        K,
        vec![Operand::Reg(VReg(1)), Operand::Reg(VReg(2)), Operand::Block(spvlower::BlockId(0))],
    );
    assert_eq!(
        encoder.encode(&block_operand, &mut words),
        Err(EncodeError::UnexpectedOperand { name: "OpTypedThing", index: 2 })
    );
    assert_eq!(words, vec![0xdead_beef]);
}

#[test]
fn test_preheader_stream_ends_with_loop_merge_then_branch() {
    let _ = env_logger::builder().is_test(true).try_init();
    let table = CoreInstrTable::new();
    let mut func = tir::parse_function(
        r#"
        func single {
        pre:
            OpBranch ^head
        head:
            %c = OpConstantTrue %bool
            OpBranchConditional %c ^latch ^exit
        latch:
            OpBranch ^head
        exit:
            OpReturn
        }
        "#,
        &table,
    )
    .unwrap();
    structurize(&mut func).unwrap();

    let mut words = Vec::new();
    let summary = FunctionEmitter::new(&table).emit(&func, &mut words).unwrap();
    assert_eq!(summary.words, words.len());

    // Labels: pre = %0, head = %1, latch = %2, exit = %3.
    assert_eq!(
        &words[..8],
        &[
            header_word(2, Opcode::LABEL),
            1,
            header_word(4, Opcode::LOOP_MERGE),
            4,
            3,
            0,
            header_word(2, Opcode::BRANCH),
            2,
        ]
    );

    // OpConstantTrue is typed: type %5 goes before result %4.
    assert_eq!(&words[10..13], &[header_word(3, Opcode::CONSTANT_TRUE), 6, 5]);

    let decoded = decode_stream(&words, &table).unwrap();
    let opcodes: Vec<Opcode> = decoded.iter().map(|d| d.opcode).collect();
    assert_eq!(
        opcodes,
        vec![
            Opcode::LABEL,
            Opcode::LOOP_MERGE,
            Opcode::BRANCH,
            Opcode::LABEL,
            Opcode::CONSTANT_TRUE,
            Opcode::BRANCH_CONDITIONAL,
            Opcode::LABEL,
            Opcode::BRANCH,
            Opcode::LABEL,
            Opcode::RETURN,
        ]
    );
    assert_eq!(decoded[4].operands, vec![5, 6]);
}

#[test]
fn test_immediates_pass_through_bit_for_bit() {
    let table = CoreInstrTable::new();
    let func = tir::parse_function(
        "func k {\nentry:\n  %x = OpConstant %int #-2 #0x80000000\n  OpReturn\n}",
        &table,
    )
    .unwrap();

    let mut words = Vec::new();
    FunctionEmitter::new(&table).emit(&func, &mut words).unwrap();
    // Label, then OpConstant type result imm imm.
    assert_eq!(&words[2..7], &[header_word(5, Opcode::CONSTANT), 3, 2, 0xffff_fffe, 0x8000_0000]);
}
