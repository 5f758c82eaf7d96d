//! Whole-module compilation tests driven by `tests/tir/module.tir`.

use bumpalo::Bump;
use spvlower::core::{CompilationSession, CompileError, StructurizeError};
use spvlower::encode::decode_stream;
use spvlower::ir::{BlockId, CoreInstrTable, Module, Opcode};
use spvlower::module::{ModuleHeader, ModuleOptions, HEADER_WORDS, MAGIC};
use spvlower::pipeline::{compile_module, CompileOptions, CompiledModule};
use spvlower::tir;

const MODULE: &str = include_str!("tir/module.tir");

fn load(text: &str) -> Module {
    let _ = env_logger::builder().is_test(true).try_init();
    tir::parse_module(text, &CoreInstrTable::new()).unwrap_or_else(|e| panic!("parse: {e}"))
}

fn compile(module: &mut Module, options: &CompileOptions) -> Result<CompiledModule, CompileError> {
    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    compile_module(module, &CoreInstrTable::new(), &session, options)
}

fn count_opcode(words: &[u32], opcode: Opcode) -> usize {
    decode_stream(&words[HEADER_WORDS..], &CoreInstrTable::new())
        .unwrap()
        .iter()
        .filter(|inst| inst.opcode == opcode)
        .count()
}

#[test]
fn test_module_header() {
    let mut module = load(MODULE);
    assert_eq!(module.functions.len(), 3);
    let compiled = compile(&mut module, &CompileOptions::default()).unwrap();

    let header = ModuleHeader::parse(&compiled.words).unwrap();
    assert_eq!(header.magic, MAGIC);
    assert_eq!(header.version, 0x0001_0000);
    assert_eq!(header.generator, 0);
    // counted has 6 labels and 8 other registers.
    assert_eq!(header.bound, 15);
    assert_eq!(header.schema, 0);

    let body: usize = compiled.functions.iter().map(|f| f.emit.words).sum();
    assert_eq!(compiled.words.len(), HEADER_WORDS + body);
}

#[test]
fn test_merges_in_output() {
    let mut module = load(MODULE);
    let compiled = compile(&mut module, &CompileOptions::default()).unwrap();

    let summaries: Vec<_> = compiled
        .functions
        .iter()
        .map(|f| {
            let s = f.structurize.unwrap();
            (f.name.as_str(), s.loop_merges, s.selection_merges)
        })
        .collect();
    assert_eq!(summaries, vec![("straight", 0, 0), ("counted", 1, 1), ("two_exits", 1, 1)]);

    assert_eq!(count_opcode(&compiled.words, Opcode::LOOP_MERGE), 2);
    assert_eq!(count_opcode(&compiled.words, Opcode::SELECTION_MERGE), 2);

    // The module now holds the structurized functions.
    let printed = tir::print_module(&module, &CoreInstrTable::new());
    assert!(printed.contains("OpLoopMerge ^exit ^latch #0\n    OpBranch ^head"), "{printed}");
    assert!(printed.contains("OpSelectionMerge ^latch #0"), "{printed}");
    assert!(printed.contains("OpLoopMerge ^join ^latch #0"), "{printed}");
}

#[test]
fn test_output_is_deterministic() {
    let first = compile(&mut load(MODULE), &CompileOptions::default()).unwrap();
    let second = compile(&mut load(MODULE), &CompileOptions::default()).unwrap();
    assert_eq!(first.to_bytes(), second.to_bytes());

    let bytes = first.to_bytes();
    assert_eq!(bytes.len(), first.words.len() * 4);
    assert_eq!(&bytes[..4], &MAGIC.to_ne_bytes());

    let mut written = Vec::new();
    first.write_to(&mut written).unwrap();
    assert_eq!(written, bytes);
}

#[test]
fn test_without_structurizing() {
    let mut module = load(MODULE);
    let options = CompileOptions {
        module: ModuleOptions { version_major: 1, version_minor: 5, generator: 42 },
        structurize: false,
    };
    let compiled = compile(&mut module, &options).unwrap();

    assert_eq!(compiled.words[1], 0x0001_0500);
    assert_eq!(compiled.words[2], 42);
    assert!(compiled.functions.iter().all(|f| f.structurize.is_none()));
    assert_eq!(count_opcode(&compiled.words, Opcode::LOOP_MERGE), 0);
    assert_eq!(count_opcode(&compiled.words, Opcode::SELECTION_MERGE), 0);
}

#[test]
fn test_error_aborts_whole_module() {
    let text = format!(
        "{MODULE}\n\
         func sw {{\n\
         entry:\n\
         \x20   %v = OpConstant %int #1\n\
         \x20   OpSwitch %v ^out #0 ^out\n\
         out:\n\
         \x20   OpReturn\n\
         }}\n"
    );
    let mut module = load(&text);
    let before = module.clone();

    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let err = compile_module(&mut module, &CoreInstrTable::new(), &session, &CompileOptions::default())
        .unwrap_err();

    match &err {
        CompileError::Structurize { function, source } => {
            assert_eq!(function, "sw");
            assert_eq!(*source, StructurizeError::UnsupportedSwitch { block: BlockId(0) });
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("sw"));
    assert_eq!(module, before);
    // The functions before the failing one were still counted.
    assert_eq!(session.stats().functions_emitted, 3);
}
