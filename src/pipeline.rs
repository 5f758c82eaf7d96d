// This module drives a whole module through both lowering stages. Each function is
// copied, its post-dominator tree and loop forest are computed, the structurizer
// inserts merge annotations, and the function emitter writes the result into a word
// buffer taken from the session arena. Statistics go to the session as the run
// proceeds. Only when every function has been lowered are the buffers handed to the
// module assembler and the lowered functions written back, so a failure anywhere
// leaves both the caller's module and the output untouched. Functions are processed
// in module order and nothing depends on hash iteration order, which keeps the output
// identical from run to run.

//! Whole-module compilation driver.

use std::io::{self, Write};

use crate::analysis::{Cfg, DominatorTree, LoopForest, PostDominatorTree};
use crate::core::error::{CompileError, CompileResult};
use crate::core::session::{CompilationSession, WordBuffer};
use crate::encode::{EmitSummary, Endianness, FunctionEmitter, words_to_bytes, write_words};
use crate::ir::{Function, InstrInfo, Module};
use crate::module::{ModuleAssembler, ModuleOptions};
use crate::structurize::{StructurizeSummary, Structurizer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    pub module: ModuleOptions,
    /// Run the structurizer before encoding. Off, functions are encoded as given.
    pub structurize: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self { module: ModuleOptions::default(), structurize: true }
    }
}

/// What happened to one function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionReport {
    pub name: String,
    pub structurize: Option<StructurizeSummary>,
    pub emit: EmitSummary,
}

/// Output of [`compile_module`].
#[derive(Debug, Clone)]
pub struct CompiledModule {
    pub words: Vec<u32>,
    pub functions: Vec<FunctionReport>,
    endianness: Endianness,
}

impl CompiledModule {
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        words_to_bytes(&self.words, self.endianness)
    }

    pub fn write_to<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        write_words(out, &self.words, self.endianness)
    }
}

/// Structurize a single function in place.
pub fn structurize_function(func: &mut Function) -> CompileResult<StructurizeSummary> {
    let cfg = Cfg::new(func);
    let dom = DominatorTree::new(&cfg);
    let postdom = PostDominatorTree::new(&cfg);
    let loops = LoopForest::new(&cfg, &dom);
    log::trace!(
        "{}: {} blocks, {} loops, {} post-dominator roots",
        func.name,
        cfg.num_blocks(),
        loops.len(),
        postdom.roots().len()
    );

    Structurizer::new(&postdom, &loops)
        .run(func)
        .map_err(|source| CompileError::Structurize { function: func.name.clone(), source })
}

/// Lower every function of `module` and assemble the binary module.
pub fn compile_module<'arena, I: InstrInfo + ?Sized>(
    module: &mut Module,
    info: &I,
    session: &CompilationSession<'arena>,
    options: &CompileOptions,
) -> CompileResult<CompiledModule> {
    let emitter = FunctionEmitter::new(info);
    let mut lowered: Vec<Function> = Vec::with_capacity(module.functions.len());
    let mut streams: Vec<WordBuffer<'arena>> = Vec::with_capacity(module.functions.len());
    let mut reports = Vec::with_capacity(module.functions.len());

    for original in &module.functions {
        let mut func = original.clone();

        let structurized = if options.structurize {
            let summary = structurize_function(&mut func)?;
            session.record_structurized(&summary);
            Some(summary)
        } else {
            None
        };

        // Label plus header word per block, and a rough guess per instruction.
        let estimate: usize = func.blocks.iter().map(|b| 2 + 4 * b.insts.len()).sum();
        let mut words = session.alloc_words_with_capacity(estimate);
        let emitted = emitter
            .emit_observed(&func, &mut words, &mut |opcode, count| {
                session.record_instruction_encoded(opcode, count)
            })
            .map_err(|source| CompileError::Encode { function: func.name.clone(), source })?;
        session.record_function_emitted(&func.name, emitted.words);

        log::info!(
            "compiled {}: {} blocks, {} instructions, {} words",
            func.name,
            func.num_blocks(),
            emitted.instructions,
            emitted.words
        );

        reports.push(FunctionReport {
            name: func.name.clone(),
            structurize: structurized,
            emit: emitted,
        });
        streams.push(words);
        lowered.push(func);
    }
    let mut assembler = ModuleAssembler::new(options.module);
    for (func, words) in lowered.iter().zip(&streams) {
        assembler.append_function(words, func.vreg_count());
    }
    module.functions = lowered;
    log::info!(
        "assembled {} functions, id bound {}",
        assembler.function_count(),
        assembler.header().bound
    );

    Ok(CompiledModule {
        words: assembler.finish(),
        functions: reports,
        endianness: assembler.endianness(),
    })
}
