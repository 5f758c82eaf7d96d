//! spvlower - structured control flow lowering and binary encoding.
//!
//! The last stage of a backend for a target that only accepts structured
//! control flow. Register-allocated functions with an arbitrary reducible CFG
//! get explicit loop and selection merge annotations, then every instruction
//! is packed into length-prefixed 32-bit words.
//!
//! # Usage
//!
//! ```ignore
//! use bumpalo::Bump;
//! use spvlower::core::CompilationSession;
//! use spvlower::ir::CoreInstrTable;
//! use spvlower::pipeline::{compile_module, CompileOptions};
//!
//! let table = CoreInstrTable::new();
//! let mut module = spvlower::tir::parse_module(text, &table)?;
//! let arena = Bump::new();
//! let session = CompilationSession::new(&arena);
//! let compiled = compile_module(&mut module, &table, &session, &CompileOptions::default())?;
//! std::fs::write("out.bin", compiled.to_bytes())?;
//! ```
//!
//! # Architecture
//!
//! - [`ir`] - functions, blocks, instructions and the instruction table
//! - [`analysis`] - CFG, dominator and post-dominator trees, loop forest
//! - [`structurize`] - merge annotation pass
//! - [`encode`] - instruction encoder, function emitter, reference decoder
//! - [`module`] - module header and assembly
//! - [`pipeline`] - whole-module driver
//! - [`tir`] - textual IR
//! - [`core`] - errors and the compilation session

pub mod analysis;
pub mod core;
pub mod encode;
pub mod ir;
pub mod module;
pub mod pipeline;
pub mod structurize;
pub mod tir;

pub use crate::core::{CompilationSession, CompileError, CompileResult, SessionStats};
pub use ir::{BlockId, CoreInstrTable, Function, InstrInfo, Instruction, Module, Opcode, Operand, VReg};
pub use pipeline::{compile_module, CompileOptions, CompiledModule};
pub use structurize::{structurize, StructurizeSummary, Structurizer};
