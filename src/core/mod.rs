// This module collects the infrastructure shared by both lowering stages: the error
// types every stage reports through, and the compilation session that owns the arena
// holding per-function word buffers together with the statistics gathered during a
// run.

//! Shared infrastructure: errors and the compilation session.

pub mod error;
pub mod session;

pub use error::{CompileError, CompileResult, DecodeError, EncodeError, ParseError, StructurizeError};
pub use session::{CompilationSession, SessionStats, WordBuffer};
