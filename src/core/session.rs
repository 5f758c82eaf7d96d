// This module provides arena-based session management for a lowering run using the
// bumpalo crate. CompilationSession owns a borrowed arena from which every function's
// output word buffer is allocated, so per-function streams can be produced one after
// another (or by independent workers each holding their own buffer) and concatenated
// in module order at the end without copying through intermediate heap vectors. The
// session also tracks statistics for diagnostics: functions structurized, merge
// annotations inserted, sentinel blocks created, instructions encoded and words
// emitted, with a per-opcode breakdown.

//! Arena-based compilation session management.

use bumpalo::collections::Vec as BumpVec;
use bumpalo::Bump;
use std::cell::RefCell;
use std::fmt;

use crate::ir::Opcode;
use crate::structurize::StructurizeSummary;

/// Word buffer living in the session arena.
pub type WordBuffer<'arena> = BumpVec<'arena, u32>;

/// Arena-based compilation session.
///
/// All output buffers are allocated in the arena and share the session
/// lifetime; dropping the arena releases every stream at once.
pub struct CompilationSession<'arena> {
    arena: &'arena Bump,
    stats: RefCell<SessionStats>,
}

impl<'arena> CompilationSession<'arena> {
    pub fn new(arena: &'arena Bump) -> Self {
        Self {
            arena,
            stats: RefCell::new(SessionStats::default()),
        }
    }

    /// Word buffer for one function's stream, with room for `capacity` words.
    pub fn alloc_words_with_capacity(&self, capacity: usize) -> WordBuffer<'arena> {
        BumpVec::with_capacity_in(capacity, self.arena)
    }

    /// Record the outcome of one structurizer run.
    pub fn record_structurized(&self, summary: &StructurizeSummary) {
        let mut stats = self.stats.borrow_mut();
        stats.functions_structurized += 1;
        stats.loop_merges += summary.loop_merges;
        stats.selection_merges += summary.selection_merges;
        if summary.sentinel.is_some() {
            stats.sentinel_blocks += 1;
        }
    }

    pub fn record_instruction_encoded(&self, opcode: Opcode, words: usize) {
        let mut stats = self.stats.borrow_mut();
        stats.instructions_encoded += 1;
        stats.words_emitted += words;
        *stats.opcode_counts.entry(opcode.0).or_insert(0) += 1;
    }

    pub fn record_function_emitted(&self, name: &str, words: usize) {
        let mut stats = self.stats.borrow_mut();
        stats.functions_emitted += 1;
        if stats.largest_function_words < words {
            stats.largest_function_words = words;
            stats.largest_function_name = name.to_string();
        }
    }

    pub fn stats(&self) -> SessionStats {
        self.stats.borrow().clone()
    }
}

/// Compilation session statistics.
#[derive(Debug, Default, Clone)]
pub struct SessionStats {
    pub functions_structurized: usize,
    pub functions_emitted: usize,
    pub loop_merges: usize,
    pub selection_merges: usize,
    /// Functions that needed an unreachable merge block.
    pub sentinel_blocks: usize,
    pub instructions_encoded: usize,
    pub words_emitted: usize,
    pub opcode_counts: hashbrown::HashMap<u16, usize>,
    pub largest_function_words: usize,
    pub largest_function_name: String,
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Compilation Session Statistics:")?;
        writeln!(f, "  Functions structurized: {}", self.functions_structurized)?;
        writeln!(f, "  Functions emitted: {}", self.functions_emitted)?;
        writeln!(f, "  Loop merges: {}", self.loop_merges)?;
        writeln!(f, "  Selection merges: {}", self.selection_merges)?;
        writeln!(f, "  Sentinel blocks: {}", self.sentinel_blocks)?;
        writeln!(f, "  Instructions encoded: {}", self.instructions_encoded)?;
        writeln!(f, "  Words emitted: {}", self.words_emitted)?;

        if !self.largest_function_name.is_empty() {
            writeln!(
                f,
                "  Largest function: {} ({} words)",
                self.largest_function_name, self.largest_function_words
            )?;
        }

        if !self.opcode_counts.is_empty() {
            writeln!(f, "  Opcode breakdown:")?;
            let mut sorted: Vec<_> = self.opcode_counts.iter().collect();
            sorted.sort_by_key(|(opcode, count)| (std::cmp::Reverse(**count), **opcode));

            for (opcode, count) in sorted.into_iter().take(10) {
                writeln!(f, "    op{}: {}", opcode, count)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::BlockId;

    #[test]
    fn test_compilation_session_creation() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);

        let stats = session.stats();
        assert_eq!(stats.functions_structurized, 0);
        assert_eq!(stats.instructions_encoded, 0);
    }

    #[test]
    fn test_word_buffers_live_in_arena() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let before = arena.allocated_bytes();

        let mut words = session.alloc_words_with_capacity(64);
        words.extend_from_slice(&[1, 2, 3]);
        assert_eq!(words.as_slice(), &[1, 2, 3]);
        assert!(arena.allocated_bytes() >= before);
    }

    #[test]
    fn test_session_statistics() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);

        session.record_structurized(&StructurizeSummary {
            loop_merges: 2,
            selection_merges: 3,
            sentinel: Some(BlockId(7)),
        });
        session.record_instruction_encoded(Opcode::I_ADD, 5);
        session.record_instruction_encoded(Opcode::I_ADD, 5);
        session.record_instruction_encoded(Opcode::RETURN, 1);
        session.record_function_emitted("main", 11);

        let stats = session.stats();
        assert_eq!(stats.functions_structurized, 1);
        assert_eq!(stats.loop_merges, 2);
        assert_eq!(stats.selection_merges, 3);
        assert_eq!(stats.sentinel_blocks, 1);
        assert_eq!(stats.instructions_encoded, 3);
        assert_eq!(stats.words_emitted, 11);
        assert_eq!(stats.opcode_counts[&128], 2);

        let output = format!("{}", stats);
        assert!(output.contains("Loop merges: 2"));
        assert!(output.contains("main (11 words)"));
        assert!(output.contains("op128: 2"));
    }
}
