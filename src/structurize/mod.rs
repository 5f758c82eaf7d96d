// This module implements the control-flow structurizer. The target requires every loop
// and every conditional branch to be bracketed by an explicit merge annotation naming
// the block where control reconverges. The pass walks the loop forest outermost first,
// folding each loop's exit blocks with nearest-common-post-dominator queries into a
// single merge block and inserting OpLoopMerge(merge, latch, 0) before the preheader's
// terminator. Preheader, header and latch then leave the unprocessed set so they never
// also receive a selection merge. Every conditional branch still unprocessed afterwards
// gets OpSelectionMerge naming the nearest common post-dominator of its two targets.
// Loops without any exit merge into one lazily created unreachable block, shared by all
// such loops of the function. Insertions are planned first and only committed once the
// whole function succeeded, so a failure leaves the function untouched.

//! Merge annotation pass.

use hashbrown::HashSet;

use crate::analysis::{LoopForest, LoopId, PostDominance};
use crate::core::error::StructurizeError;
use crate::ir::{
    BlockId, Function, Instruction, LoopControl, Opcode, SelectionControl, TerminatorKind,
};

/// What one run inserted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StructurizeSummary {
    pub loop_merges: usize,
    pub selection_merges: usize,
    /// Unreachable merge block created for exit-less loops.
    pub sentinel: Option<BlockId>,
}

impl StructurizeSummary {
    pub fn changed(&self) -> bool {
        self.loop_merges + self.selection_merges > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Merge {
    Loop { merge: BlockId, continue_target: BlockId },
    Selection { merge: BlockId },
}

/// State owned by one run: blocks still eligible for a selection merge, the
/// planned insertions, and the sentinel id once one is needed.
struct RunState {
    unprocessed: HashSet<BlockId>,
    planned: Vec<(BlockId, Merge)>,
    sentinel: Option<BlockId>,
    next_block: u32,
}

impl RunState {
    fn sentinel(&mut self) -> BlockId {
        *self.sentinel.get_or_insert_with(|| {
            let id = BlockId(self.next_block);
            self.next_block += 1;
            id
        })
    }
}

/// Inserts loop and selection merges into one function.
///
/// Both oracles describe the function as it was before the pass; merge
/// annotations add no CFG edges, so they stay valid while the pass runs.
pub struct Structurizer<'a, P: PostDominance + ?Sized> {
    postdom: &'a P,
    loops: &'a LoopForest,
}

impl<'a, P: PostDominance + ?Sized> Structurizer<'a, P> {
    pub fn new(postdom: &'a P, loops: &'a LoopForest) -> Self {
        Self { postdom, loops }
    }

    pub fn run(&self, func: &mut Function) -> Result<StructurizeSummary, StructurizeError> {
        // A branch followed by more code would read as a fallthrough.
        for block in func.block_ids() {
            if let Some(index) = func.block(block).misplaced_terminator() {
                return Err(StructurizeError::MisplacedTerminator { block, index });
            }
        }

        let mut state = RunState {
            // Blocks that already carry a merge were structured by an earlier run.
            unprocessed: func
                .block_ids()
                .filter(|&b| func.block(b).merge_annotation().is_none())
                .collect(),
            planned: Vec::new(),
            sentinel: None,
            next_block: func.num_blocks() as u32,
        };

        // Explicit stack, parents before children, siblings in forest order.
        let mut stack: Vec<LoopId> = self.loops.top_level().iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            self.plan_loop(func, id, &mut state)?;
            stack.extend(self.loops.get(id).children.iter().rev().copied());
        }

        for block in func.block_ids() {
            if !state.unprocessed.contains(&block) {
                continue;
            }
            if let Some(merge) = self.plan_selection(func, block)? {
                state.planned.push((block, merge));
            }
        }

        Ok(self.commit(func, state))
    }

    fn plan_loop(
        &self,
        func: &Function,
        id: LoopId,
        state: &mut RunState,
    ) -> Result<(), StructurizeError> {
        let l = self.loops.get(id);
        let header = l.header;
        let preheader = l
            .preheader
            .ok_or(StructurizeError::MalformedLoop { header, missing: "preheader" })?;
        let latch = l
            .latch
            .ok_or(StructurizeError::MalformedLoop { header, missing: "latch" })?;

        let already_merged = func
            .block(preheader)
            .merge_annotation()
            .is_some_and(|inst| inst.opcode == Opcode::LOOP_MERGE);

        if !already_merged {
            let merge = match l.exits.split_first() {
                // Legal for the target: the merge of an infinite loop may be
                // unreachable.
                None => state.sentinel(),
                Some((&first, rest)) => {
                    rest.iter().try_fold(first, |merge, &exit| {
                        self.postdom
                            .nearest_common_post_dominator(merge, exit)
                            .ok_or(StructurizeError::NoLoopMerge { header })
                    })?
                }
            };
            log::debug!(
                "{}: loop {} merges at {} (preheader {}, latch {})",
                func.name,
                header,
                merge,
                preheader,
                latch
            );
            state.planned.push((preheader, Merge::Loop { merge, continue_target: latch }));
        }

        state.unprocessed.remove(&preheader);
        state.unprocessed.remove(&header);
        state.unprocessed.remove(&latch);
        Ok(())
    }

    fn plan_selection(
        &self,
        func: &Function,
        block: BlockId,
    ) -> Result<Option<Merge>, StructurizeError> {
        let Some(term) = func.block(block).terminator() else {
            // Fallthrough.
            return Ok(None);
        };
        let Some(kind) = term.terminator_kind() else {
            return Ok(None);
        };
        match kind {
            TerminatorKind::BranchConditional => {
                let mut targets = term.targets();
                let (Some(on_true), Some(on_false)) = (targets.next(), targets.next()) else {
                    return Err(StructurizeError::NoSelectionMerge { block });
                };
                let merge = self
                    .postdom
                    .nearest_common_post_dominator(on_true, on_false)
                    .ok_or(StructurizeError::NoSelectionMerge { block })?;
                log::debug!("{}: selection in {} merges at {}", func.name, block, merge);
                Ok(Some(Merge::Selection { merge }))
            }
            TerminatorKind::Switch => Err(StructurizeError::UnsupportedSwitch { block }),
            TerminatorKind::Branch
            | TerminatorKind::Return
            | TerminatorKind::ReturnValue
            | TerminatorKind::Kill
            | TerminatorKind::Unreachable => Ok(None),
        }
    }

    fn commit(&self, func: &mut Function, state: RunState) -> StructurizeSummary {
        let mut summary = StructurizeSummary { sentinel: state.sentinel, ..Default::default() };

        if let Some(expected) = state.sentinel {
            let mut name = String::from("unreachable");
            let mut suffix = 1;
            while func.find_block(&name).is_some() {
                name = format!("unreachable.{suffix}");
                suffix += 1;
            }
            let sentinel = func.add_block(name);
            debug_assert_eq!(sentinel, expected);
            func.push(sentinel, Instruction::new(Opcode::UNREACHABLE, vec![]));
        }

        for (block, merge) in state.planned {
            let inst = match merge {
                Merge::Loop { merge, continue_target } => {
                    summary.loop_merges += 1;
                    Instruction::loop_merge(merge, continue_target, LoopControl::NONE)
                }
                Merge::Selection { merge } => {
                    summary.selection_merges += 1;
                    Instruction::selection_merge(merge, SelectionControl::NONE)
                }
            };
            func.block_mut(block).insert_before_terminator(inst);
        }

        log::debug!(
            "{}: inserted {} loop merges, {} selection merges",
            func.name,
            summary.loop_merges,
            summary.selection_merges
        );
        summary
    }
}

/// Compute the analyses for `func` and structurize it.
pub fn structurize(func: &mut Function) -> Result<StructurizeSummary, StructurizeError> {
    let cfg = crate::analysis::Cfg::new(func);
    let dom = crate::analysis::DominatorTree::new(&cfg);
    let postdom = crate::analysis::PostDominatorTree::new(&cfg);
    let loops = LoopForest::new(&cfg, &dom);
    Structurizer::new(&postdom, &loops).run(func)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Operand;

    /// Oracle that knows nothing; every query fails.
    struct NoCommonPostDominator;

    impl PostDominance for NoCommonPostDominator {
        fn nearest_common_post_dominator(&self, _a: BlockId, _b: BlockId) -> Option<BlockId> {
            None
        }
    }

    fn br(target: BlockId) -> Instruction {
        Instruction::new(Opcode::BRANCH, vec![Operand::Block(target)])
    }

    fn cond(func: &mut Function, t: BlockId, f: BlockId) -> Instruction {
        let c = func.new_vreg();
        Instruction::new(
            Opcode::BRANCH_CONDITIONAL,
            vec![Operand::Reg(c), Operand::Block(t), Operand::Block(f)],
        )
    }

    fn ret() -> Instruction {
        Instruction::new(Opcode::RETURN, vec![])
    }

    /// pre -> header -> latch -> header | exit_a ; header -> exit_b ; both exits -> join
    fn two_exit_loop() -> Function {
        let mut func = Function::new("two_exits");
        let pre = func.add_block("pre");
        let header = func.add_block("header");
        let latch = func.add_block("latch");
        let exit_a = func.add_block("exit_a");
        let exit_b = func.add_block("exit_b");
        let join = func.add_block("join");
        func.push(pre, br(header));
        let t = cond(&mut func, latch, exit_b);
        func.push(header, t);
        let t = cond(&mut func, header, exit_a);
        func.push(latch, t);
        func.push(exit_a, br(join));
        func.push(exit_b, br(join));
        func.push(join, ret());
        func
    }

    #[test]
    fn test_exits_fold_to_common_post_dominator() {
        let mut func = two_exit_loop();
        let summary = structurize(&mut func).unwrap();
        assert_eq!(summary.loop_merges, 1);
        assert_eq!(summary.selection_merges, 0);
        assert_eq!(summary.sentinel, None);
        assert_eq!(
            func.block(BlockId(0)).insts[0],
            Instruction::loop_merge(BlockId(5), BlockId(2), LoopControl::NONE)
        );
        // Header and latch branch conditionally but belong to the loop construct.
        assert!(func.block(BlockId(1)).merge_annotation().is_none());
        assert!(func.block(BlockId(2)).merge_annotation().is_none());
    }

    #[test]
    fn test_failed_fold_leaves_function_untouched() {
        let mut func = two_exit_loop();
        let before = func.clone();
        let loops = LoopForest::compute(&func);
        let err = Structurizer::new(&NoCommonPostDominator, &loops)
            .run(&mut func)
            .unwrap_err();
        assert_eq!(err, StructurizeError::NoLoopMerge { header: BlockId(1) });
        assert_eq!(func, before);
    }

    #[test]
    fn test_loop_merge_appended_to_fallthrough_preheader() {
        // pre has no terminator and falls through into the header.
        let mut func = Function::new("fallthrough");
        let pre = func.add_block("pre");
        let header = func.add_block("header");
        let exit = func.add_block("exit");
        let t = cond(&mut func, header, exit);
        func.push(header, t);
        func.push(exit, ret());

        structurize(&mut func).unwrap();
        assert_eq!(
            func.block(pre).insts,
            vec![Instruction::loop_merge(exit, header, LoopControl::NONE)]
        );
    }

    #[test]
    fn test_missing_preheader_is_reported() {
        // Two outside predecessors of the header.
        let mut func = Function::new("no_preheader");
        let entry = func.add_block("entry");
        let side = func.add_block("side");
        let header = func.add_block("header");
        let exit = func.add_block("exit");
        let t = cond(&mut func, side, header);
        func.push(entry, t);
        func.push(side, br(header));
        let t = cond(&mut func, header, exit);
        func.push(header, t);
        func.push(exit, ret());

        let err = structurize(&mut func).unwrap_err();
        assert_eq!(err, StructurizeError::MalformedLoop { header, missing: "preheader" });
    }

    #[test]
    fn test_missing_latch_is_reported() {
        // body and back both branch to the header.
        let mut func = Function::new("two_latches");
        let pre = func.add_block("pre");
        let header = func.add_block("header");
        let body = func.add_block("body");
        let back = func.add_block("back");
        let exit = func.add_block("exit");
        func.push(pre, br(header));
        let t = cond(&mut func, body, exit);
        func.push(header, t);
        let t = cond(&mut func, header, back);
        func.push(body, t);
        func.push(back, br(header));
        func.push(exit, ret());

        let loops = LoopForest::compute(&func);
        assert_eq!(loops.len(), 1);
        assert_eq!(loops.get(LoopId(0)).preheader, Some(pre));

        let before = func.clone();
        let err = structurize(&mut func).unwrap_err();
        assert_eq!(err, StructurizeError::MalformedLoop { header, missing: "latch" });
        assert_eq!(func, before);
    }

    #[test]
    fn test_branch_before_last_instruction_is_rejected() {
        let mut func = Function::new("late_copy");
        let entry = func.add_block("entry");
        let a = func.add_block("a");
        let b = func.add_block("b");
        let t = cond(&mut func, a, b);
        func.push(entry, t);
        let copy = func.new_vreg();
        func.push(entry, Instruction::new(Opcode::COPY_OBJECT, vec![Operand::Reg(copy)]));
        func.push(a, ret());
        func.push(b, ret());

        let before = func.clone();
        let err = structurize(&mut func).unwrap_err();
        assert_eq!(err, StructurizeError::MisplacedTerminator { block: entry, index: 0 });
        assert_eq!(func, before);
    }

    #[test]
    fn test_switch_is_rejected() {
        let mut func = Function::new("switch");
        let entry = func.add_block("entry");
        let a = func.add_block("a");
        let b = func.add_block("b");
        let sel = func.new_vreg();
        func.push(
            entry,
            Instruction::new(
                Opcode::SWITCH,
                vec![Operand::Reg(sel), Operand::Block(a), Operand::Imm(1), Operand::Block(b)],
            ),
        );
        func.push(a, ret());
        func.push(b, ret());

        let before = func.clone();
        let err = structurize(&mut func).unwrap_err();
        assert_eq!(err, StructurizeError::UnsupportedSwitch { block: entry });
        assert_eq!(func, before);
    }

    #[test]
    fn test_unreachable_merge_for_exitless_loop() {
        let mut func = Function::new("spin");
        let pre = func.add_block("pre");
        let header = func.add_block("header");
        func.push(pre, br(header));
        func.push(header, br(header));

        let summary = structurize(&mut func).unwrap();
        let sentinel = summary.sentinel.unwrap();
        assert_eq!(sentinel, BlockId(2));
        assert_eq!(func.block(sentinel).name, "unreachable");
        assert_eq!(func.block(sentinel).terminator_kind(), Some(TerminatorKind::Unreachable));
        assert_eq!(
            func.block(pre).insts[0],
            Instruction::loop_merge(sentinel, header, LoopControl::NONE)
        );
    }

    #[test]
    fn test_sentinel_name_does_not_clash() {
        let mut func = Function::new("spin");
        let pre = func.add_block("unreachable");
        let header = func.add_block("header");
        func.push(pre, br(header));
        func.push(header, br(header));

        let sentinel = structurize(&mut func).unwrap().sentinel.unwrap();
        assert_eq!(func.block(sentinel).name, "unreachable.1");
    }
}
