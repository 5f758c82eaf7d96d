// Dominator and post-dominator trees computed with the iterative Cooper-Harvey-Kennedy
// algorithm over reverse post-order numbers. The post-dominator tree runs the same
// solver on the reversed CFG rooted at a virtual exit node. Every block without
// successors hangs off the virtual exit; blocks that can never reach such a block
// (the bodies of infinite loops) would otherwise be left out of the tree, so the
// latest of them in forward reverse post-order is attached to the virtual exit as an
// extra root, repeatedly, until every block reachable from the entry is covered.
// Queries that resolve to the virtual exit report "no common post-dominator".

//! Dominance queries.

use super::cfg::{reverse_post_order, Cfg};
use crate::ir::BlockId;

const UNDEF: usize = usize::MAX;

/// Nearest-common-post-dominator queries, as consumed by the structurizer.
pub trait PostDominance {
    /// Tightest block that post-dominates both `a` and `b`, `None` when the only
    /// common bound is the function exit itself or a block is unknown.
    fn nearest_common_post_dominator(&self, a: BlockId, b: BlockId) -> Option<BlockId>;

    /// Whether `a` post-dominates `b`.
    fn post_dominates(&self, a: BlockId, b: BlockId) -> bool {
        self.nearest_common_post_dominator(a, b) == Some(a)
    }
}

/// Immediate dominators over an index graph.
#[derive(Debug, Clone)]
struct DomSolver {
    idom: Vec<usize>,
    rpo_number: Vec<usize>,
}

impl DomSolver {
    fn solve(root: usize, succs: &[Vec<usize>], preds: &[Vec<usize>]) -> Self {
        let n = succs.len();
        let rpo = reverse_post_order(root, succs);
        let mut rpo_number = vec![UNDEF; n];
        for (number, &node) in rpo.iter().enumerate() {
            rpo_number[node] = number;
        }

        let mut idom = vec![UNDEF; n];
        idom[root] = root;

        let mut changed = true;
        while changed {
            changed = false;
            for &node in rpo.iter().skip(1) {
                let mut new_idom = UNDEF;
                for &pred in &preds[node] {
                    if idom[pred] == UNDEF {
                        continue;
                    }
                    new_idom = if new_idom == UNDEF {
                        pred
                    } else {
                        intersect(pred, new_idom, &idom, &rpo_number)
                    };
                }
                if new_idom != UNDEF && idom[node] != new_idom {
                    idom[node] = new_idom;
                    changed = true;
                }
            }
        }

        Self { idom, rpo_number }
    }

    fn is_reachable(&self, node: usize) -> bool {
        node < self.idom.len() && self.idom[node] != UNDEF
    }

    fn nearest_common(&self, a: usize, b: usize) -> Option<usize> {
        if !self.is_reachable(a) || !self.is_reachable(b) {
            return None;
        }
        Some(intersect(a, b, &self.idom, &self.rpo_number))
    }

    fn dominates(&self, a: usize, b: usize) -> bool {
        if !self.is_reachable(a) || !self.is_reachable(b) {
            return false;
        }
        let mut cur = b;
        loop {
            if cur == a {
                return true;
            }
            let parent = self.idom[cur];
            if parent == cur {
                return false;
            }
            cur = parent;
        }
    }

    fn idom(&self, node: usize) -> Option<usize> {
        match self.idom.get(node) {
            Some(&parent) if parent != UNDEF && parent != node => Some(parent),
            _ => None,
        }
    }
}

fn intersect(mut a: usize, mut b: usize, idom: &[usize], rpo_number: &[usize]) -> usize {
    while a != b {
        while rpo_number[a] > rpo_number[b] {
            a = idom[a];
        }
        while rpo_number[b] > rpo_number[a] {
            b = idom[b];
        }
    }
    a
}

fn index_graph(cfg: &Cfg) -> (Vec<Vec<usize>>, Vec<Vec<usize>>) {
    let n = cfg.num_blocks();
    let mut succs = Vec::with_capacity(n);
    let mut preds = Vec::with_capacity(n);
    for idx in 0..n {
        let block = BlockId(idx as u32);
        succs.push(cfg.succs(block).iter().map(|b| b.index()).collect());
        preds.push(cfg.preds(block).iter().map(|b| b.index()).collect());
    }
    (succs, preds)
}

/// Forward dominator tree rooted at the entry block.
#[derive(Debug, Clone)]
pub struct DominatorTree {
    solver: DomSolver,
}

impl DominatorTree {
    pub fn new(cfg: &Cfg) -> Self {
        let (succs, preds) = index_graph(cfg);
        if succs.is_empty() {
            return Self { solver: DomSolver { idom: Vec::new(), rpo_number: Vec::new() } };
        }
        Self { solver: DomSolver::solve(cfg.entry().index(), &succs, &preds) }
    }

    /// Whether `a` dominates `b`; false for unreachable blocks.
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        self.solver.dominates(a.index(), b.index())
    }

    pub fn idom(&self, block: BlockId) -> Option<BlockId> {
        self.solver.idom(block.index()).map(|idx| BlockId(idx as u32))
    }

    pub fn is_reachable(&self, block: BlockId) -> bool {
        self.solver.is_reachable(block.index())
    }

    /// Position of `block` in reverse post-order, `None` when unreachable.
    pub fn rpo_number(&self, block: BlockId) -> Option<usize> {
        match self.solver.rpo_number.get(block.index()) {
            Some(&number) if number != UNDEF => Some(number),
            _ => None,
        }
    }
}

/// Post-dominator tree rooted at a virtual exit.
#[derive(Debug, Clone)]
pub struct PostDominatorTree {
    solver: DomSolver,
    virtual_exit: usize,
    roots: Vec<BlockId>,
}

impl PostDominatorTree {
    pub fn new(cfg: &Cfg) -> Self {
        let n = cfg.num_blocks();
        let virtual_exit = n;
        let (fwd_succs, fwd_preds) = index_graph(cfg);
        let roots = Self::find_roots(cfg, &fwd_succs, &fwd_preds);

        // Reverse graph: an edge u -> v becomes v -> u, plus exit -> root.
        let mut succs: Vec<Vec<usize>> = fwd_preds;
        let mut preds: Vec<Vec<usize>> = fwd_succs;
        succs.push(roots.iter().map(|b| b.index()).collect());
        preds.push(Vec::new());
        for root in &roots {
            preds[root.index()].push(virtual_exit);
        }

        let solver = DomSolver::solve(virtual_exit, &succs, &preds);
        log::trace!("post-dominator tree over {} blocks, {} roots", n, roots.len());
        Self { solver, virtual_exit, roots }
    }

    /// Blocks attached directly to the virtual exit: function exits first, then
    /// the extra roots chosen for regions that never reach an exit.
    pub fn roots(&self) -> &[BlockId] {
        &self.roots
    }

    fn find_roots(cfg: &Cfg, succs: &[Vec<usize>], preds: &[Vec<usize>]) -> Vec<BlockId> {
        let n = succs.len();
        let mut roots: Vec<usize> = (0..n).filter(|&idx| succs[idx].is_empty()).collect();

        let mut reached = vec![false; n];
        let mut worklist: Vec<usize> = roots.clone();
        let mark = |worklist: &mut Vec<usize>, reached: &mut Vec<bool>| {
            while let Some(node) = worklist.pop() {
                if reached[node] {
                    continue;
                }
                reached[node] = true;
                worklist.extend(preds[node].iter().copied().filter(|&p| !reached[p]));
            }
        };
        mark(&mut worklist, &mut reached);

        let forward_rpo: Vec<BlockId> = cfg.reverse_post_order();
        loop {
            let Some(extra) = forward_rpo.iter().rev().find(|b| !reached[b.index()]) else {
                break;
            };
            roots.push(extra.index());
            worklist.push(extra.index());
            mark(&mut worklist, &mut reached);
        }

        roots.into_iter().map(|idx| BlockId(idx as u32)).collect()
    }

    fn to_block(&self, node: usize) -> Option<BlockId> {
        (node != self.virtual_exit).then_some(BlockId(node as u32))
    }

    /// Immediate post-dominator, `None` for blocks hanging off the virtual exit.
    pub fn ipdom(&self, block: BlockId) -> Option<BlockId> {
        self.solver.idom(block.index()).and_then(|idx| self.to_block(idx))
    }
}

impl PostDominance for PostDominatorTree {
    fn nearest_common_post_dominator(&self, a: BlockId, b: BlockId) -> Option<BlockId> {
        if a.index() >= self.virtual_exit || b.index() >= self.virtual_exit {
            return None;
        }
        self.solver
            .nearest_common(a.index(), b.index())
            .and_then(|idx| self.to_block(idx))
    }

    fn post_dominates(&self, a: BlockId, b: BlockId) -> bool {
        a.index() < self.virtual_exit
            && b.index() < self.virtual_exit
            && self.solver.dominates(a.index(), b.index())
    }
}
