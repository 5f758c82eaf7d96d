//! Successor and predecessor lists for one function.

use crate::ir::{BlockId, Function};

/// Snapshot of a function's control flow graph.
///
/// Built once before structurization; merge annotations never add edges, so
/// the snapshot stays valid while the structurizer inserts them.
#[derive(Debug, Clone)]
pub struct Cfg {
    succs: Vec<Vec<BlockId>>,
    preds: Vec<Vec<BlockId>>,
    entry: BlockId,
}

impl Cfg {
    pub fn new(func: &Function) -> Self {
        let n = func.num_blocks();
        let mut succs = Vec::with_capacity(n);
        let mut preds = vec![Vec::new(); n];
        for block in func.block_ids() {
            // Targets outside the function are left for the emitter to reject.
            let block_succs: Vec<BlockId> =
                func.successors(block).into_iter().filter(|s| s.index() < n).collect();
            for &succ in &block_succs {
                if !preds[succ.index()].contains(&block) {
                    preds[succ.index()].push(block);
                }
            }
            succs.push(block_succs);
        }
        Self { succs, preds, entry: func.entry() }
    }

    pub fn num_blocks(&self) -> usize {
        self.succs.len()
    }

    pub fn entry(&self) -> BlockId {
        self.entry
    }

    pub fn succs(&self, block: BlockId) -> &[BlockId] {
        &self.succs[block.index()]
    }

    pub fn preds(&self, block: BlockId) -> &[BlockId] {
        &self.preds[block.index()]
    }

    /// Blocks reachable from the entry, in reverse post-order.
    pub fn reverse_post_order(&self) -> Vec<BlockId> {
        if self.succs.is_empty() {
            return Vec::new();
        }
        let adjacency: Vec<Vec<usize>> = self
            .succs
            .iter()
            .map(|s| s.iter().map(|b| b.index()).collect())
            .collect();
        reverse_post_order(self.entry.index(), &adjacency)
            .into_iter()
            .map(|idx| BlockId(idx as u32))
            .collect()
    }
}

/// Depth-first reverse post-order over an index graph.
pub(crate) fn reverse_post_order(root: usize, succs: &[Vec<usize>]) -> Vec<usize> {
    let mut post = Vec::with_capacity(succs.len());
    let mut visited = vec![false; succs.len()];
    let mut stack = vec![(root, false)];
    while let Some((node, processed)) = stack.pop() {
        if processed {
            post.push(node);
            continue;
        }
        if visited[node] {
            continue;
        }
        visited[node] = true;
        stack.push((node, true));
        // Reverse so the first successor is explored first.
        for &succ in succs[node].iter().rev() {
            if !visited[succ] {
                stack.push((succ, false));
            }
        }
    }
    post.reverse();
    post
}
