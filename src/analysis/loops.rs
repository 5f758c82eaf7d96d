//! Natural loop forest.
//!
//! Loops are found from back edges (an edge whose target dominates its source)
//! and stored in an arena indexed by [`LoopId`]. Loops are numbered in reverse
//! post-order of their headers, so a parent always has a smaller id than its
//! children and top-level loops come out in program order.

use hashbrown::{HashMap, HashSet};

use super::cfg::Cfg;
use super::dominators::DominatorTree;
use crate::ir::{BlockId, Function};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoopId(pub u32);

impl LoopId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loop {
    pub header: BlockId,
    /// Unique in-loop predecessor of the header.
    pub latch: Option<BlockId>,
    /// Unique out-of-loop predecessor of the header whose only successor is
    /// the header.
    pub preheader: Option<BlockId>,
    /// Loop body in layout order, header included.
    pub blocks: Vec<BlockId>,
    /// Out-of-loop successors of loop blocks, deduplicated, in layout order.
    pub exits: Vec<BlockId>,
    pub parent: Option<LoopId>,
    pub children: Vec<LoopId>,
}

impl Loop {
    pub fn contains(&self, block: BlockId) -> bool {
        self.blocks.binary_search(&block).is_ok()
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoopForest {
    loops: Vec<Loop>,
    top_level: Vec<LoopId>,
}

impl LoopForest {
    /// Compute the forest for `func` from scratch.
    pub fn compute(func: &Function) -> Self {
        let cfg = Cfg::new(func);
        let dom = DominatorTree::new(&cfg);
        Self::new(&cfg, &dom)
    }

    pub fn new(cfg: &Cfg, dom: &DominatorTree) -> Self {
        // Gather bodies per header; back edges sharing a header form one loop.
        let mut bodies: HashMap<BlockId, HashSet<BlockId>> = HashMap::new();
        for block in cfg.reverse_post_order() {
            for &succ in cfg.succs(block) {
                if !dom.dominates(succ, block) {
                    continue;
                }
                // Walk backwards from the latch; the header stops the walk
                // because it is already in the body.
                let body = bodies.entry(succ).or_default();
                body.insert(succ);
                let mut worklist = vec![block];
                while let Some(cur) = worklist.pop() {
                    if body.insert(cur) {
                        worklist.extend(cfg.preds(cur).iter().copied().filter(|p| dom.is_reachable(*p)));
                    }
                }
            }
        }

        let mut headers: Vec<BlockId> = bodies.keys().copied().collect();
        headers.sort_by_key(|h| dom.rpo_number(*h).unwrap_or(usize::MAX));

        let mut loops: Vec<Loop> = headers
            .iter()
            .map(|&header| {
                let mut blocks: Vec<BlockId> = bodies[&header].iter().copied().collect();
                blocks.sort();
                Self::describe(cfg, header, blocks)
            })
            .collect();

        // Parent = smallest other loop containing this header. Natural loops
        // of a reducible graph are either nested or disjoint.
        for idx in 0..loops.len() {
            let header = loops[idx].header;
            let parent = (0..loops.len())
                .filter(|&other| other != idx && loops[other].contains(header))
                .min_by_key(|&other| loops[other].blocks.len())
                .map(|other| LoopId(other as u32));
            loops[idx].parent = parent;
        }

        let mut top_level = Vec::new();
        for idx in 0..loops.len() {
            let id = LoopId(idx as u32);
            match loops[idx].parent {
                Some(parent) => loops[parent.index()].children.push(id),
                None => top_level.push(id),
            }
        }

        log::debug!("loop forest: {} loops, {} top-level", loops.len(), top_level.len());
        Self { loops, top_level }
    }

    fn describe(cfg: &Cfg, header: BlockId, blocks: Vec<BlockId>) -> Loop {
        let in_loop = |b: BlockId| blocks.binary_search(&b).is_ok();

        let inside: Vec<BlockId> = cfg.preds(header).iter().copied().filter(|&p| in_loop(p)).collect();
        let outside: Vec<BlockId> = cfg.preds(header).iter().copied().filter(|&p| !in_loop(p)).collect();

        let latch = match inside.as_slice() {
            [only] => Some(*only),
            _ => None,
        };
        let preheader = match outside.as_slice() {
            [only] if cfg.succs(*only) == [header] => Some(*only),
            _ => None,
        };

        let mut exits = Vec::new();
        for &block in &blocks {
            for &succ in cfg.succs(block) {
                if !in_loop(succ) && !exits.contains(&succ) {
                    exits.push(succ);
                }
            }
        }
        exits.sort();

        Loop {
            header,
            latch,
            preheader,
            blocks,
            exits,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.loops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }

    pub fn top_level(&self) -> &[LoopId] {
        &self.top_level
    }

    pub fn get(&self, id: LoopId) -> &Loop {
        &self.loops[id.index()]
    }
}
