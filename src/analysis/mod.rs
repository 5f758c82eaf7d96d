//! CFG analyses the structurizer queries: post-dominance and the loop forest.

pub mod cfg;
pub mod dominators;
pub mod loops;

pub use cfg::Cfg;
pub use dominators::{DominatorTree, PostDominance, PostDominatorTree};
pub use loops::{Loop, LoopForest, LoopId};
