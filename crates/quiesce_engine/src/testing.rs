//! A minimal host view for unit tests.

use quiesce_foundation::{Clock, MemoryProbe, MemorySnapshot};
use quiesce_tree::Tree;

use crate::host::HostEnv;

/// Manually advanced clock plus a tree; no timers or network.
pub(crate) struct FakeEnv {
    pub(crate) now: f64,
    pub(crate) tree: Tree,
    pub(crate) memory: Option<MemorySnapshot>,
}

impl FakeEnv {
    pub(crate) fn new() -> Self {
        Self {
            now: 0.0,
            tree: Tree::new(),
            memory: None,
        }
    }

    pub(crate) fn advance(&mut self, ms: f64) {
        self.now += ms;
    }
}

impl Clock for FakeEnv {
    fn now(&self) -> f64 {
        self.now
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn wall_clock_ms(&self) -> u64 {
        1_700_000_000_000 + self.now as u64
    }
}

impl MemoryProbe for FakeEnv {
    fn memory(&self) -> Option<MemorySnapshot> {
        self.memory
    }
}

impl HostEnv for FakeEnv {
    type Tree = Tree;

    fn tree(&self) -> &Tree {
        &self.tree
    }
}
