//! Node identifiers with generational indices.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// UI-tree node identifier with generational index for stale reference detection.
///
/// The generation counter increments when a slot is reused after its node
/// was destroyed, so an id held across a destroy/create cycle is detected as
/// stale instead of silently aliasing the new node.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NodeId {
    /// Index into node storage.
    pub index: u32,
    /// Generation counter for stale reference detection.
    pub generation: u32,
}

impl NodeId {
    /// Creates a new node ID with the given index and generation.
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.index)
    }
}
