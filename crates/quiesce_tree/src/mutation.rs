//! Mutation records delivered in batches after a turn changes the tree.

use quiesce_foundation::NodeId;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Kind of change a record describes.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MutationKind {
    /// An attribute of `target` was set or removed.
    Attribute {
        /// The attribute name.
        name: String,
    },
    /// Children of `target` were added or removed.
    ChildList,
}

/// A single structural or attribute change.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MutationRecord {
    /// What changed.
    pub kind: MutationKind,
    /// The node whose attributes or child list changed.
    pub target: NodeId,
    /// Nodes appended under `target`.
    pub added: Vec<NodeId>,
    /// Nodes detached from `target`.
    pub removed: Vec<NodeId>,
}

impl MutationRecord {
    /// Creates an attribute change record.
    #[must_use]
    pub fn attribute(target: NodeId, name: impl Into<String>) -> Self {
        Self {
            kind: MutationKind::Attribute { name: name.into() },
            target,
            added: Vec::new(),
            removed: Vec::new(),
        }
    }

    /// Creates a child-list record for a single appended node.
    #[must_use]
    pub fn added(target: NodeId, node: NodeId) -> Self {
        Self {
            kind: MutationKind::ChildList,
            target,
            added: vec![node],
            removed: Vec::new(),
        }
    }

    /// Creates a child-list record for a single detached node.
    #[must_use]
    pub fn removed(target: NodeId, node: NodeId) -> Self {
        Self {
            kind: MutationKind::ChildList,
            target,
            added: Vec::new(),
            removed: vec![node],
        }
    }

    /// Returns true for child-list records.
    #[must_use]
    pub fn is_child_list(&self) -> bool {
        matches!(self.kind, MutationKind::ChildList)
    }
}
