//! Read-only tree inspection consumed by the engine.

use quiesce_foundation::NodeId;

/// Walks the engine needs over a host UI tree.
///
/// Every method tolerates ids the tree no longer knows: lookups answer
/// `None`, an empty slice, or an empty string rather than failing, because
/// instrumentation must never perturb the host.
pub trait TreeInspector {
    /// The observed root node.
    fn root(&self) -> NodeId;

    /// Returns true if the id refers to a live node (attached or detached).
    fn contains(&self, node: NodeId) -> bool;

    /// Returns the node's parent, or `None` for the root and detached nodes.
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Returns the node's children in document order.
    fn children(&self, node: NodeId) -> &[NodeId];

    /// Returns true for text-only nodes.
    fn is_text(&self, node: NodeId) -> bool;

    /// Returns an attribute value of an element node.
    fn attribute(&self, node: NodeId, name: &str) -> Option<&str>;

    /// Returns the concatenated text of the node and all its descendants.
    fn text_content(&self, node: NodeId) -> String;

    /// Returns the topmost ancestor reachable from `node` (itself if parentless).
    fn top(&self, node: NodeId) -> NodeId {
        let mut current = node;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    /// Returns true if the node is reachable from the root.
    fn is_connected(&self, node: NodeId) -> bool {
        self.contains(node) && self.top(node) == self.root()
    }
}
