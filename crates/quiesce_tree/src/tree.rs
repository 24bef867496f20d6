//! In-memory UI tree with generational node ids and mutation recording.
//!
//! The `Tree` owns every node it has created, attached or not. Detaching a
//! node keeps its subtree intact and inspectable (mutation consumers walk
//! removed subtrees after the fact); only `destroy` frees slots, bumping
//! their generation so that held ids are detected as stale.

use std::collections::BTreeMap;

use quiesce_foundation::{Error, ErrorKind, NodeId, Result};

use crate::inspect::TreeInspector;
use crate::mutation::MutationRecord;

// =============================================================================
// Nodes
// =============================================================================

/// What a node holds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// An element with a tag name; may carry attributes and children.
    Element {
        /// Tag name ("div", "button").
        tag: String,
    },
    /// A text-only leaf.
    Text {
        /// The text payload.
        text: String,
    },
}

/// A node in the tree.
#[derive(Clone, Debug)]
pub struct Node {
    kind: NodeKind,
    attributes: BTreeMap<String, String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            attributes: BTreeMap::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    /// Returns the node kind.
    #[must_use]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Returns the tag name for elements.
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Element { tag } => Some(tag),
            NodeKind::Text { .. } => None,
        }
    }

    /// Returns the element's attributes.
    #[must_use]
    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    /// Returns the parent, if attached.
    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Returns the children in document order.
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

#[derive(Clone, Debug)]
struct Slot {
    /// Even generations are free, odd generations are alive.
    generation: u32,
    node: Option<Node>,
}

// =============================================================================
// Tree
// =============================================================================

/// A generational UI tree that records mutations while observed.
#[derive(Clone, Debug)]
pub struct Tree {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    live_count: usize,
    root: NodeId,
    observing: bool,
    records: Vec<MutationRecord>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// Creates a tree holding only a `body` root element.
    #[must_use]
    pub fn new() -> Self {
        let mut tree = Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            live_count: 0,
            root: NodeId::new(0, 1),
            observing: false,
            records: Vec::new(),
        };
        tree.root = tree.alloc(Node::new(NodeKind::Element {
            tag: "body".to_string(),
        }));
        tree
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        self.live_count += 1;

        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            // Was even/free, now odd/alive
            slot.generation += 1;
            slot.node = Some(node);
            NodeId::new(index, slot.generation)
        } else {
            #[allow(clippy::cast_possible_truncation)]
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 1,
                node: Some(node),
            });
            NodeId::new(index, 1)
        }
    }

    /// Validates that a node id is live.
    pub fn validate(&self, id: NodeId) -> Result<()> {
        let Some(slot) = self.slots.get(id.index as usize) else {
            return Err(Error::node_not_found(id));
        };
        if slot.generation != id.generation {
            return Err(Error::stale_node(id));
        }
        if slot.node.is_none() {
            return Err(Error::node_not_found(id));
        }
        Ok(())
    }

    /// Returns the node for a live id.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    /// Returns the number of live nodes, including the root.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live_count
    }

    /// Returns true if only the root exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live_count <= 1
    }

    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Creates a detached element.
    pub fn create_element(&mut self, tag: impl Into<String>) -> NodeId {
        self.alloc(Node::new(NodeKind::Element { tag: tag.into() }))
    }

    /// Creates a detached element with initial attributes.
    ///
    /// Attributes set here precede attachment and so produce no records.
    pub fn create_element_with(&mut self, tag: impl Into<String>, attrs: &[(&str, &str)]) -> NodeId {
        let mut node = Node::new(NodeKind::Element { tag: tag.into() });
        for (name, value) in attrs {
            node.attributes.insert((*name).to_string(), (*value).to_string());
        }
        self.alloc(node)
    }

    /// Creates a detached text node.
    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(Node::new(NodeKind::Text { text: text.into() }))
    }

    // -------------------------------------------------------------------------
    // Mutation
    // -------------------------------------------------------------------------

    /// Sets an attribute on an element.
    pub fn set_attribute(
        &mut self,
        id: NodeId,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<()> {
        self.require_element(id)?;
        let name = name.into();
        if let Some(node) = self.get_mut(id) {
            node.attributes.insert(name.clone(), value.into());
        }
        if self.should_record(id) {
            self.records.push(MutationRecord::attribute(id, name));
        }
        Ok(())
    }

    /// Removes an attribute; returns whether it was present.
    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Result<bool> {
        self.require_element(id)?;
        let existed = self
            .get_mut(id)
            .is_some_and(|node| node.attributes.remove(name).is_some());
        if existed && self.should_record(id) {
            self.records.push(MutationRecord::attribute(id, name));
        }
        Ok(existed)
    }

    /// Appends `child` as the last child of `parent`.
    ///
    /// A child that already has a parent is moved, which records its removal
    /// from the old parent before the addition.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.require_element(parent)?;
        self.validate(child)?;
        if child == self.root {
            return Err(Error::new(ErrorKind::Internal(
                "the root cannot be moved".to_string(),
            )));
        }

        let mut cursor = Some(parent);
        while let Some(node) = cursor {
            if node == child {
                return Err(Error::new(ErrorKind::HierarchyCycle { parent, child }));
            }
            cursor = self.parent(node);
        }

        self.detach(child);
        if let Some(node) = self.get_mut(parent) {
            node.children.push(child);
        }
        if let Some(node) = self.get_mut(child) {
            node.parent = Some(parent);
        }
        if self.should_record(parent) {
            self.records.push(MutationRecord::added(parent, child));
        }
        Ok(())
    }

    /// Detaches a node from its parent. The subtree stays alive.
    ///
    /// Removing a parentless node (the root, or an already detached node) is
    /// a no-op.
    pub fn remove(&mut self, id: NodeId) -> Result<()> {
        self.validate(id)?;
        self.detach(id);
        Ok(())
    }

    /// Frees a node and its whole subtree, detaching it first if needed.
    pub fn destroy(&mut self, id: NodeId) -> Result<()> {
        self.validate(id)?;
        if id == self.root {
            return Err(Error::new(ErrorKind::Internal(
                "the root cannot be destroyed".to_string(),
            )));
        }
        self.detach(id);

        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(slot) = self.slots.get_mut(current.index as usize) else {
                continue;
            };
            if let Some(node) = slot.node.take() {
                stack.extend(node.children);
                // Was odd/alive, now even/free
                slot.generation += 1;
                self.free_list.push(current.index);
                self.live_count -= 1;
            }
        }
        Ok(())
    }

    fn detach(&mut self, id: NodeId) {
        let Some(old_parent) = self.parent(id) else {
            return;
        };
        if let Some(node) = self.get_mut(old_parent) {
            node.children.retain(|c| *c != id);
        }
        if let Some(node) = self.get_mut(id) {
            node.parent = None;
        }
        if self.should_record(old_parent) {
            self.records.push(MutationRecord::removed(old_parent, id));
        }
    }

    fn require_element(&self, id: NodeId) -> Result<()> {
        self.validate(id)?;
        if self.is_text(id) {
            return Err(Error::new(ErrorKind::NotAnElement(id)));
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Observation
    // -------------------------------------------------------------------------

    /// Starts recording mutations under the root.
    pub fn observe(&mut self) {
        self.observing = true;
    }

    /// Stops recording and drops undelivered records.
    pub fn disconnect(&mut self) {
        self.observing = false;
        self.records.clear();
    }

    /// Returns whether mutations are being recorded.
    #[must_use]
    pub fn is_observing(&self) -> bool {
        self.observing
    }

    /// Returns the records accumulated since the last take.
    #[must_use]
    pub fn pending_records(&self) -> &[MutationRecord] {
        &self.records
    }

    /// Drains the records accumulated since the last take.
    pub fn take_records(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.records)
    }

    fn should_record(&self, target: NodeId) -> bool {
        self.observing && self.is_connected(target)
    }
}

impl TreeInspector for Tree {
    fn root(&self) -> NodeId {
        self.root
    }

    fn contains(&self, node: NodeId) -> bool {
        self.get(node).is_some()
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.get(node).and_then(|n| n.parent)
    }

    fn children(&self, node: NodeId) -> &[NodeId] {
        self.get(node).map_or(&[][..], |n| n.children.as_slice())
    }

    fn is_text(&self, node: NodeId) -> bool {
        self.get(node)
            .is_some_and(|n| matches!(n.kind, NodeKind::Text { .. }))
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.get(node)
            .and_then(|n| n.attributes.get(name))
            .map(String::as_str)
    }

    fn text_content(&self, node: NodeId) -> String {
        let mut text = String::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            let Some(n) = self.get(current) else {
                continue;
            };
            match &n.kind {
                NodeKind::Text { text: t } => text.push_str(t),
                NodeKind::Element { .. } => stack.extend(n.children.iter().rev()),
            }
        }
        text
    }
}

// =============================================================================
// Tests
// =============================================================================
