//! Component labels extracted from the UI tree.
//!
//! A node's label is the first non-empty value among its label attributes
//! after the ignore pattern has been stripped from it.

use quiesce_foundation::NodeId;
use quiesce_tree::TreeInspector;
use regex::Regex;

use crate::config::EngineConfig;

/// Result of walking a node's ancestry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AncestorWalk {
    /// Labels from the node up to its topmost ancestor.
    pub labels: Vec<String>,
    /// The topmost ancestor reached.
    pub top: NodeId,
}

/// Extracts labels from tree nodes.
#[derive(Clone, Debug)]
pub struct Labeler {
    attributes: Vec<String>,
    ignore: Option<Regex>,
    text_limit: usize,
}

impl Labeler {
    /// Creates a labeler.
    #[must_use]
    pub fn new(attributes: Vec<String>, ignore: Option<Regex>, text_limit: usize) -> Self {
        Self {
            attributes,
            ignore,
            text_limit,
        }
    }

    /// Creates a labeler from engine configuration.
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.label_attributes.clone(),
            config.ignore_label_pattern.clone(),
            config.text_label_limit,
        )
    }

    /// Returns the label of a single node.
    ///
    /// Text nodes and unknown ids have no label.
    #[must_use]
    pub fn label<T: TreeInspector + ?Sized>(&self, tree: &T, node: NodeId) -> Option<String> {
        if !tree.contains(node) || tree.is_text(node) {
            return None;
        }
        self.attributes.iter().find_map(|name| {
            let value = tree.attribute(node, name)?;
            let cleaned = match &self.ignore {
                Some(pattern) => pattern.replace_all(value, ""),
                None => value.into(),
            };
            let cleaned = cleaned.trim();
            (!cleaned.is_empty()).then(|| cleaned.to_string())
        })
    }

    /// Collects labels from `node` up through its ancestors.
    ///
    /// With `text_for_first`, an unlabeled starting node contributes the
    /// first characters of its text content instead, when it has any.
    #[must_use]
    pub fn ancestors<T: TreeInspector + ?Sized>(
        &self,
        tree: &T,
        node: NodeId,
        text_for_first: bool,
    ) -> AncestorWalk {
        let mut labels = Vec::new();
        let mut cursor = node;
        if let Some(label) = self.label(tree, cursor) {
            labels.push(label);
        } else if text_for_first {
            let text: String = tree.text_content(cursor).chars().take(self.text_limit).collect();
            if !text.is_empty() {
                labels.push(text);
            }
        }
        while let Some(parent) = tree.parent(cursor) {
            cursor = parent;
            if let Some(label) = self.label(tree, cursor) {
                labels.push(label);
            }
        }
        AncestorWalk {
            labels,
            top: cursor,
        }
    }

    /// Collects labels of `node` and every descendant, in preorder.
    #[must_use]
    pub fn subtree<T: TreeInspector + ?Sized>(&self, tree: &T, node: NodeId) -> Vec<String> {
        let mut labels = Vec::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if let Some(label) = self.label(tree, current) {
                labels.push(label);
            }
            stack.extend(tree.children(current).iter().rev());
        }
        labels
    }
}

impl Default for Labeler {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}
