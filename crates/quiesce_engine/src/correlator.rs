//! Mutation correlation.
//!
//! Turns a batch of tree mutations into per-component change counts, and
//! recovers the ancestry of timelines whose trigger target was inside a
//! subtree that had already been detached when the timeline was created.

use std::collections::{BTreeMap, HashMap};

use quiesce_foundation::NodeId;
use quiesce_tree::{MutationKind, MutationRecord, TreeInspector};

use crate::labels::Labeler;
use crate::timeline::Timeline;

// =============================================================================
// Render Summary
// =============================================================================

/// Change counts keyed by `"<label> ATTR"`, `"<label> ADD"`, `"<label> REMOVE"`
/// or `"<label> TEXT"`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderSummary {
    counts: BTreeMap<String, u32>,
}

impl RenderSummary {
    /// Creates an empty summary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one change to `label` of the given kind.
    pub fn record(&mut self, label: &str, kind: &str) {
        *self.counts.entry(format!("{label} {kind}")).or_insert(0) += 1;
    }

    /// Returns the count for a key such as `"submit-btn ADD"`.
    #[must_use]
    pub fn count(&self, key: &str) -> u32 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Returns `"<key> <count>"` entries, sorted by key.
    #[must_use]
    pub fn components(&self) -> Vec<String> {
        self.counts
            .iter()
            .map(|(key, count)| format!("{key} {count}"))
            .collect()
    }

    /// Returns the total number of changes counted.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.counts.values().sum()
    }

    /// Returns true if nothing was counted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Counts labeled changes in a mutation batch.
///
/// Added or removed element subtrees count once per label found inside
/// them. A subtree without any label is attributed to the record target.
#[must_use]
pub fn summarize<T: TreeInspector + ?Sized>(
    labeler: &Labeler,
    tree: &T,
    records: &[MutationRecord],
) -> RenderSummary {
    let mut summary = RenderSummary::new();
    for record in records {
        match &record.kind {
            MutationKind::Attribute { .. } => {
                if let Some(label) = labeler.label(tree, record.target) {
                    summary.record(&label, "ATTR");
                }
            }
            MutationKind::ChildList => {
                let target_label = labeler.label(tree, record.target);
                let changes = record
                    .added
                    .iter()
                    .map(|n| (*n, "ADD"))
                    .chain(record.removed.iter().map(|n| (*n, "REMOVE")));
                for (node, kind) in changes {
                    if tree.is_text(node) {
                        if let Some(label) = &target_label {
                            summary.record(label, "TEXT");
                        }
                        continue;
                    }
                    let labels = labeler.subtree(tree, node);
                    if labels.is_empty() {
                        // An unlabeled spinner added to a labeled button reads
                        // as "submit-btn ADD 1", not as an empty render.
                        if let Some(label) = &target_label {
                            summary.record(label, kind);
                        }
                    } else {
                        for label in &labels {
                            summary.record(label, kind);
                        }
                    }
                }
            }
        }
    }
    summary
}

// =============================================================================
// Detached Recovery
// =============================================================================

/// Extends a timeline's labels when its retained subtree shows up as removed.
///
/// The retained parent is looked up among the batch's removed nodes; the
/// ancestry of the parent it was removed from is appended. If that ancestry
/// is still detached, its top becomes the new retained parent and the
/// lookup repeats. Returns true if any labels were appended.
pub fn recover_detached<T: TreeInspector + ?Sized>(
    labeler: &Labeler,
    tree: &T,
    timeline: &mut Timeline,
    records: &[MutationRecord],
) -> bool {
    let Some(mut retained) = timeline.retained_parent else {
        return false;
    };
    let removed_from: HashMap<NodeId, NodeId> = records
        .iter()
        .filter(|r| r.is_child_list())
        .flat_map(|r| r.removed.iter().map(move |node| (*node, r.target)))
        .collect();

    let mut recovered = false;
    while let Some(former_parent) = removed_from.get(&retained) {
        let walk = labeler.ancestors(tree, *former_parent, false);
        timeline.components.extend(walk.labels);
        recovered = true;
        if walk.top == tree.root() {
            timeline.retained_parent = None;
            break;
        }
        if walk.top == retained {
            break;
        }
        retained = walk.top;
        timeline.retained_parent = Some(retained);
    }
    recovered
}
