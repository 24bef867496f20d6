//! Tree inspection through the `TreeInspector` trait

use quiesce_foundation::{ErrorKind, NodeId};
use quiesce_tree::{Tree, TreeInspector};

/// Builds `<body><ul tc=list><li>one</li><li>two</li></ul></body>`.
fn list_page() -> (Tree, NodeId, Vec<NodeId>) {
    let mut tree = Tree::new();
    let root = tree.root();
    let list = tree.create_element_with("ul", &[("tc", "list")]);
    tree.append_child(root, list).unwrap();
    let mut items = Vec::new();
    for text in ["one", "two"] {
        let item = tree.create_element("li");
        let label = tree.create_text(text);
        tree.append_child(item, label).unwrap();
        tree.append_child(list, item).unwrap();
        items.push(item);
    }
    (tree, list, items)
}

fn depth_of(inspector: &dyn TreeInspector, node: NodeId) -> usize {
    let mut depth = 0;
    let mut cursor = inspector.parent(node);
    while let Some(parent) = cursor {
        depth += 1;
        cursor = inspector.parent(parent);
    }
    depth
}

// =============================================================================
// Walks
// =============================================================================

#[test]
fn walks_work_through_a_trait_object() {
    let (tree, list, items) = list_page();
    let inspector: &dyn TreeInspector = &tree;

    assert_eq!(inspector.children(list), items.as_slice());
    assert_eq!(depth_of(inspector, items[0]), 2);
    assert_eq!(inspector.top(items[1]), tree.root());
    assert_eq!(inspector.attribute(list, "tc"), Some("list"));
}

#[test]
fn text_content_follows_document_order() {
    let (tree, list, _) = list_page();
    assert_eq!(tree.text_content(list), "onetwo");
    assert_eq!(tree.text_content(tree.root()), "onetwo");
}

#[test]
fn text_nodes_are_identified() {
    let (tree, _, items) = list_page();
    let text = tree.children(items[0])[0];
    assert!(tree.is_text(text));
    assert!(!tree.is_text(items[0]));
    assert_eq!(tree.attribute(text, "tc"), None);
}

#[test]
fn detached_subtree_reports_its_own_top() {
    let (mut tree, list, items) = list_page();
    tree.remove(list).unwrap();

    assert!(!tree.is_connected(items[0]));
    assert_eq!(tree.top(items[0]), list);
    assert_eq!(tree.parent(list), None);
    assert_eq!(tree.text_content(list), "onetwo");
}

#[test]
fn unknown_ids_answer_empty() {
    let (mut tree, list, items) = list_page();
    tree.destroy(list).unwrap();

    assert!(!tree.contains(items[0]));
    assert!(tree.children(list).is_empty());
    assert_eq!(tree.parent(items[0]), None);
    assert_eq!(tree.text_content(items[0]), "");
}

// =============================================================================
// Slot Reuse
// =============================================================================

#[test]
fn reused_slot_rejects_old_id() {
    let mut tree = Tree::new();
    let old = tree.create_element("div");
    tree.destroy(old).unwrap();
    let new = tree.create_element("span");

    assert_eq!(old.index, new.index);
    assert_ne!(old, new);
    let err = tree.set_attribute(old, "tc", "x").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::StaleNode(_)));
    assert!(tree.set_attribute(new, "tc", "x").is_ok());
}

#[test]
fn len_tracks_live_nodes() {
    let (mut tree, list, _) = list_page();
    assert_eq!(tree.len(), 6);
    tree.destroy(list).unwrap();
    assert_eq!(tree.len(), 1);
    assert!(tree.is_empty());
}
