//! Integration tests for tree construction and addressing
//!
//! Tests child lookup by path and pattern, aliases, groups, tags, and privacy.

use proptest::prelude::*;
use simtree::foundation::{ErrorKind, NodeId};
use simtree::node::{Forest, NodeSpec};

fn chain() -> (Forest, [NodeId; 4]) {
    let mut forest = Forest::new();
    let top = forest.create_root("top", "root").unwrap();
    let a = forest.create_node(Some(top), NodeSpec::new("a", "level a")).unwrap();
    let b = forest.create_node(Some(a), NodeSpec::new("b", "level b")).unwrap();
    let c = forest.create_node(Some(b), NodeSpec::new("c", "level c")).unwrap();
    (forest, [top, a, b, c])
}

// =============================================================================
// Construction and Addressing
// =============================================================================

#[test]
fn dotted_paths_resolve() {
    let (forest, [top, a, b, c]) = chain();
    assert_eq!(forest.get_child(top, "a.b.c").unwrap(), c);
    assert_eq!(forest.get_child(a, "b").unwrap(), b);
    assert_eq!(forest.location(c).unwrap(), "top.a.b.c");
}

#[test]
fn patterns_return_captures() {
    let (forest, [top, _, _, c]) = chain();
    let found = forest.find_children(top, "a.b.*").unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].node, c);
    assert_eq!(found[0].captures, vec!["c".to_owned()]);
}

#[test]
fn missing_child_is_not_found() {
    let (forest, [top, ..]) = chain();
    let err = forest.get_child(top, "a.x").unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(forest.get_child_if_exists(top, "a.x").unwrap(), None);
}

#[test]
fn empty_component_ascends() {
    let (forest, [top, a, b, c]) = chain();
    assert_eq!(forest.get_child(c, "").unwrap(), b);
    assert_eq!(forest.get_child(c, "..b").unwrap(), b);
    assert_eq!(forest.get_child(c, ".").unwrap(), a);
    assert!(forest.get_child(top, "").unwrap_err().is_not_found());
}

#[test]
fn detached_nodes_stringize_with_tilde() {
    let mut forest = Forest::new();
    let loose = forest.create_node(None, NodeSpec::new("loose", "detached")).unwrap();
    let child = forest.create_node(Some(loose), NodeSpec::new("leaf", "leaf")).unwrap();
    assert_eq!(forest.location(child).unwrap(), "~loose.leaf");
    let root = forest.create_root("top", "root").unwrap();
    assert_eq!(forest.location(root).unwrap(), "top");
}

// =============================================================================
// Groups, Aliases and Tags
// =============================================================================

#[test]
fn group_members_resolve_by_index() {
    let mut forest = Forest::new();
    let top = forest.create_root("top", "root").unwrap();
    let anon = forest
        .create_node(Some(top), NodeSpec::anonymous("alu", 1, "alu"))
        .unwrap();
    assert_eq!(forest.get_child(top, "alu1").unwrap(), anon);
    assert_eq!(forest.display_name(anon).unwrap(), "alu[1]");
    let dup = forest.create_node(Some(top), NodeSpec::anonymous("alu", 1, "again"));
    assert!(matches!(dup.unwrap_err().kind, ErrorKind::Collision { .. }));
}

#[test]
fn aliases_are_identifiers_at_parent() {
    let mut forest = Forest::new();
    let top = forest.create_root("top", "root").unwrap();
    let core = forest.create_node(Some(top), NodeSpec::new("core", "core")).unwrap();
    forest.add_alias(core, "cpu").unwrap();
    assert_eq!(forest.get_child(top, "cpu").unwrap(), core);
    let other = forest.create_node(None, NodeSpec::new("cpu", "clash")).unwrap();
    assert!(matches!(forest.add_child(top, other).unwrap_err().kind, ErrorKind::Collision { .. }));
}

#[test]
fn tags_are_indexed() {
    let (mut forest, [top, a, _, c]) = chain();
    forest.add_tag(a, "hot").unwrap();
    forest.add_tag(c, "hot").unwrap();
    let mut within_one = forest.find_children_by_tag(top, "hot", 1).unwrap();
    within_one.sort();
    assert_eq!(within_one, vec![a]);
    let all = forest.find_children_by_tag(top, "hot", 10).unwrap();
    assert_eq!(all.len(), 2);
}

// =============================================================================
// Structure Rules
// =============================================================================

#[test]
fn cycles_and_double_attachment_are_rejected() {
    let (mut forest, [top, a, _, c]) = chain();
    let err = forest.add_child(c, a).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::InvalidStructure(_)));
    let err = forest.add_child(top, c).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::InvalidStructure(_)));
    let err = forest.add_child(a, a).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::InvalidStructure(_)));
}

#[test]
fn relocation_expires_old_handle() {
    let (mut forest, [top, a, b, _]) = chain();
    let moved = forest.relocate(a).unwrap();
    assert!(!forest.contains(a));
    assert!(matches!(forest.node(a).unwrap_err().kind, ErrorKind::Expired(_)));
    assert_eq!(forest.get_child(top, "a").unwrap(), moved);
    assert_eq!(forest.parent(b).unwrap(), Some(moved));
}

// =============================================================================
// Privacy
// =============================================================================

#[test]
fn private_subtrees_hide_from_public_lookup() {
    let (mut forest, [top, a, b, _]) = chain();
    forest.make_subtree_private(b).unwrap();
    assert!(forest.get_child(a, "b").unwrap_err().is_not_found());
    assert_eq!(forest.get_child_privileged(a, "b").unwrap(), b);
    assert!(forest.children(a).unwrap().is_empty());
    assert_eq!(forest.children_privileged(a).unwrap(), vec![b]);
    assert!(forest.find_children(top, "a.*").unwrap().is_empty());
}

#[test]
fn scope_root_is_nearest_flagged_ancestor() {
    let (mut forest, [top, a, _, c]) = chain();
    forest.set_scope_root(a).unwrap();
    assert_eq!(forest.scope_root(c).unwrap(), a);
    assert_eq!(forest.scope_root(top).unwrap(), top);
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn every_identifier_resolves_to_its_node(names in proptest::collection::hash_set("[a-z][a-z0-9]{0,5}", 1..12)) {
        let mut forest = Forest::new();
        let top = forest.create_root("top", "root").unwrap();
        let mut created = Vec::new();
        for name in &names {
            if simtree::foundation::ident::validate_name(name).is_err() {
                continue;
            }
            let id = forest.create_node(Some(top), NodeSpec::new(name.as_str(), "node")).unwrap();
            created.push((name.clone(), id));
        }
        for (name, id) in created {
            prop_assert_eq!(forest.get_child(top, &name).unwrap(), id);
        }
    }

    #[test]
    fn descendants_know_their_ancestors(depth in 1usize..20) {
        let mut forest = Forest::new();
        let mut chain = vec![forest.create_root("top", "root").unwrap()];
        for i in 0..depth {
            let parent = *chain.last().unwrap();
            chain.push(forest.create_node(Some(parent), NodeSpec::new(format!("n{i}"), "level")).unwrap());
        }
        for (i, &node) in chain.iter().enumerate() {
            for (j, &other) in chain.iter().enumerate() {
                prop_assert_eq!(forest.is_descendant_of(node, other).unwrap(), j <= i);
            }
        }
    }
}
