// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn tags(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn new_node_has_defaults() {
    let node = Node::new("builder");
    assert_eq!(node.name, "builder");
    assert_eq!(node.executors, DEFAULT_EXECUTORS);
    assert_eq!(node.busy, 0);
    assert!(node.tags.is_empty());
    assert!(node.has_free_executor());
}

#[test]
fn saturated_node_has_no_free_executor() {
    let mut node = Node::new("builder");
    node.executors = 2;
    node.busy = 2;
    assert!(!node.has_free_executor());
}

#[test]
fn tag_intersection() {
    let mut node = Node::new("linux-box");
    node.tags = tags(&["linux", "x86"]);

    assert!(node.matches_tags(&tags(&["linux"])));
    assert!(node.matches_tags(&tags(&["arm", "x86"])));
    assert!(!node.matches_tags(&tags(&["win"])));
    assert!(!node.matches_tags(&tags(&[])));
}
