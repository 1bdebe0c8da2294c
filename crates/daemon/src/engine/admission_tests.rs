// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;

fn tags(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn node(name: &str, executors: u32, busy: u32, node_tags: &[&str]) -> Node {
    let mut node = Node::new(name);
    node.executors = executors;
    node.busy = busy;
    node.tags = tags(node_tags);
    node
}

#[test]
fn busy_node_rejects() {
    let node = node("a", 1, 1, &[]);
    assert!(!node_can_queue(&node, None));
    assert!(!node_can_queue(&node, Some(&tags(&["x"]))));
}

#[test]
fn untagged_node_accepts_anything() {
    let node = node("a", 1, 0, &[]);
    assert!(node_can_queue(&node, None));
    assert!(node_can_queue(&node, Some(&tags(&["x"]))));
}

#[test]
fn tagged_node_rejects_untagged_job() {
    let node = node("a", 1, 0, &["linux"]);
    assert!(!node_can_queue(&node, None));
}

#[test]
fn tagged_node_requires_intersection() {
    let node = node("a", 1, 0, &["linux", "x86"]);
    assert!(node_can_queue(&node, Some(&tags(&["linux"]))));
    assert!(!node_can_queue(&node, Some(&tags(&["win"]))));
}

fn state_with(nodes: Vec<Node>, job_tags: &[(&str, &[&str])]) -> EngineState {
    let mut state = EngineState::new(HashMap::new());
    for node in nodes {
        state.nodes.insert(node.name.clone(), node);
    }
    for (job, t) in job_tags {
        state.job_tags.insert(job.to_string(), tags(t));
    }
    state
}

#[test]
fn find_node_prefers_matching_tagged_node() {
    // untagged "a" sorts before tagged "b", but the tagged job should land
    // on the tagged node so "a" stays free for untagged work
    let state = state_with(
        vec![node("a", 1, 0, &[]), node("b", 1, 0, &["gpu"])],
        &[("render", &["gpu"])],
    );
    assert_eq!(find_node(&state, "render"), Some("b".to_string()));
}

#[test]
fn find_node_falls_back_to_untagged() {
    let state = state_with(
        vec![node("a", 1, 0, &[]), node("b", 1, 0, &["gpu"])],
        &[],
    );
    assert_eq!(find_node(&state, "plain"), Some("a".to_string()));
}

#[test]
fn find_node_respects_saturation() {
    let state = state_with(vec![node("a", 1, 1, &[])], &[]);
    assert_eq!(find_node(&state, "plain"), None);
}

#[test]
fn tagged_job_never_lands_on_mismatched_node() {
    let state = state_with(
        vec![node("a", 4, 0, &["linux"]), node("b", 4, 0, &["win"])],
        &[("build", &["linux"])],
    );
    assert_eq!(find_node(&state, "build"), Some("a".to_string()));

    let saturated = state_with(
        vec![node("a", 1, 1, &["linux"]), node("b", 4, 0, &["win"])],
        &[("build", &["linux"])],
    );
    assert_eq!(find_node(&saturated, "build"), None);
}

proptest! {
    /// The policy is work-conserving: whenever node_can_queue holds for some
    /// node, find_node returns a node for which it holds.
    #[test]
    fn find_node_agrees_with_policy(
        capacities in proptest::collection::vec(0u32..3, 1..4),
        busies in proptest::collection::vec(0u32..3, 1..4),
        node_tagged in proptest::collection::vec(any::<bool>(), 1..4),
        job_tagged in any::<bool>(),
    ) {
        let n = capacities.len().min(busies.len()).min(node_tagged.len());
        let mut nodes = Vec::new();
        for i in 0..n {
            let tag_list: &[&str] = if node_tagged[i] { &["t"] } else { &[] };
            nodes.push(node(&format!("n{i}"), capacities[i], busies[i].min(capacities[i]), tag_list));
        }
        let job_tag_list: &[(&str, &[&str])] =
            if job_tagged { &[("job", &["t"])] } else { &[] };
        let state = state_with(nodes, job_tag_list);

        let job_tags = state.job_tags.get("job");
        let any_accepts = state.nodes.values().any(|n| node_can_queue(n, job_tags));
        let found = find_node(&state, "job");

        prop_assert_eq!(any_accepts, found.is_some());
        if let Some(name) = found {
            prop_assert!(node_can_queue(&state.nodes[&name], job_tags));
        }
    }
}
