// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::HashMap;

fn test_settings() -> (tempfile::TempDir, Settings) {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings {
        home: dir.path().to_path_buf(),
        title: "Laminar".into(),
        archive_url: "/archive".into(),
    };
    std::fs::create_dir_all(settings.nodes_dir()).unwrap();
    std::fs::create_dir_all(settings.jobs_dir()).unwrap();
    (dir, settings)
}

fn state() -> EngineState {
    EngineState::new(HashMap::new())
}

#[test]
fn empty_config_synthesizes_default_node() {
    let (_dir, settings) = test_settings();
    let mut state = state();

    load_configuration(&settings, &mut state);

    assert_eq!(state.nodes.len(), 1);
    let node = state.nodes.get("").unwrap();
    assert_eq!(node.executors, DEFAULT_EXECUTORS);
    assert!(node.tags.is_empty());
}

#[test]
fn nodes_loaded_from_conf_files() {
    let (_dir, settings) = test_settings();
    std::fs::write(
        settings.nodes_dir().join("fast.conf"),
        "EXECUTORS=2\nTAGS=linux,x86\n",
    )
    .unwrap();
    let mut state = state();

    load_configuration(&settings, &mut state);

    assert_eq!(state.nodes.len(), 1);
    let node = state.nodes.get("fast").unwrap();
    assert_eq!(node.executors, 2);
    assert_eq!(node.tags.len(), 2);
}

#[test]
fn reload_preserves_busy_count() {
    let (_dir, settings) = test_settings();
    std::fs::write(settings.nodes_dir().join("fast.conf"), "EXECUTORS=2\n").unwrap();
    let mut state = state();
    load_configuration(&settings, &mut state);
    state.nodes.get_mut("fast").unwrap().busy = 1;

    // capacity change must not reset the busy counter
    std::fs::write(settings.nodes_dir().join("fast.conf"), "EXECUTORS=4\n").unwrap();
    load_configuration(&settings, &mut state);

    let node = state.nodes.get("fast").unwrap();
    assert_eq!(node.executors, 4);
    assert_eq!(node.busy, 1);
}

#[test]
fn removed_config_removes_node_when_others_remain() {
    let (_dir, settings) = test_settings();
    std::fs::write(settings.nodes_dir().join("a.conf"), "EXECUTORS=1\n").unwrap();
    std::fs::write(settings.nodes_dir().join("b.conf"), "EXECUTORS=1\n").unwrap();
    let mut state = state();
    load_configuration(&settings, &mut state);
    assert_eq!(state.nodes.len(), 2);

    std::fs::remove_file(settings.nodes_dir().join("b.conf")).unwrap();
    load_configuration(&settings, &mut state);

    assert_eq!(state.nodes.len(), 1);
    assert!(state.nodes.contains_key("a"));
}

#[test]
fn default_node_survives_reload_when_still_alone() {
    let (_dir, settings) = test_settings();
    let mut state = state();
    load_configuration(&settings, &mut state);
    state.nodes.get_mut("").unwrap().busy = 3;

    load_configuration(&settings, &mut state);

    // not removed and re-added: busy accounting intact
    assert_eq!(state.nodes.get("").unwrap().busy, 3);
}

#[test]
fn default_node_replaced_once_real_nodes_appear() {
    let (_dir, settings) = test_settings();
    let mut state = state();
    load_configuration(&settings, &mut state);
    assert!(state.nodes.contains_key(""));

    std::fs::write(settings.nodes_dir().join("real.conf"), "EXECUTORS=1\n").unwrap();
    load_configuration(&settings, &mut state);

    assert!(!state.nodes.contains_key(""));
    assert!(state.nodes.contains_key("real"));
}

#[test]
fn job_tags_fully_replaced() {
    let (_dir, settings) = test_settings();
    std::fs::write(settings.jobs_dir().join("build.conf"), "TAGS=linux\n").unwrap();
    let mut state = state();
    load_configuration(&settings, &mut state);
    assert!(state.job_tags.contains_key("build"));

    std::fs::remove_file(settings.jobs_dir().join("build.conf")).unwrap();
    load_configuration(&settings, &mut state);
    assert!(state.job_tags.is_empty());
}

#[test]
fn malformed_conf_file_is_skipped() {
    let (_dir, settings) = test_settings();
    std::fs::write(settings.nodes_dir().join("good.conf"), "EXECUTORS=1\n").unwrap();
    std::fs::write(settings.nodes_dir().join("bad.conf"), "not key value\n").unwrap();
    let mut state = state();

    load_configuration(&settings, &mut state);

    assert!(state.nodes.contains_key("good"));
    assert!(!state.nodes.contains_key("bad"));
}
