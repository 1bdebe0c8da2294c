// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use clap::CommandFactory;

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn parse_param_splits_on_first_equals() {
    assert_eq!(
        parse_param("KEY=a=b").unwrap(),
        ("KEY".to_string(), "a=b".to_string())
    );
    assert!(parse_param("no-equals").is_err());
}

#[test]
fn param_map_collects_pairs() {
    let map = param_map(vec![
        ("A".into(), "1".into()),
        ("B".into(), "2".into()),
    ]);
    assert_eq!(map.len(), 2);
    assert_eq!(map.get("A").map(String::as_str), Some("1"));
}
