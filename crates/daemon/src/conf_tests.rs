// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn write_conf(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.conf");
    std::fs::write(&path, content).unwrap();
    (dir, path)
}

#[test]
fn parses_keys_comments_and_blanks() {
    let (_dir, path) = write_conf("# comment\n\nEXECUTORS=3\nTAGS=linux, x86\n");
    let conf = ConfFile::parse(&path).unwrap();

    assert_eq!(conf.get_int("EXECUTORS", 6), 3);
    assert_eq!(
        conf.get_tags("TAGS"),
        ["linux", "x86"].iter().map(|s| s.to_string()).collect()
    );
}

#[test]
fn defaults_apply_when_missing_or_invalid() {
    let (_dir, path) = write_conf("EXECUTORS=lots\n");
    let conf = ConfFile::parse(&path).unwrap();

    assert_eq!(conf.get_int("EXECUTORS", 6), 6);
    assert_eq!(conf.get_int("TIMEOUT", 0), 0);
    assert!(conf.get_tags("TAGS").is_empty());
}

#[test]
fn malformed_line_rejects_file() {
    let (_dir, path) = write_conf("EXECUTORS=2\nnot a pair\n");
    assert!(ConfFile::parse(&path).is_err());
}

#[test]
fn empty_tags_are_dropped() {
    let (_dir, path) = write_conf("TAGS=a,,b,\n");
    let conf = ConfFile::parse(&path).unwrap();
    assert_eq!(conf.get_tags("TAGS").len(), 2);
}

#[test]
fn env_file_values() {
    let (_dir, path) = write_conf("CC=clang\nCFLAGS=-O2\n");
    let values = ConfFile::parse(&path).unwrap().into_values();
    assert_eq!(values.get("CC").map(String::as_str), Some("clang"));
    assert_eq!(values.get("CFLAGS").map(String::as_str), Some("-O2"));
}
