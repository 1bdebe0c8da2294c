// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::os::unix::fs::FileTypeExt;

fn test_config() -> (tempfile::TempDir, Config) {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        home: dir.path().to_path_buf(),
        socket_path: dir.path().join("laminar.sock"),
        lock_path: dir.path().join("laminard.pid"),
    };
    (dir, config)
}

#[tokio::test]
async fn startup_creates_layout_and_binds() {
    let (_dir, config) = test_config();

    let daemon = startup(&config).await.unwrap();

    assert!(config.home.join("cfg/nodes").is_dir());
    assert!(config.home.join("cfg/jobs").is_dir());
    assert!(config.home.join("laminar.sqlite").is_file());
    assert!(config.socket_path.exists());
    let pid: u32 = std::fs::read_to_string(&config.lock_path)
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    assert_eq!(pid, std::process::id());

    // the default node is up
    let (total, busy) = daemon.engine.executor_counts();
    assert_eq!(total, 6);
    assert_eq!(busy, 0);
}

#[tokio::test]
async fn second_startup_fails_on_lock() {
    let (_dir, config) = test_config();

    let _daemon = startup(&config).await.unwrap();
    let err = startup(&config).await.unwrap_err();
    assert!(matches!(err, LifecycleError::LockFailed(_)));
}

#[tokio::test]
async fn stale_socket_is_replaced() {
    let (_dir, config) = test_config();
    std::fs::write(&config.socket_path, b"stale").unwrap();

    let _daemon = startup(&config).await.unwrap();
    // the stale file was replaced with a live socket
    assert!(config.socket_path.exists());
    assert!(std::fs::metadata(&config.socket_path).unwrap().file_type().is_socket());
}
