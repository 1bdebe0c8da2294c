// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::{Path, PathBuf};

/// Root state directory: `LAMINAR_HOME`, default `/var/lib/laminar`.
pub fn home_dir() -> PathBuf {
    std::env::var("LAMINAR_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/var/lib/laminar"))
}

/// RPC bind address: `LAMINAR_BIND_RPC`, default `unix-abstract:laminar`.
pub fn bind_rpc() -> String {
    std::env::var("LAMINAR_BIND_RPC")
        .unwrap_or_else(|_| "unix-abstract:laminar".to_string())
}

/// URL prefix for archived artifacts: `LAMINAR_ARCHIVE_URL`, default `/archive`.
pub fn archive_url() -> String {
    std::env::var("LAMINAR_ARCHIVE_URL").unwrap_or_else(|_| "/archive".to_string())
}

/// Server title shown in status documents: `LAMINAR_TITLE`, default `Laminar`.
pub fn title() -> String {
    std::env::var("LAMINAR_TITLE").unwrap_or_else(|_| "Laminar".to_string())
}

/// Number of per-build run directories to keep after completion:
/// `LAMINAR_KEEP_RUNDIRS`, default 0 (remove all not currently in use).
pub fn keep_rundirs() -> u32 {
    std::env::var("LAMINAR_KEEP_RUNDIRS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

/// Resolve the unix socket path from the configured bind address.
///
/// `unix:<path>` binds that path. The abstract-namespace spelling
/// (`unix-abstract:<name>`) has no filesystem path to bind, so it maps to
/// `<home>/laminar.sock`.
pub fn socket_path(home: &Path) -> PathBuf {
    let bind = bind_rpc();
    if let Some(path) = bind.strip_prefix("unix:") {
        return PathBuf::from(path);
    }
    home.join("laminar.sock")
}
