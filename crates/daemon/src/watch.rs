// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem watch on the config directories.
//!
//! Any change under `cfg/nodes` or `cfg/jobs` triggers a configuration
//! reload, which may unblock queued work. Running jobs are never disturbed.

use crate::engine::Engine;
use laminar_core::Clock;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Keeps the underlying watcher alive; dropping it stops the watch.
#[derive(Debug)]
pub struct ConfigWatcher {
    // NOTE(lifetime): the watcher thread stops when this is dropped
    #[allow(dead_code)]
    watcher: RecommendedWatcher,
}

/// Start watching the node and job config directories.
///
/// Both directories must exist before this is called.
pub fn spawn<C: Clock + 'static>(engine: Arc<Engine<C>>) -> Result<ConfigWatcher, notify::Error> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut watcher = notify::recommended_watcher(
        move |res: Result<notify::Event, notify::Error>| match res {
            Ok(_) => {
                let _ = tx.send(());
            }
            Err(e) => tracing::warn!(error = %e, "config watch error"),
        },
    )?;
    watcher.watch(&engine.settings.nodes_dir(), RecursiveMode::NonRecursive)?;
    watcher.watch(&engine.settings.jobs_dir(), RecursiveMode::NonRecursive)?;

    tokio::spawn(async move {
        while rx.recv().await.is_some() {
            // coalesce bursts of events from a single config edit
            while rx.try_recv().is_ok() {}
            tracing::info!("configuration changed, reloading");
            engine.notify_config_changed();
        }
    });

    Ok(ConfigWatcher { watcher })
}
