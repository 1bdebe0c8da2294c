// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node registry and job catalog, rebuilt by scanning the config directory.
//!
//! Reload never drops busy counters or aborts running jobs: nodes present
//! on disk are updated in place, so in-flight executor accounting survives.

use super::EngineState;
use crate::conf::ConfFile;
use crate::{engine::Settings, env};
use laminar_core::node::DEFAULT_EXECUTORS;
use laminar_core::Node;
use std::collections::BTreeSet;
use std::path::Path;

/// Re-read node and job configuration from `<home>/cfg`.
pub(crate) fn load_configuration(settings: &Settings, state: &mut EngineState) {
    state.keep_rundirs = env::keep_rundirs();

    let mut known = BTreeSet::new();
    for (name, conf) in scan_conf_dir(&settings.nodes_dir()) {
        let node = state
            .nodes
            .entry(name.clone())
            .or_insert_with(|| Node::new(name.clone()));
        node.executors = conf.get_int("EXECUTORS", DEFAULT_EXECUTORS);
        node.tags = conf.get_tags("TAGS");
        known.insert(name);
    }

    // Remove nodes whose config files disappeared. If no nodes are known,
    // take care not to remove and re-add the default node.
    state
        .nodes
        .retain(|name, _| (name.is_empty() && known.is_empty()) || known.contains(name));

    if state.nodes.is_empty() {
        state.nodes.insert(String::new(), Node::new(""));
    }

    state.job_tags.clear();
    for (name, conf) in scan_conf_dir(&settings.jobs_dir()) {
        let tags = conf.get_tags("TAGS");
        if !tags.is_empty() {
            state.job_tags.insert(name, tags);
        }
    }
}

/// All parseable `<stem>.conf` files in a directory. Unparseable files are
/// skipped with a warning; the rest of the configuration loads normally.
fn scan_conf_dir(dir: &Path) -> Vec<(String, ConfFile)> {
    let mut entries = Vec::new();
    let Ok(read) = std::fs::read_dir(dir) else {
        return entries;
    };
    for entry in read.flatten() {
        let path = entry.path();
        if !path.is_file() || path.extension().map(|e| e != "conf").unwrap_or(true) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        match ConfFile::parse(&path) {
            Ok(conf) => entries.push((stem.to_string(), conf)),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping config file");
            }
        }
    }
    entries
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
