// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue admission: matching queued runs to nodes and orchestrating run
//! startup.
//!
//! The admission pass walks the queue head to tail. A run that cannot be
//! placed is skipped, so later entries may be admitted before earlier ones
//! (head-of-line non-blocking). Passes run to completion under the engine
//! lock; triggers are enqueue, terminal transition, and config reload.

use super::{executor, Engine, EngineState, Scheduled};
use crate::conf::ConfFile;
use laminar_core::{Clock, Node, RunState, Script};
use serde_json::json;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

/// Whether a node can accept a run of a job with the given tags.
///
/// `job_tags` is `None` when the job has no tags.
pub(crate) fn node_can_queue(node: &Node, job_tags: Option<&BTreeSet<String>>) -> bool {
    if !node.has_free_executor() {
        return false;
    }
    if node.tags.is_empty() {
        return true;
    }
    match job_tags {
        Some(tags) => node.matches_tags(tags),
        None => false,
    }
}

/// Pick a node for a job, or `None` if nothing can take it right now.
///
/// Tagged nodes with a matching tag are preferred over untagged nodes, so
/// the untagged pool stays free for jobs only it can run.
fn find_node(state: &EngineState, job: &str) -> Option<String> {
    let job_tags = state.job_tags.get(job);
    for (name, node) in &state.nodes {
        if !node.tags.is_empty() && node_can_queue(node, job_tags) {
            return Some(name.clone());
        }
    }
    for (name, node) in &state.nodes {
        if node.tags.is_empty() && node_can_queue(node, job_tags) {
            return Some(name.clone());
        }
    }
    None
}

/// One admission pass over the queue.
pub(crate) fn assign_new_jobs<C: Clock + 'static>(
    engine: &Arc<Engine<C>>,
    state: &mut EngineState,
) {
    let mut i = 0;
    while i < state.queue.len() {
        let job = state.queue[i].run.name.clone();
        match find_node(state, &job) {
            Some(node) => {
                if let Some(sched) = state.queue.remove(i) {
                    start_run(engine, state, sched, &node, i);
                }
            }
            None => i += 1,
        }
    }
}

/// Start an admitted run on a node.
///
/// On I/O failure during setup the run is dropped: no builds row, no
/// job_completed, and the handle's channels close so a waiting caller
/// observes "never started".
fn start_run<C: Clock + 'static>(
    engine: &Arc<Engine<C>>,
    state: &mut EngineState,
    mut sched: Scheduled,
    node_name: &str,
    queue_index: usize,
) {
    let settings = &engine.settings;
    let cfg = settings.cfg_dir();
    let job = sched.run.name.clone();
    let number = state.build_nums.get(&job).copied().unwrap_or(0) + 1;

    // workspace is created once per job; its first creation schedules the
    // optional init prelude, which runs inside the workspace
    let workspace = settings.workspace_dir(&job);
    if !workspace.exists() {
        if let Err(e) = std::fs::create_dir_all(&workspace) {
            tracing::error!(%job, error = %e, "could not create job workspace");
            return;
        }
        let init = cfg.join("jobs").join(format!("{job}.init"));
        if init.exists() {
            sched.run.scripts.push(Script::in_dir(init, &workspace));
        }
    }

    let rundir = settings.rundir(&job, number);
    let mut create_workdir = true;
    if rundir.is_dir() {
        tracing::warn!(dir = %rundir.display(), "working directory already exists, removing");
        if let Err(e) = std::fs::remove_dir_all(&rundir) {
            tracing::warn!(error = %e, "failed to remove working directory");
            create_workdir = false;
        }
    }
    if create_workdir {
        if let Err(e) = std::fs::create_dir_all(&rundir) {
            tracing::error!(dir = %rundir.display(), error = %e, "could not create working directory");
            return;
        }
    }
    sched.run.run_dir = rundir;

    let archive = settings.archive_dir(&job, number);
    if archive.is_dir() {
        tracing::warn!(dir = %archive.display(), "archive directory already exists");
    } else if let Err(e) = std::fs::create_dir_all(&archive) {
        tracing::error!(dir = %archive.display(), error = %e, "could not create archive directory");
        return;
    }

    // script sequence: global, node, job `before` hooks; the mandatory run
    // script; then the `after` hooks in reverse nesting order
    for path in [
        cfg.join("before"),
        cfg.join("nodes").join(format!("{node_name}.before")),
        cfg.join("jobs").join(format!("{job}.before")),
    ] {
        if path.exists() {
            sched.run.scripts.push(Script::new(path));
        }
    }
    sched.run.scripts.push(Script::new(settings.job_script(&job)));
    for path in [
        cfg.join("jobs").join(format!("{job}.after")),
        cfg.join("nodes").join(format!("{node_name}.after")),
        cfg.join("after"),
    ] {
        if path.exists() {
            sched.run.scripts.push(Script::new(path));
        }
    }

    let last_result = engine.db.lock().last_result(&job).unwrap_or_default();
    let last_duration = engine.db.lock().last_duration(&job).unwrap_or_default();

    // environment: env files in override order, then user params, then the
    // run's own identity
    let mut env = HashMap::new();
    for path in [
        cfg.join("env"),
        cfg.join("nodes").join(format!("{node_name}.env")),
        cfg.join("jobs").join(format!("{job}.env")),
    ] {
        if !path.exists() {
            continue;
        }
        match ConfFile::parse(&path) {
            Ok(conf) => env.extend(conf.into_values()),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping env file")
            }
        }
    }
    env.extend(sched.run.params.clone());
    env.insert("JOB".into(), job.clone());
    env.insert("RUN".into(), number.to_string());
    env.insert("WORKSPACE".into(), workspace.display().to_string());
    env.insert("ARCHIVE".into(), archive.display().to_string());
    if let Some(last) = last_result {
        env.insert("LAST_RESULT".into(), last.to_string());
        sched.run.last_result = last;
    }
    sched.run.env = env;

    // job timeout arms a timer that aborts the run on expiry; the timer
    // stands down when the run's token is cancelled at completion
    let job_conf = cfg.join("jobs").join(format!("{job}.conf"));
    let timeout: u64 = match ConfFile::parse(&job_conf) {
        Ok(conf) => conf.get_int("TIMEOUT", 0),
        Err(_) => 0,
    };
    if timeout > 0 {
        let token = sched.token.clone();
        let timer_engine = Arc::clone(engine);
        let timer_job = job.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(timeout)) => {
                    tracing::info!(job = %timer_job, number, "run timed out");
                    timer_engine.abort(&timer_job, number);
                }
                _ = token.cancelled() => {}
            }
        });
    }

    if let Some(node) = state.nodes.get_mut(node_name) {
        node.busy += 1;
    }
    let started_at = engine.clock.epoch_secs();
    sched.run.number = number;
    sched.run.node = node_name.to_string();
    sched.run.started_at = started_at;
    sched.run.result = RunState::Running;
    state.build_nums.insert(job.clone(), number);

    tracing::info!(%job, number, node = node_name, "queued job to node");

    let tags: Vec<String> = state
        .job_tags
        .get(&job)
        .map(|t| t.iter().cloned().collect())
        .unwrap_or_default();
    let mut data = json!({
        "queueIndex": queue_index,
        "name": job,
        "queued": started_at - sched.run.queued_at,
        "started": started_at,
        "number": number,
        "reason": sched.run.reason(),
        "tags": tags,
    });
    if let Some(duration) = last_duration {
        data["etc"] = json!(started_at + duration);
    }
    let msg = engine.event_message("job_started", data);
    state.clients.send_started(&job, number, &msg);

    // notify an rpc caller awaiting admission
    if let Some(tx) = sched.started_tx.take() {
        let _ = tx.send(number);
    }

    state.active.insert(sched);

    let exec_engine = Arc::clone(engine);
    let exec_job = job;
    tokio::spawn(async move {
        executor::run(exec_engine, exec_job, number).await;
    });
}

#[cfg(test)]
#[path = "admission_tests.rs"]
mod tests;
