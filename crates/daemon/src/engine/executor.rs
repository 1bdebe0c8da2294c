// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stepwise run supervisor.
//!
//! Walks a run's script sequence: spawn the child, drain its combined
//! output into the live log (fanning each chunk to LOG subscribers), and
//! only then reap the exit status. Subscribers therefore observe every
//! output byte before the completion event.

use super::{admission, retention, status, Completion, Engine};
use laminar_core::{Clock, RunState};
use laminar_storage::BuildRecord;
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

struct StepSpec {
    path: PathBuf,
    cwd: PathBuf,
    env: HashMap<String, String>,
    token: CancellationToken,
}

/// Execute a run to its terminal transition.
pub(crate) async fn run<C: Clock + 'static>(engine: Arc<Engine<C>>, job: String, num: u32) {
    loop {
        let spec = {
            let state = engine.state.lock();
            let Some(sched) = state.active.get(&job, num) else {
                return;
            };
            if sched.run.result == RunState::Aborted {
                None
            } else {
                sched.run.current_script().map(|script| StepSpec {
                    path: script.path.clone(),
                    cwd: script
                        .cwd
                        .clone()
                        .unwrap_or_else(|| sched.run.run_dir.clone()),
                    env: sched.run.env.clone(),
                    token: sched.token.clone(),
                })
            }
        };
        let Some(spec) = spec else {
            break;
        };

        let success = execute_step(&engine, &job, num, spec).await;

        let proceed = {
            let mut state = engine.state.lock();
            match state.active.get_mut(&job, num) {
                Some(sched) => sched.run.step_exited(success),
                None => return,
            }
        };
        if !proceed {
            break;
        }
    }

    finish(&engine, &job, num);
}

/// Run one script to completion. Returns whether it exited successfully.
async fn execute_step<C: Clock + 'static>(
    engine: &Arc<Engine<C>>,
    job: &str,
    num: u32,
    spec: StepSpec,
) -> bool {
    tracing::debug!(job, num, script = %spec.path.display(), "spawning step");

    let mut child = match Command::new(&spec.path)
        .current_dir(&spec.cwd)
        .envs(&spec.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            tracing::error!(job, num, script = %spec.path.display(), error = %e, "failed to spawn script");
            return false;
        }
    };

    if let Some(pid) = child.id() {
        if let Some(sched) = engine.state.lock().active.get_mut(job, num) {
            sched.run.pid = Some(pid);
        }
    }

    let (mut stdout, mut stderr) = match (child.stdout.take(), child.stderr.take()) {
        (Some(out), Some(err)) => (out, err),
        _ => {
            tracing::error!(job, num, "child spawned without pipes");
            let _ = child.kill().await;
            return false;
        }
    };

    // drain both pipes to EOF before reaping; an abort kills the child,
    // which closes the pipes and lets the drain terminate
    let mut out_buf = [0u8; 4096];
    let mut err_buf = [0u8; 4096];
    let mut out_open = true;
    let mut err_open = true;
    let mut killed = false;
    while out_open || err_open {
        tokio::select! {
            read = stdout.read(&mut out_buf), if out_open => match read {
                Ok(0) | Err(_) => out_open = false,
                Ok(n) => engine.append_log(job, num, &out_buf[..n]),
            },
            read = stderr.read(&mut err_buf), if err_open => match read {
                Ok(0) | Err(_) => err_open = false,
                Ok(n) => engine.append_log(job, num, &err_buf[..n]),
            },
            _ = spec.token.cancelled(), if !killed => {
                killed = true;
                tracing::info!(job, num, "terminating child");
                let _ = child.start_kill();
            }
        }
    }

    match child.wait().await {
        Ok(exit) => exit.success(),
        Err(e) => {
            tracing::error!(job, num, error = %e, "failed to reap child");
            false
        }
    }
}

/// Terminal transition: persist, notify, sweep, free the executor slot.
fn finish<C: Clock + 'static>(engine: &Arc<Engine<C>>, job: &str, num: u32) {
    let mut state = engine.state.lock();

    let (record, node_name, reason) = {
        let Some(sched) = state.active.get_mut(job, num) else {
            return;
        };
        sched.run.completed_at = engine.clock.epoch_secs();
        if !sched.run.result.is_terminal() {
            sched.run.result = RunState::Failed;
        }
        // the timeout timer, if armed, stands down
        sched.token.cancel();
        let run = &sched.run;
        (
            BuildRecord {
                name: run.name.clone(),
                number: run.number,
                node: run.node.clone(),
                queued_at: run.queued_at,
                started_at: run.started_at,
                completed_at: run.completed_at,
                result: run.result,
                log: run.log.clone(),
                parent_job: run.parent_job.clone(),
                parent_build: run.parent_build,
                reason: run.reason(),
            },
            run.node.clone(),
            run.reason(),
        )
    };

    if let Some(node) = state.nodes.get_mut(&node_name) {
        node.busy = node.busy.saturating_sub(1);
    }
    tracing::info!(job, num, result = %record.result, "run completed");

    if let Err(e) = engine.db.lock().insert_build(&record) {
        tracing::error!(job, num, error = %e, "failed to persist build");
    }

    let tags: Vec<String> = state
        .job_tags
        .get(job)
        .map(|t| t.iter().cloned().collect())
        .unwrap_or_default();
    let artifacts = status::artifacts(&engine.settings, job, num);
    let data = json!({
        "name": job,
        "number": num,
        "queued": record.started_at - record.queued_at,
        "completed": record.completed_at,
        "started": record.started_at,
        "result": record.result.to_string(),
        "reason": reason,
        "tags": tags,
        "artifacts": artifacts,
    });
    let msg = engine.event_message("job_completed", data);
    state.clients.send_status(job, Some(num), &msg);

    // notify waiters exactly once
    let _ = engine.completions.send(Completion {
        job: job.to_string(),
        num,
        result: record.result,
    });

    state.active.erase(job, num);
    retention::sweep(&engine.settings, &state, job);

    // an executor slot has freed
    admission::assign_new_jobs(engine, &mut state);
}
