// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Status document construction for each subscriber scope.
//!
//! Documents are a JSON envelope `{type, title, time, data}`; the `data`
//! shape depends on the scope. LOG subscribers get raw bytes instead: the
//! live buffer while the run is active, the stored (possibly decompressed)
//! log afterwards.

use super::{ClientMsg, Engine, EngineState, Settings};
use laminar_core::{Clock, MonitorScope, RunState, SortField};
use laminar_storage::RUNS_PER_PAGE;
use serde_json::{json, Map, Value};

pub(crate) fn envelope(title: &str, time: i64, typ: &str, data: Value) -> Value {
    json!({
        "type": typ,
        "title": title,
        "time": time,
        "data": data,
    })
}

/// Initial snapshot pushed to a subscriber at registration.
pub(crate) fn initial_message<C: Clock + 'static>(
    engine: &Engine<C>,
    state: &EngineState,
    scope: &MonitorScope,
) -> Option<ClientMsg> {
    let data = match scope {
        MonitorScope::Log { name, num } => {
            return log_snapshot(engine, state, name, *num).map(ClientMsg::Log)
        }
        MonitorScope::Home => home_data(engine, state),
        MonitorScope::All => all_data(engine, state),
        MonitorScope::Job { name, page, field, desc } => {
            job_data(engine, state, name, *page, *field, *desc)
        }
        MonitorScope::Run { name, num } => run_data(engine, state, name, *num),
    };
    Some(ClientMsg::Status(envelope(
        &engine.settings.title,
        engine.clock.epoch_secs(),
        "status",
        data,
    )))
}

fn log_snapshot<C: Clock + 'static>(
    engine: &Engine<C>,
    state: &EngineState,
    job: &str,
    num: u32,
) -> Option<Vec<u8>> {
    if let Some(sched) = state.active.get(job, num) {
        return Some(sched.run.log.clone());
    }
    match engine.db.lock().fetch_log(job, num) {
        Ok(log) => log,
        Err(e) => {
            tracing::error!(job, num, error = %e, "failed to fetch stored log");
            None
        }
    }
}

fn tags_of(state: &EngineState, job: &str) -> Vec<String> {
    state
        .job_tags
        .get(job)
        .map(|t| t.iter().cloned().collect())
        .unwrap_or_default()
}

fn home_data<C: Clock + 'static>(engine: &Engine<C>, state: &EngineState) -> Value {
    let db = engine.db.lock();
    let now = engine.clock.epoch_secs();

    let recent: Vec<Value> = db
        .recent_builds(15)
        .unwrap_or_default()
        .into_iter()
        .map(|b| {
            json!({
                "name": b.name,
                "number": b.number,
                "node": b.node,
                "started": b.started_at,
                "completed": b.completed_at,
                "result": b.result.to_string(),
            })
        })
        .collect();

    let running: Vec<Value> = state
        .active
        .by_started()
        .map(|sched| {
            let run = &sched.run;
            let mut entry = json!({
                "name": run.name,
                "number": run.number,
                "node": run.node,
                "started": run.started_at,
            });
            if let Ok(Some(duration)) = db.last_duration(&run.name) {
                entry["etc"] = json!(run.started_at + duration);
            }
            entry
        })
        .collect();

    let queued: Vec<Value> =
        state.queue.iter().map(|s| json!({ "name": s.run.name })).collect();

    let (total, busy) = state.nodes.values().fold((0u32, 0u32), |(t, b), n| {
        (t + n.executors, b + n.busy)
    });

    let builds_per_day: Vec<Value> = db
        .builds_per_day(now)
        .unwrap_or_default()
        .into_iter()
        .map(|day| {
            let mut counts = Map::new();
            for (result, count) in day.counts {
                counts.insert(result.to_string(), json!(count));
            }
            Value::Object(counts)
        })
        .collect();

    let mut builds_per_job = Map::new();
    for (job, count) in db.builds_per_job(now).unwrap_or_default() {
        builds_per_job.insert(job, json!(count));
    }

    let mut time_per_job = Map::new();
    for (job, avg) in db.time_per_job(now).unwrap_or_default() {
        time_per_job.insert(job, json!(avg));
    }

    json!({
        "recent": recent,
        "running": running,
        "queued": queued,
        "executorsTotal": total,
        "executorsBusy": busy,
        "buildsPerDay": builds_per_day,
        "buildsPerJob": builds_per_job,
        "timePerJob": time_per_job,
    })
}

fn all_data<C: Clock + 'static>(engine: &Engine<C>, state: &EngineState) -> Value {
    let db = engine.db.lock();

    let jobs: Vec<Value> = db
        .job_summaries()
        .unwrap_or_default()
        .into_iter()
        .map(|s| {
            json!({
                "name": s.name,
                "number": s.number,
                "result": s.result.to_string(),
                "started": s.started_at,
                "completed": s.completed_at,
                "tags": tags_of(state, &s.name),
            })
        })
        .collect();

    let running: Vec<Value> = state
        .active
        .by_started()
        .map(|sched| {
            let run = &sched.run;
            json!({
                "name": run.name,
                "number": run.number,
                "node": run.node,
                "started": run.started_at,
                "tags": tags_of(state, &run.name),
            })
        })
        .collect();

    json!({ "jobs": jobs, "running": running })
}

fn job_data<C: Clock + 'static>(
    engine: &Engine<C>,
    state: &EngineState,
    job: &str,
    page: u32,
    field: SortField,
    desc: bool,
) -> Value {
    let db = engine.db.lock();

    let recent: Vec<Value> = db
        .job_page(job, page, field, desc)
        .unwrap_or_default()
        .into_iter()
        .map(|row| {
            json!({
                "number": row.number,
                "completed": row.completed_at,
                "started": row.started_at,
                "result": row.result.to_string(),
                "reason": row.reason,
            })
        })
        .collect();

    let count = db.build_count(job).unwrap_or(0);
    let pages = count.saturating_sub(1) / RUNS_PER_PAGE + 1;

    let running: Vec<Value> = state
        .active
        .job_runs(job)
        .map(|sched| {
            let run = &sched.run;
            json!({
                "number": run.number,
                "node": run.node,
                "started": run.started_at,
                "result": RunState::Running.to_string(),
                "reason": run.reason(),
            })
        })
        .collect();

    let n_queued = state.queue.iter().filter(|s| s.run.name == job).count();

    let mut data = json!({
        "recent": recent,
        "pages": pages,
        "sort": {
            "page": page,
            "field": field.to_string(),
            "order": if desc { "dsc" } else { "asc" },
        },
        "running": running,
        "nQueued": n_queued,
    });
    if let Ok(Some((number, started))) = db.last_success(job) {
        data["lastSuccess"] = json!({ "number": number, "started": started });
    }
    if let Ok(Some((number, started))) = db.last_failed(job) {
        data["lastFailed"] = json!({ "number": number, "started": started });
    }
    data
}

fn run_data<C: Clock + 'static>(
    engine: &Engine<C>,
    state: &EngineState,
    job: &str,
    num: u32,
) -> Value {
    let db = engine.db.lock();
    let mut data = Map::new();

    if let Ok(Some(row)) = db.build_times(job, num) {
        let queued_at = db.queued_at(job, num).ok().flatten().unwrap_or(row.started_at);
        data.insert("queued".into(), json!(row.started_at - queued_at));
        data.insert("started".into(), json!(row.started_at));
        data.insert("completed".into(), json!(row.completed_at));
        data.insert("result".into(), json!(row.result.to_string()));
        data.insert("reason".into(), json!(row.reason));
    }
    if let Some(sched) = state.active.get(job, num) {
        let run = &sched.run;
        data.insert("queued".into(), json!(run.started_at - run.queued_at));
        data.insert("started".into(), json!(run.started_at));
        data.insert("reason".into(), json!(run.reason()));
        data.insert("result".into(), json!(RunState::Running.to_string()));
        if let Ok(Some(duration)) = db.last_duration(job) {
            data.insert("etc".into(), json!(run.started_at + duration));
        }
    }
    data.insert(
        "latestNum".into(),
        json!(state.build_nums.get(job).copied().unwrap_or(0)),
    );
    data.insert(
        "artifacts".into(),
        json!(artifacts(&engine.settings, job, num)),
    );
    Value::Object(data)
}

/// Recursively enumerate the archived files of a build.
///
/// Directories and non-regular files are skipped. Each entry reports the
/// public URL, the path relative to the build's archive directory, and the
/// size in bytes.
pub(crate) fn artifacts(settings: &Settings, job: &str, num: u32) -> Vec<Value> {
    let root = settings.archive_dir(job, num);
    let mut found = Vec::new();
    let mut pending = vec![root.clone()];
    while let Some(dir) = pending.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
                continue;
            }
            let Ok(meta) = entry.metadata() else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            let Ok(rel) = path.strip_prefix(&root) else {
                continue;
            };
            found.push(json!({
                "url": format!("{}/{}/{}/{}", settings.archive_url, job, num, rel.display()),
                "filename": rel.display().to_string(),
                "size": meta.len(),
            }));
        }
    }
    found.sort_by(|a, b| a["filename"].as_str().cmp(&b["filename"].as_str()));
    found
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
