// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler invariants checked against the live engine.

use super::*;
use laminar_core::SortField;
use std::collections::HashMap;

#[tokio::test]
async fn busy_matches_active_runs_and_respects_capacity() {
    let home = setup();
    home.write_node("a", "EXECUTORS=2\n");
    home.write_job("slow", "sleep 5");
    home.engine.notify_config_changed();

    let h1 = home.engine.queue_run("slow", HashMap::new()).unwrap();
    let h2 = home.engine.queue_run("slow", HashMap::new()).unwrap();
    let mut h3 = home.engine.queue_run("slow", HashMap::new()).unwrap();

    let n1 = h1.started.await.unwrap();
    let n2 = h2.started.await.unwrap();

    // capacity 2: two active, the third queued
    assert_eq!(home.busy_of("a"), 2);
    assert_eq!(home.engine.state.lock().active.len(), 2);
    assert_eq!(home.queue_len(), 1);
    assert!(h3.started.try_recv().is_err());

    let mut completions = home.engine.subscribe_completions();
    home.engine.abort_all();
    wait_completion(&mut completions, "slow", n1).await;
    wait_completion(&mut completions, "slow", n2).await;

    // the freed slots admit the third run
    let n3 = h3.started.await.unwrap();
    assert_eq!(n3, 3);
    assert_eq!(home.busy_of("a"), 1);

    home.engine.abort("slow", n3);
    wait_completion(&mut completions, "slow", n3).await;
    assert_eq!(home.busy_of("a"), 0);
    assert!(home.engine.state.lock().active.is_empty());
}

#[tokio::test]
async fn build_numbers_strictly_increase_from_one() {
    let home = setup();
    home.write_job("seq", "printf ok");

    for expect in 1..=3u32 {
        let handle = home.engine.queue_run("seq", HashMap::new()).unwrap();
        let num = handle.started.await.unwrap();
        assert_eq!(num, expect);
        let mut completions = handle.completions;
        wait_completion(&mut completions, "seq", num).await;
    }

    let nums = home.engine.db.lock().latest_build_numbers().unwrap();
    assert_eq!(nums.get("seq"), Some(&3));
}

#[tokio::test]
async fn build_counter_seeds_from_persisted_history() {
    let home = setup();
    home.write_job("seed", "printf ok");
    {
        let handle = home.engine.queue_run("seed", HashMap::new()).unwrap();
        let mut completions = handle.completions;
        wait_completion(&mut completions, "seed", 1).await;
    }

    // a fresh engine over the same home resumes numbering from the history
    let settings = home.engine.settings.clone();
    let db = Database::open(&settings.home.join("laminar.sqlite")).unwrap();
    let engine2 = Engine::new(settings, db, SystemClock).unwrap();
    let handle = engine2.queue_run("seed", HashMap::new()).unwrap();
    let num = handle.started.await.unwrap();
    assert_eq!(num, 2);
    let mut completions = handle.completions;
    wait_completion(&mut completions, "seed", 2).await;
}

#[tokio::test]
async fn terminal_transition_is_exactly_once() {
    let home = setup();
    home.write_job("once", "printf ok");

    let mut completions = home.engine.subscribe_completions();
    home.engine.queue_run("once", HashMap::new()).unwrap();

    wait_completion(&mut completions, "once", 1).await;

    // no second completion for the same run
    tokio::time::sleep(Duration::from_millis(200)).await;
    let mut extra = 0;
    while let Ok(c) = completions.try_recv() {
        if c.job == "once" && c.num == 1 {
            extra += 1;
        }
    }
    assert_eq!(extra, 0);

    // and exactly one persisted row
    assert_eq!(home.engine.db.lock().build_count("once").unwrap(), 1);
}

#[tokio::test]
async fn subscriber_sees_ordered_event_prefix() {
    let home = setup();
    home.write_job("ordered", "printf 'x'");

    let mut job_rx = home.watch(MonitorScope::Job {
        name: "ordered".into(),
        page: 0,
        field: SortField::Number,
        desc: true,
    });

    let handle = home.engine.queue_run("ordered", HashMap::new()).unwrap();
    let mut completions = handle.completions;
    wait_completion(&mut completions, "ordered", 1).await;

    let types = drain_status_types(&mut job_rx);
    assert_eq!(types, vec!["status", "job_queued", "job_started", "job_completed"]);
}

#[tokio::test]
async fn rundir_swept_after_completion() {
    let home = setup();
    home.write_job("tidy", "printf ok");

    let handle = home.engine.queue_run("tidy", HashMap::new()).unwrap();
    let mut completions = handle.completions;
    wait_completion(&mut completions, "tidy", 1).await;

    // keep_rundirs defaults to 0: nothing not in use survives
    assert!(!home.engine.settings.rundir("tidy", 1).exists());
    assert!(home.engine.settings.workspace_dir("tidy").exists());
    // archives are permanent history
    assert!(home.engine.settings.archive_dir("tidy", 1).exists());
}

#[tokio::test]
async fn dropped_run_never_notifies() {
    let home = setup();
    home.write_job("doomed", "printf ok");

    // occupy the rundir path with an unwritable parent to force a setup
    // failure: make run/<job>/1 an existing file so remove+create both fail
    let rundir = home.engine.settings.rundir("doomed", 1);
    std::fs::create_dir_all(rundir.parent().unwrap()).unwrap();
    std::fs::write(&rundir, b"not a dir").unwrap();

    let handle = home.engine.queue_run("doomed", HashMap::new()).unwrap();

    // the run was dropped: started closes with no value, no builds row
    assert!(handle.started.await.is_err());
    assert_eq!(home.engine.db.lock().build_count("doomed").unwrap(), 0);
    assert!(home.engine.state.lock().active.is_empty());
    assert_eq!(home.queue_len(), 0);
}
