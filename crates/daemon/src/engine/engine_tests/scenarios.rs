// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scheduling scenarios.

use super::*;
use std::collections::HashMap;

#[tokio::test]
async fn default_node_single_job_happy_path() {
    let home = setup();
    home.write_job("hello", "printf 'world\\n'");

    let mut all_rx = home.watch(MonitorScope::All);
    let mut log_rx = home.watch(MonitorScope::Log { name: "hello".into(), num: 1 });

    let handle = home.engine.queue_run("hello", HashMap::new()).unwrap();
    let num = handle.started.await.unwrap();
    assert_eq!(num, 1);

    let mut completions = handle.completions;
    let completion = wait_completion(&mut completions, "hello", 1).await;
    assert_eq!(completion.result, RunState::Success);

    // the subscriber saw snapshot, queued, started, completed in order
    let types = drain_status_types(&mut all_rx);
    assert_eq!(types, vec!["status", "job_queued", "job_started", "job_completed"]);

    // the LOG subscriber received the output bytes before completion
    assert_eq!(drain_log(&mut log_rx), b"world\n");

    // persisted raw (shorter than the compression threshold)
    let stored = home.engine.db.lock().fetch_log("hello", 1).unwrap();
    assert_eq!(stored, Some(b"world\n".to_vec()));
}

#[tokio::test]
async fn tag_affinity_restricts_placement() {
    let home = setup();
    home.write_node("a", "EXECUTORS=1\nTAGS=linux\n");
    home.write_node("b", "EXECUTORS=1\nTAGS=win\n");
    home.write_job("build", "sleep 5");
    home.write_job_conf("build", "TAGS=linux\n");
    home.engine.notify_config_changed();

    let handle = home.engine.queue_run("build", HashMap::new()).unwrap();
    let num = handle.started.await.unwrap();
    assert_eq!(home.node_of("build", num), Some("a".to_string()));

    // node a saturated: a second build stays queued even though b is idle
    let mut handle2 = home.engine.queue_run("build", HashMap::new()).unwrap();
    assert_eq!(home.queue_len(), 1);
    assert!(handle2.started.try_recv().is_err());

    // free the slot; the queued build then lands on a, never on b
    let mut completions = home.engine.subscribe_completions();
    home.engine.abort("build", num);
    wait_completion(&mut completions, "build", num).await;

    let num2 = handle2.started.await.unwrap();
    assert_eq!(home.node_of("build", num2), Some("a".to_string()));
    home.engine.abort("build", num2);
    wait_completion(&mut completions, "build", num2).await;
}

#[tokio::test]
async fn head_of_line_does_not_block() {
    let home = setup();
    home.write_node("a", "EXECUTORS=1\n");
    home.write_node("b", "EXECUTORS=1\nTAGS=gpu\n");
    home.write_job("render", "sleep 5");
    home.write_job_conf("render", "TAGS=gpu\n");
    home.write_job("plain", "sleep 5");
    home.engine.notify_config_changed();

    let h1 = home.engine.queue_run("render", HashMap::new()).unwrap();
    let h2 = home.engine.queue_run("plain", HashMap::new()).unwrap();

    let n1 = h1.started.await.unwrap();
    let n2 = h2.started.await.unwrap();

    // both run concurrently: the tagged job on its node, the untagged job
    // on the untagged node
    assert_eq!(home.node_of("render", n1), Some("b".to_string()));
    assert_eq!(home.node_of("plain", n2), Some("a".to_string()));

    let mut completions = home.engine.subscribe_completions();
    home.engine.abort_all();
    wait_completion(&mut completions, "render", n1).await;
    wait_completion(&mut completions, "plain", n2).await;
}

#[tokio::test]
async fn timeout_aborts_the_run() {
    let home = setup();
    home.write_job("sleepy", "sleep 10");
    home.write_job_conf("sleepy", "TIMEOUT=1\n");

    let handle = home.engine.queue_run("sleepy", HashMap::new()).unwrap();
    let num = handle.started.await.unwrap();

    let mut completions = handle.completions;
    let completion = wait_completion(&mut completions, "sleepy", num).await;
    assert_eq!(completion.result, RunState::Aborted);

    // persisted with the aborted result
    let state = home.engine.db.lock().last_result("sleepy").unwrap();
    assert_eq!(state, Some(RunState::Aborted));
}

#[tokio::test]
async fn long_log_roundtrips_through_compression() {
    let home = setup();
    home.write_job("noisy", "head -c 4096 /dev/zero | tr '\\0' A");

    let handle = home.engine.queue_run("noisy", HashMap::new()).unwrap();
    let mut completions = handle.completions;
    let completion = wait_completion(&mut completions, "noisy", 1).await;
    assert_eq!(completion.result, RunState::Success);

    // a LOG subscriber attached after completion reads the stored log back
    let mut log_rx = home.watch(MonitorScope::Log { name: "noisy".into(), num: 1 });
    let mut bytes = Vec::new();
    while let Ok(msg) = log_rx.try_recv() {
        if let ClientMsg::Log(chunk) = msg {
            bytes.extend_from_slice(&chunk);
        }
    }
    assert_eq!(bytes, vec![b'A'; 4096]);
}

#[tokio::test]
async fn hot_reload_unblocks_queued_job() {
    let home = setup();
    home.write_node("a", "EXECUTORS=1\nTAGS=x\n");
    home.write_job("waiting", "printf done");
    home.write_job_conf("waiting", "TAGS=y\n");
    home.engine.notify_config_changed();

    let handle = home.engine.queue_run("waiting", HashMap::new()).unwrap();
    assert_eq!(home.queue_len(), 1);

    // a matching node appears on disk; reload admits the job with no
    // re-enqueue
    home.write_node("b", "EXECUTORS=1\nTAGS=y\n");
    home.engine.notify_config_changed();

    let num = handle.started.await.unwrap();
    let mut completions = handle.completions;
    let completion = wait_completion(&mut completions, "waiting", num).await;
    assert_eq!(completion.result, RunState::Success);
}

#[tokio::test]
async fn failing_step_fails_the_run() {
    let home = setup();
    home.write_job("broken", "printf oops; exit 3");

    let handle = home.engine.queue_run("broken", HashMap::new()).unwrap();
    let mut completions = handle.completions;
    let completion = wait_completion(&mut completions, "broken", 1).await;
    assert_eq!(completion.result, RunState::Failed);

    let stored = home.engine.db.lock().fetch_log("broken", 1).unwrap();
    assert_eq!(stored, Some(b"oops".to_vec()));
}

#[tokio::test]
async fn unknown_job_is_rejected() {
    let home = setup();
    let err = home.engine.queue_run("ghost", HashMap::new()).unwrap_err();
    assert!(matches!(err, EngineError::UnknownJob(name) if name == "ghost"));
}

#[tokio::test]
async fn params_reach_the_script_environment() {
    let home = setup();
    home.write_job("envy", "printf '%s' \"$TARGET\"");

    let params = HashMap::from([("TARGET".to_string(), "release".to_string())]);
    let handle = home.engine.queue_run("envy", params).unwrap();
    let mut completions = handle.completions;
    wait_completion(&mut completions, "envy", 1).await;

    let stored = home.engine.db.lock().fetch_log("envy", 1).unwrap();
    assert_eq!(stored, Some(b"release".to_vec()));
}

#[tokio::test]
async fn before_and_after_scripts_run_in_order() {
    let home = setup();
    let cfg = home.engine.settings.cfg_dir();
    for (name, body) in [("before", "printf 'b:'"), ("after", "printf ':a'")] {
        let path = cfg.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        std::os::unix::fs::PermissionsExt::set_mode(&mut perms, 0o755);
        std::fs::set_permissions(&path, perms).unwrap();
    }
    home.write_job("hooked", "printf run");

    let handle = home.engine.queue_run("hooked", HashMap::new()).unwrap();
    let mut completions = handle.completions;
    let completion = wait_completion(&mut completions, "hooked", 1).await;
    assert_eq!(completion.result, RunState::Success);

    let stored = home.engine.db.lock().fetch_log("hooked", 1).unwrap();
    assert_eq!(stored, Some(b"b:run:a".to_vec()));
}

#[tokio::test]
async fn init_prelude_runs_in_workspace_on_first_build() {
    let home = setup();
    let init = home.engine.settings.jobs_dir().join("ws.init");
    std::fs::write(&init, "#!/bin/sh\nprintf init > marker\n").unwrap();
    let mut perms = std::fs::metadata(&init).unwrap().permissions();
    std::os::unix::fs::PermissionsExt::set_mode(&mut perms, 0o755);
    std::fs::set_permissions(&init, perms).unwrap();
    home.write_job("ws", "printf run");

    let handle = home.engine.queue_run("ws", HashMap::new()).unwrap();
    let mut completions = handle.completions;
    wait_completion(&mut completions, "ws", 1).await;

    let marker = home.engine.settings.workspace_dir("ws").join("marker");
    assert_eq!(std::fs::read(marker).unwrap(), b"init");

    // second build: workspace exists, init does not run again
    let handle = home.engine.queue_run("ws", HashMap::new()).unwrap();
    let mut completions = handle.completions;
    wait_completion(&mut completions, "ws", 2).await;
    let stored = home.engine.db.lock().fetch_log("ws", 2).unwrap();
    assert_eq!(stored, Some(b"run".to_vec()));
}
