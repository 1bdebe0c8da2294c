// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end engine tests: real scripts under a scratch home directory.

mod invariants;
mod scenarios;

use super::*;
use laminar_core::SystemClock;
use laminar_storage::Database;
use std::os::unix::fs::PermissionsExt;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

/// How long scenario tests wait for runs to finish.
const WAIT: Duration = Duration::from_secs(10);

pub(crate) struct TestHome {
    // NOTE(lifetime): held so the scratch directory outlives the engine
    #[allow(dead_code)]
    dir: tempfile::TempDir,
    pub engine: Arc<Engine<SystemClock>>,
}

pub(crate) fn setup() -> TestHome {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings {
        home: dir.path().to_path_buf(),
        title: "Laminar".into(),
        archive_url: "/archive".into(),
    };
    std::fs::create_dir_all(settings.nodes_dir()).unwrap();
    std::fs::create_dir_all(settings.jobs_dir()).unwrap();
    let db = Database::open(&settings.home.join("laminar.sqlite")).unwrap();
    let engine = Engine::new(settings, db, SystemClock).unwrap();
    TestHome { dir, engine }
}

impl TestHome {
    /// Write `cfg/jobs/<name>.run` with a shell script body.
    pub fn write_job(&self, name: &str, body: &str) {
        let path = self.engine.settings.job_script(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
    }

    pub fn write_job_conf(&self, name: &str, content: &str) {
        let path = self.engine.settings.jobs_dir().join(format!("{name}.conf"));
        std::fs::write(path, content).unwrap();
    }

    pub fn write_node(&self, name: &str, content: &str) {
        let path = self.engine.settings.nodes_dir().join(format!("{name}.conf"));
        std::fs::write(path, content).unwrap();
    }

    /// Register a subscriber and return its receiving half.
    pub fn watch(&self, scope: MonitorScope) -> mpsc::UnboundedReceiver<ClientMsg> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.engine.register_client(scope, tx);
        rx
    }

    /// Node the given active run was placed on.
    pub fn node_of(&self, job: &str, num: u32) -> Option<String> {
        let state = self.engine.state.lock();
        state.active.get(job, num).map(|s| s.run.node.clone())
    }

    pub fn queue_len(&self) -> usize {
        self.engine.state.lock().queue.len()
    }

    pub fn busy_of(&self, node: &str) -> u32 {
        self.engine.state.lock().nodes.get(node).map(|n| n.busy).unwrap_or(0)
    }
}

/// Await the terminal transition of one specific run.
pub(crate) async fn wait_completion(
    rx: &mut broadcast::Receiver<Completion>,
    job: &str,
    num: u32,
) -> Completion {
    let fut = async {
        loop {
            match rx.recv().await {
                Ok(c) if c.job == job && c.num == num => return c,
                Ok(_) => continue,
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => panic!("completions channel closed"),
            }
        }
    };
    tokio::time::timeout(WAIT, fut).await.expect("run did not complete in time")
}

/// Drain buffered status messages, returning their `type` fields.
pub(crate) fn drain_status_types(rx: &mut mpsc::UnboundedReceiver<ClientMsg>) -> Vec<String> {
    let mut types = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        if let ClientMsg::Status(doc) = msg {
            types.push(doc["type"].as_str().unwrap_or_default().to_string());
        }
    }
    types
}

/// Drain buffered log chunks into one byte string.
pub(crate) fn drain_log(rx: &mut mpsc::UnboundedReceiver<ClientMsg>) -> Vec<u8> {
    let mut bytes = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        if let ClientMsg::Log(chunk) = msg {
            bytes.extend_from_slice(&chunk);
        }
    }
    bytes
}
