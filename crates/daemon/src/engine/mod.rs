// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The scheduler and run lifecycle engine.
//!
//! All scheduler state (queue, active set, node busy counters, subscriber
//! set, build-number counters) lives in one [`EngineState`] behind a single
//! mutex. Every mutation (enqueue, admission pass, log append, terminal
//! transition, config reload) runs to completion under that lock, so each
//! admission pass sees one consistent snapshot and subscribers observe
//! events for a run strictly in the order queued → started → log chunks →
//! completed. Parallelism comes from child processes, not from concurrent
//! access to scheduler state.

mod active;
mod admission;
mod clients;
mod executor;
mod registry;
mod retention;
mod status;

pub use clients::ClientMsg;

use active::ActiveSet;
use clients::ClientSet;
use laminar_core::{Clock, MonitorScope, Node, Run, RunState, SplitParams, SystemClock};
use laminar_storage::{Database, StorageError};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// Engine configuration resolved at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Root state directory (`LAMINAR_HOME`).
    pub home: PathBuf,
    /// Title reported in status documents.
    pub title: String,
    /// URL prefix for archived artifacts.
    pub archive_url: String,
}

impl Settings {
    pub fn cfg_dir(&self) -> PathBuf {
        self.home.join("cfg")
    }

    pub fn nodes_dir(&self) -> PathBuf {
        self.cfg_dir().join("nodes")
    }

    pub fn jobs_dir(&self) -> PathBuf {
        self.cfg_dir().join("jobs")
    }

    /// The mandatory executable defining a job; its presence defines the job.
    pub fn job_script(&self, job: &str) -> PathBuf {
        self.jobs_dir().join(format!("{job}.run"))
    }

    /// Per-job persistent working directory, shared across builds.
    pub fn workspace_dir(&self, job: &str) -> PathBuf {
        self.home.join("run").join(job).join("workspace")
    }

    /// Per-build ephemeral working directory.
    pub fn rundir(&self, job: &str, num: u32) -> PathBuf {
        self.home.join("run").join(job).join(num.to_string())
    }

    /// Per-build permanent artifact directory.
    pub fn archive_dir(&self, job: &str, num: u32) -> PathBuf {
        self.home.join("archive").join(job).join(num.to_string())
    }
}

/// A run the engine is responsible for, with its control handles.
#[derive(Debug)]
pub(crate) struct Scheduled {
    pub run: Run,
    /// Abort signal: cancelled by explicit abort, abort-all, or timeout.
    pub token: CancellationToken,
    /// Fulfilled with the build number at admission.
    pub started_tx: Option<oneshot::Sender<u32>>,
}

impl Scheduled {
    fn new(run: Run, started_tx: oneshot::Sender<u32>) -> Self {
        Self { run, token: CancellationToken::new(), started_tx: Some(started_tx) }
    }
}

/// Terminal notification published to all waiters.
#[derive(Debug, Clone)]
pub struct Completion {
    pub job: String,
    pub num: u32,
    pub result: RunState,
}

/// Handle returned from [`Engine::queue_run`].
#[derive(Debug)]
pub struct RunHandle {
    pub job: String,
    /// Fulfilled with the build number once the run is admitted to a node.
    /// Closed without a value if the run is dropped before starting.
    pub started: oneshot::Receiver<u32>,
    /// Terminal transitions of all runs; filter for the matching build.
    pub completions: broadcast::Receiver<Completion>,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown job: {0}")]
    UnknownJob(String),
}

/// Scheduler state; mutated only under the engine lock.
#[derive(Debug)]
pub(crate) struct EngineState {
    /// Worker pools by name. The empty name is the synthesized default node.
    pub nodes: BTreeMap<String, Node>,
    /// Tag sets from job config files; absence means the job is untagged.
    pub job_tags: HashMap<String, BTreeSet<String>>,
    pub queue: VecDeque<Scheduled>,
    pub active: ActiveSet,
    /// Highest assigned build number per job.
    pub build_nums: HashMap<String, u32>,
    pub keep_rundirs: u32,
    pub clients: ClientSet,
}

impl EngineState {
    fn new(build_nums: HashMap<String, u32>) -> Self {
        Self {
            nodes: BTreeMap::new(),
            job_tags: HashMap::new(),
            queue: VecDeque::new(),
            active: ActiveSet::default(),
            build_nums,
            keep_rundirs: 0,
            clients: ClientSet::default(),
        }
    }
}

/// Engine specialization used by the daemon.
pub type DaemonEngine = Engine<SystemClock>;

#[derive(Debug)]
pub struct Engine<C: Clock> {
    pub(crate) settings: Settings,
    pub(crate) db: Mutex<Database>,
    pub(crate) state: Mutex<EngineState>,
    pub(crate) completions: broadcast::Sender<Completion>,
    pub(crate) clock: C,
}

impl<C: Clock + 'static> Engine<C> {
    /// Create the engine: seed per-job build counters from persisted history
    /// and load node/job configuration from disk.
    pub fn new(settings: Settings, db: Database, clock: C) -> Result<Arc<Self>, StorageError> {
        let build_nums = db.latest_build_numbers()?;
        let (completions, _) = broadcast::channel(256);
        let engine = Self {
            settings,
            db: Mutex::new(db),
            state: Mutex::new(EngineState::new(build_nums)),
            completions,
            clock,
        };
        let mut state = engine.state.lock();
        registry::load_configuration(&engine.settings, &mut state);
        drop(state);
        Ok(Arc::new(engine))
    }

    /// Queue a job for execution.
    ///
    /// Rejects names with no runnable script. Reserved `=`-prefixed
    /// parameters become run metadata; unknown ones are logged and dropped.
    pub fn queue_run(
        self: &Arc<Self>,
        job: &str,
        params: HashMap<String, String>,
    ) -> Result<RunHandle, EngineError> {
        if !self.settings.job_script(job).is_file() {
            tracing::error!(job, "non-existent job");
            return Err(EngineError::UnknownJob(job.to_string()));
        }

        let split = SplitParams::from(params);
        for key in &split.unknown {
            tracing::error!(job, param = %key, "unknown internal job parameter");
        }
        let run = Run::queued(job, split, self.clock.epoch_secs());

        let (started_tx, started_rx) = oneshot::channel();
        let completions = self.completions.subscribe();

        let mut state = self.state.lock();
        state.queue.push_back(Scheduled::new(run, started_tx));

        let msg = self.event_message("job_queued", serde_json::json!({ "name": job }));
        state.clients.send_status(job, None, &msg);

        admission::assign_new_jobs(self, &mut state);

        Ok(RunHandle { job: job.to_string(), started: started_rx, completions })
    }

    /// Set a parameter on an active run. Returns false if no such run.
    pub fn set_param(&self, job: &str, num: u32, key: &str, value: &str) -> bool {
        let mut state = self.state.lock();
        match state.active.get_mut(job, num) {
            Some(sched) => {
                sched.run.params.insert(key.to_string(), value.to_string());
                true
            }
            None => false,
        }
    }

    /// Abort one active run. Returns false if no such run.
    ///
    /// Level-triggered: the current child is signaled, no further steps
    /// spawn, and the run still proceeds through the terminal transition.
    pub fn abort(&self, job: &str, num: u32) -> bool {
        let mut state = self.state.lock();
        Self::abort_in(&mut state, job, num)
    }

    /// Abort every active run.
    pub fn abort_all(&self) {
        let mut state = self.state.lock();
        let keys = state.active.keys();
        for (job, num) in keys {
            Self::abort_in(&mut state, &job, num);
        }
    }

    fn abort_in(state: &mut EngineState, job: &str, num: u32) -> bool {
        match state.active.get_mut(job, num) {
            Some(sched) if !sched.run.result.is_terminal() => {
                sched.run.result = RunState::Aborted;
                sched.token.cancel();
                true
            }
            _ => false,
        }
    }

    /// Re-read node and job configuration; new nodes or tag changes may
    /// unblock queued work, so the admission loop runs afterwards.
    pub fn notify_config_changed(self: &Arc<Self>) {
        let mut state = self.state.lock();
        registry::load_configuration(&self.settings, &mut state);
        admission::assign_new_jobs(self, &mut state);
    }

    /// Register a subscriber. The initial snapshot for its scope is pushed
    /// before any later event, so the client never misses a transition.
    pub fn register_client(
        &self,
        scope: MonitorScope,
        tx: mpsc::UnboundedSender<ClientMsg>,
    ) -> u64 {
        let mut state = self.state.lock();
        let snapshot = status::initial_message(self, &state, &scope);
        let id = state.clients.insert(scope, tx);
        if let Some(msg) = snapshot {
            state.clients.send_to(id, msg);
        }
        id
    }

    pub fn deregister_client(&self, id: u64) {
        self.state.lock().clients.remove(id);
    }

    /// Subscribe to terminal transitions (the waiter interface).
    pub fn subscribe_completions(&self) -> broadcast::Receiver<Completion> {
        self.completions.subscribe()
    }

    /// Counts of total and busy executors across all nodes.
    pub fn executor_counts(&self) -> (u32, u32) {
        let state = self.state.lock();
        let total = state.nodes.values().map(|n| n.executors).sum();
        let busy = state.nodes.values().map(|n| n.busy).sum();
        (total, busy)
    }

    /// Append a chunk of child output to a run's live log and fan it out to
    /// matching subscribers, in production order.
    pub(crate) fn append_log(&self, job: &str, num: u32, chunk: &[u8]) {
        let mut state = self.state.lock();
        if let Some(sched) = state.active.get_mut(job, num) {
            sched.run.log.extend_from_slice(chunk);
            state.clients.send_log(job, num, chunk);
        }
    }

    /// Build the `{type, title, time, data}` envelope for an event.
    pub(crate) fn event_message(&self, typ: &str, data: serde_json::Value) -> serde_json::Value {
        status::envelope(&self.settings.title, self.clock.epoch_secs(), typ, data)
    }
}

#[cfg(test)]
#[path = "engine_tests/mod.rs"]
mod tests;
