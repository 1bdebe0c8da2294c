// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run state machine and per-build data.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Terminal and in-flight states of a run.
///
/// The integer discriminants are the values persisted in the `builds` table,
/// so they must never be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Unknown = 0,
    Queued = 1,
    Running = 2,
    Aborted = 3,
    Failed = 4,
    Success = 5,
}

crate::simple_display! {
    RunState {
        Unknown => "unknown",
        Queued => "queued",
        Running => "running",
        Aborted => "aborted",
        Failed => "failed",
        Success => "success",
    }
}

impl RunState {
    /// Recover a state from its persisted integer discriminant.
    pub fn from_i64(v: i64) -> Self {
        match v {
            1 => RunState::Queued,
            2 => RunState::Running,
            3 => RunState::Aborted,
            4 => RunState::Failed,
            5 => RunState::Success,
            _ => RunState::Unknown,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Aborted | RunState::Failed | RunState::Success)
    }
}

/// One entry in a run's script sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub path: PathBuf,
    /// Working directory override. `None` means the run directory.
    pub cwd: Option<PathBuf>,
}

impl Script {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), cwd: None }
    }

    pub fn in_dir(path: impl Into<PathBuf>, cwd: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), cwd: Some(cwd.into()) }
    }
}

/// Result of splitting user parameters into plain and reserved parts.
///
/// Keys beginning with `=` are internal metadata, stripped before the
/// parameters are exposed to scripts. Unrecognized `=`-keys are returned so
/// the caller can log and drop them.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SplitParams {
    pub params: HashMap<String, String>,
    pub parent_job: String,
    pub parent_build: u32,
    pub reason: String,
    pub unknown: Vec<String>,
}

impl SplitParams {
    pub fn from(raw: HashMap<String, String>) -> Self {
        let mut split = SplitParams::default();
        for (key, value) in raw {
            if let Some(stripped) = key.strip_prefix('=') {
                match stripped {
                    "parentJob" => split.parent_job = value,
                    "parentBuild" => {
                        split.parent_build = value.parse().unwrap_or_default()
                    }
                    "reason" => split.reason = value,
                    _ => split.unknown.push(key),
                }
            } else {
                split.params.insert(key, value);
            }
        }
        split
    }
}

/// State for one build attempt of a job.
///
/// A run is queued (no node, no number, no started_at), then active, then
/// terminal. Control handles (cancellation, signals) live with the engine;
/// this is the data the engine schedules and persists.
#[derive(Debug, Clone)]
pub struct Run {
    pub name: String,
    /// Build number, assigned at admission. 0 while queued.
    pub number: u32,
    /// Name of the node this run was placed on. Empty while queued.
    pub node: String,
    pub queued_at: i64,
    pub started_at: i64,
    pub completed_at: i64,
    /// User parameters, exposed to scripts as environment variables.
    pub params: HashMap<String, String>,
    pub parent_job: String,
    pub parent_build: u32,
    reason: String,
    /// Ordered script sequence, composed at admission.
    pub scripts: Vec<Script>,
    /// Index of the script currently (or next) executing.
    pub step: usize,
    /// Merged environment from env files, composed at admission.
    pub env: HashMap<String, String>,
    /// Per-build working directory.
    pub run_dir: PathBuf,
    /// Combined stdout/stderr of all steps so far.
    pub log: Vec<u8>,
    /// Terminal state of the previous build of this job, if any.
    pub last_result: RunState,
    /// Pid of the currently executing child, if any.
    pub pid: Option<u32>,
    pub result: RunState,
}

impl Run {
    /// Create a queued run. Reserved `=`-parameters are split out of `params`;
    /// the caller is expected to log `SplitParams::unknown`.
    pub fn queued(name: impl Into<String>, split: SplitParams, queued_at: i64) -> Self {
        Self {
            name: name.into(),
            number: 0,
            node: String::new(),
            queued_at,
            started_at: 0,
            completed_at: 0,
            params: split.params,
            parent_job: split.parent_job,
            parent_build: split.parent_build,
            reason: split.reason,
            scripts: Vec::new(),
            step: 0,
            env: HashMap::new(),
            run_dir: PathBuf::new(),
            log: Vec::new(),
            last_result: RunState::Unknown,
            pid: None,
            result: RunState::Queued,
        }
    }

    /// Human-readable reason this run exists.
    pub fn reason(&self) -> String {
        if !self.reason.is_empty() {
            self.reason.clone()
        } else if !self.parent_job.is_empty() {
            format!("Triggered by {} #{}", self.parent_job, self.parent_build)
        } else {
            String::new()
        }
    }

    /// The next script to execute, if any remain.
    pub fn current_script(&self) -> Option<&Script> {
        self.scripts.get(self.step)
    }

    /// Record the exit of the current step and advance.
    ///
    /// Returns true when the run should continue with another step.
    pub fn step_exited(&mut self, success: bool) -> bool {
        if self.result == RunState::Aborted {
            return false;
        }
        self.result = if success { RunState::Success } else { RunState::Failed };
        self.step += 1;
        self.pid = None;
        self.result == RunState::Success && self.step < self.scripts.len()
    }
}

crate::builder! {
    pub struct RunBuilder => Run {
        into {
            name: String = "test-job",
            node: String = "",
            parent_job: String = "",
            reason: String = "",
            run_dir: PathBuf = "/tmp/run",
        }
        set {
            number: u32 = 1,
            queued_at: i64 = 100,
            started_at: i64 = 110,
            completed_at: i64 = 0,
            params: HashMap<String, String> = HashMap::new(),
            parent_build: u32 = 0,
            scripts: Vec<Script> = Vec::new(),
            step: usize = 0,
            env: HashMap<String, String> = HashMap::new(),
            log: Vec<u8> = Vec::new(),
            last_result: RunState = RunState::Unknown,
            pid: Option<u32> = None,
            result: RunState = RunState::Running,
        }
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
