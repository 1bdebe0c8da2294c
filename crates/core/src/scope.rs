// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subscriber scopes: which events a connected client wants.

use serde::{Deserialize, Serialize};

/// Sort field for the paginated per-job build listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Number,
    Result,
    Started,
    Duration,
}

crate::simple_display! {
    SortField {
        Number => "number",
        Result => "result",
        Started => "started",
        Duration => "duration",
    }
}

impl Default for SortField {
    fn default() -> Self {
        SortField::Number
    }
}

/// A filter describing which events a subscriber wants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MonitorScope {
    /// Front page: recent builds, running, queued, statistics.
    Home,
    /// Listing of all known jobs.
    All,
    /// One job's build history page.
    Job {
        name: String,
        #[serde(default)]
        page: u32,
        #[serde(default)]
        field: SortField,
        #[serde(default)]
        desc: bool,
    },
    /// One specific build.
    Run { name: String, num: u32 },
    /// Raw log stream of one specific build.
    Log { name: String, num: u32 },
}

impl MonitorScope {
    /// Whether status events about the given run should be delivered.
    ///
    /// `num` is `None` for events about not-yet-numbered runs (job_queued).
    pub fn wants_status(&self, job: &str, num: Option<u32>) -> bool {
        match self {
            MonitorScope::Home | MonitorScope::All => true,
            MonitorScope::Job { name, .. } => name == job,
            MonitorScope::Run { name, num: n } => name == job && num == Some(*n),
            MonitorScope::Log { .. } => false,
        }
    }

    /// Whether raw log bytes for the given run should be delivered.
    pub fn wants_log(&self, job: &str, num: u32) -> bool {
        matches!(self, MonitorScope::Log { name, num: n } if name == job && *n == num)
    }

    /// Job name this scope is bound to, if it is job-specific.
    pub fn job_name(&self) -> Option<&str> {
        match self {
            MonitorScope::Home | MonitorScope::All => None,
            MonitorScope::Job { name, .. }
            | MonitorScope::Run { name, .. }
            | MonitorScope::Log { name, .. } => Some(name),
        }
    }
}

#[cfg(test)]
#[path = "scope_tests.rs"]
mod tests;
