// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;

use laminar_core::{MonitorScope, RunState};
use serde::{Deserialize, Serialize};

/// Request from client to daemon
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Request {
    /// Queue a job; reply as soon as it is enqueued.
    Queue {
        job: String,
        #[serde(default)]
        params: HashMap<String, String>,
    },

    /// Queue a job; reply once it has been admitted to a node.
    Start {
        job: String,
        #[serde(default)]
        params: HashMap<String, String>,
    },

    /// Queue a job; reply once it has finished, with the result.
    Run {
        job: String,
        #[serde(default)]
        params: HashMap<String, String>,
    },

    /// Set a parameter on an active run.
    SetParam { job: String, num: u32, key: String, value: String },

    /// Abort one active run.
    Abort { job: String, num: u32 },

    /// Abort every active run.
    AbortAll,

    /// Subscribe to a scope; the connection switches to a stream of status
    /// frames (JSON) or raw log frames (LOG scope) until the client hangs up.
    Watch { scope: MonitorScope },
}

/// Response from daemon to client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Response {
    /// Generic success
    Ok,

    /// Job was appended to the queue.
    Queued { job: String },

    /// Job was admitted and assigned a build number.
    Started { job: String, num: u32 },

    /// Job reached a terminal state.
    Completed { job: String, num: u32, result: RunState },

    /// Error response
    Error { message: String },
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
