// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subscriber set and event fan-out.
//!
//! The engine owns the set; transports hold the receiving half of each
//! channel. Sends never block. A subscriber whose receiver is gone is
//! dropped from the set on the next delivery attempt; subscriber I/O
//! failures are tolerated silently.

use laminar_core::MonitorScope;
use std::collections::HashMap;
use tokio::sync::mpsc;

/// One message to a subscriber: a JSON status document or raw log bytes.
#[derive(Debug, Clone)]
pub enum ClientMsg {
    Status(serde_json::Value),
    Log(Vec<u8>),
}

#[derive(Debug)]
struct Subscriber {
    scope: MonitorScope,
    tx: mpsc::UnboundedSender<ClientMsg>,
}

#[derive(Default, Debug)]
pub(crate) struct ClientSet {
    next_id: u64,
    subscribers: HashMap<u64, Subscriber>,
}

impl ClientSet {
    pub fn insert(&mut self, scope: MonitorScope, tx: mpsc::UnboundedSender<ClientMsg>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.subscribers.insert(id, Subscriber { scope, tx });
        id
    }

    pub fn remove(&mut self, id: u64) {
        self.subscribers.remove(&id);
    }

    pub fn send_to(&mut self, id: u64, msg: ClientMsg) {
        if let Some(sub) = self.subscribers.get(&id) {
            if sub.tx.send(msg).is_err() {
                self.subscribers.remove(&id);
            }
        }
    }

    /// Deliver a status event to every subscriber whose scope matches.
    pub fn send_status(&mut self, job: &str, num: Option<u32>, msg: &serde_json::Value) {
        self.fan_out(msg, |scope| scope.wants_status(job, num));
    }

    /// Deliver a job_started event. RUN-scope subscribers on the same job
    /// additionally receive it even for other build numbers, so a run page
    /// can learn that a newer build exists.
    pub fn send_started(&mut self, job: &str, num: u32, msg: &serde_json::Value) {
        self.fan_out(msg, |scope| {
            scope.wants_status(job, Some(num))
                || matches!(scope, MonitorScope::Run { name, .. } if name == job)
        });
    }

    /// Deliver a chunk of log output to matching LOG subscribers.
    pub fn send_log(&mut self, job: &str, num: u32, chunk: &[u8]) {
        let mut dead = Vec::new();
        for (id, sub) in &self.subscribers {
            if sub.scope.wants_log(job, num)
                && sub.tx.send(ClientMsg::Log(chunk.to_vec())).is_err()
            {
                dead.push(*id);
            }
        }
        for id in dead {
            self.subscribers.remove(&id);
        }
    }

    fn fan_out(&mut self, msg: &serde_json::Value, wants: impl Fn(&MonitorScope) -> bool) {
        let mut dead = Vec::new();
        for (id, sub) in &self.subscribers {
            if wants(&sub.scope)
                && sub.tx.send(ClientMsg::Status(msg.clone())).is_err()
            {
                dead.push(*id);
            }
        }
        for id in dead {
            self.subscribers.remove(&id);
        }
    }

    // NOTE(lifetime): used in tests
    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
#[path = "clients_tests.rs"]
mod tests;
