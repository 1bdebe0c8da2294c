// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Multi-indexed collection of running runs.
//!
//! One owning map keyed by (job, number) plus a start-ordered secondary
//! index. Runs start one at a time under the engine lock, so insertion
//! order is start order. Both indexes update together on insert and erase.

use super::Scheduled;
use std::collections::HashMap;

type RunKey = (String, u32);

#[derive(Default, Debug)]
pub(crate) struct ActiveSet {
    runs: HashMap<RunKey, Scheduled>,
    order: Vec<RunKey>,
}

impl ActiveSet {
    pub fn insert(&mut self, sched: Scheduled) {
        let key = (sched.run.name.clone(), sched.run.number);
        self.order.push(key.clone());
        self.runs.insert(key, sched);
    }

    pub fn erase(&mut self, job: &str, num: u32) -> Option<Scheduled> {
        let key = (job.to_string(), num);
        self.order.retain(|k| *k != key);
        self.runs.remove(&key)
    }

    pub fn get(&self, job: &str, num: u32) -> Option<&Scheduled> {
        self.runs.get(&(job.to_string(), num))
    }

    pub fn get_mut(&mut self, job: &str, num: u32) -> Option<&mut Scheduled> {
        self.runs.get_mut(&(job.to_string(), num))
    }

    /// Active runs in start order.
    pub fn by_started(&self) -> impl Iterator<Item = &Scheduled> {
        self.order.iter().filter_map(|k| self.runs.get(k))
    }

    /// Active runs of one job, in start order.
    pub fn job_runs<'a>(&'a self, job: &'a str) -> impl Iterator<Item = &'a Scheduled> {
        self.by_started().filter(move |s| s.run.name == job)
    }

    /// Lowest build number among active runs of a job.
    pub fn oldest_build_of(&self, job: &str) -> Option<u32> {
        self.job_runs(job).map(|s| s.run.number).min()
    }

    pub fn keys(&self) -> Vec<RunKey> {
        self.order.clone()
    }

    // NOTE(lifetime): used in tests
    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    // NOTE(lifetime): used in tests
    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}
