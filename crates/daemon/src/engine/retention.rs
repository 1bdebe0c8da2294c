// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run directory retention.
//!
//! After a run completes, old per-build working directories of that job are
//! removed. Counting back from the finished run would race older,
//! still-running builds of the same job, so the bound is derived from the
//! oldest still-active build (minus one), or the highest assigned build
//! number when none remain active. Archive directories are never swept.

use super::{EngineState, Settings};

pub(crate) fn sweep(settings: &Settings, state: &EngineState, job: &str) {
    let bound = match state.active.oldest_build_of(job) {
        Some(oldest) => oldest.saturating_sub(1),
        None => state.build_nums.get(job).copied().unwrap_or(0),
    };

    let mut num = bound as i64 - state.keep_rundirs as i64;
    while num > 0 {
        let dir = settings.rundir(job, num as u32);
        // the first missing directory ends the sweep; anything older was
        // removed by a previous pass
        if !dir.exists() {
            break;
        }
        if let Err(e) = std::fs::remove_dir_all(&dir) {
            tracing::warn!(dir = %dir.display(), error = %e, "failed to remove run directory");
        }
        num -= 1;
    }
}

#[cfg(test)]
#[path = "retention_tests.rs"]
mod tests;
