// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::compress::COMPRESS_LOG_MIN_SIZE;

fn record(name: &str, number: u32, result: RunState) -> BuildRecord {
    BuildRecord {
        name: name.into(),
        number,
        node: String::new(),
        queued_at: 100 + number as i64,
        started_at: 110 + number as i64,
        completed_at: 130 + number as i64,
        result,
        log: b"world\n".to_vec(),
        parent_job: String::new(),
        parent_build: 0,
        reason: String::new(),
    }
}

#[test]
fn insert_and_read_back() {
    let db = Database::open_in_memory().unwrap();
    db.insert_build(&record("hello", 1, RunState::Success)).unwrap();

    let nums = db.latest_build_numbers().unwrap();
    assert_eq!(nums.get("hello"), Some(&1));

    assert_eq!(db.last_result("hello").unwrap(), Some(RunState::Success));
    assert_eq!(db.last_duration("hello").unwrap(), Some(20));
    assert_eq!(db.fetch_log("hello", 1).unwrap(), Some(b"world\n".to_vec()));
    assert_eq!(db.fetch_log("hello", 2).unwrap(), None);
    assert_eq!(db.queued_at("hello", 1).unwrap(), Some(101));
}

#[test]
fn open_creates_schema_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("laminar.sqlite");
    {
        let db = Database::open(&path).unwrap();
        db.insert_build(&record("j", 1, RunState::Failed)).unwrap();
    }
    let db = Database::open(&path).unwrap();
    assert_eq!(db.last_result("j").unwrap(), Some(RunState::Failed));
}

#[test]
fn large_log_roundtrips_compressed() {
    let db = Database::open_in_memory().unwrap();
    let mut rec = record("noisy", 1, RunState::Success);
    rec.log = vec![b'A'; 4096];
    db.insert_build(&rec).unwrap();

    // stored blob is compressed: read the raw column directly
    let (blob, len): (Vec<u8>, i64) = db
        .conn
        .query_row(
            "SELECT output, outputLen FROM builds WHERE name='noisy'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(len, 4096);
    assert!(blob.len() < 4096);
    assert!(len as usize >= COMPRESS_LOG_MIN_SIZE);

    assert_eq!(db.fetch_log("noisy", 1).unwrap(), Some(vec![b'A'; 4096]));
}

#[test]
fn recent_builds_ordered_by_completion() {
    let db = Database::open_in_memory().unwrap();
    for n in 1..=4 {
        db.insert_build(&record("j", n, RunState::Success)).unwrap();
    }
    let recent = db.recent_builds(2).unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].number, 4);
    assert_eq!(recent[1].number, 3);
}

#[test]
fn job_page_sorting_and_pagination() {
    let db = Database::open_in_memory().unwrap();
    for n in 1..=12 {
        db.insert_build(&record("j", n, RunState::Success)).unwrap();
    }

    let page0 = db.job_page("j", 0, SortField::Number, true).unwrap();
    assert_eq!(page0.len(), 10);
    assert_eq!(page0[0].number, 12);

    let page1 = db.job_page("j", 1, SortField::Number, true).unwrap();
    assert_eq!(page1.len(), 2);
    assert_eq!(page1[1].number, 1);

    let asc = db.job_page("j", 0, SortField::Started, false).unwrap();
    assert_eq!(asc[0].number, 1);

    assert_eq!(db.build_count("j").unwrap(), 12);
}

#[test]
fn last_success_and_failed() {
    let db = Database::open_in_memory().unwrap();
    db.insert_build(&record("j", 1, RunState::Success)).unwrap();
    db.insert_build(&record("j", 2, RunState::Failed)).unwrap();
    db.insert_build(&record("j", 3, RunState::Aborted)).unwrap();

    assert_eq!(db.last_success("j").unwrap(), Some((1, 111)));
    // aborted completed later than failed
    assert_eq!(db.last_failed("j").unwrap(), Some((3, 113)));
}

#[test]
fn job_summaries_take_latest_build() {
    let db = Database::open_in_memory().unwrap();
    db.insert_build(&record("a", 1, RunState::Failed)).unwrap();
    db.insert_build(&record("a", 2, RunState::Success)).unwrap();
    db.insert_build(&record("b", 1, RunState::Success)).unwrap();

    let summaries = db.job_summaries().unwrap();
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].name, "a");
    assert_eq!(summaries[0].number, 2);
    assert_eq!(summaries[0].result, RunState::Success);
}

#[test]
fn statistics_queries() {
    let db = Database::open_in_memory().unwrap();
    let now = 1_000_000_000;
    let mut rec = record("busy", 1, RunState::Success);
    rec.completed_at = now - 100;
    rec.started_at = now - 160;
    db.insert_build(&rec).unwrap();

    let per_job = db.builds_per_job(now).unwrap();
    assert_eq!(per_job, vec![("busy".to_string(), 1)]);

    let per_day = db.builds_per_day(now).unwrap();
    assert_eq!(per_day.len(), 7);
    // today is the last entry
    assert_eq!(per_day[6].counts, vec![(RunState::Success, 1)]);
    assert!(per_day[0].counts.is_empty());

    let times = db.time_per_job(now).unwrap();
    assert_eq!(times, vec![("busy".to_string(), 60)]);
}
