// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build history database.
//!
//! One table, `builds`, keyed by (name, number), with an index on completion
//! time for the history and statistics queries. All statements are prepared
//! and stepped synchronously; the engine serializes access.

use crate::compress::{maybe_compress, maybe_decompress};
use laminar_core::{RunState, SortField};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// A finished run, ready to persist.
#[derive(Debug, Clone)]
pub struct BuildRecord {
    pub name: String,
    pub number: u32,
    pub node: String,
    pub queued_at: i64,
    pub started_at: i64,
    pub completed_at: i64,
    pub result: RunState,
    /// Raw (uncompressed) combined log.
    pub log: Vec<u8>,
    pub parent_job: String,
    pub parent_build: u32,
    pub reason: String,
}

/// Row shape for the home-page recent list and per-job summaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRow {
    pub name: String,
    pub number: u32,
    pub node: String,
    pub started_at: i64,
    pub completed_at: i64,
    pub result: RunState,
}

/// Row shape for the paginated per-job history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRow {
    pub number: u32,
    pub started_at: i64,
    pub completed_at: i64,
    pub result: RunState,
    pub reason: String,
}

/// Latest build of one job, for the all-jobs listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSummary {
    pub name: String,
    pub number: u32,
    pub started_at: i64,
    pub completed_at: i64,
    pub result: RunState,
}

/// Result counts for one day of the home-page bar chart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DaySummary {
    pub counts: Vec<(RunState, u32)>,
}

/// Number of rows per page in the per-job history.
pub const RUNS_PER_PAGE: u32 = 10;

pub struct Database {
    conn: Connection,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

impl Database {
    /// Open (or create) the database at the given path and ensure the schema.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// In-memory database for tests.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), StorageError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS builds(
                 name TEXT, number INT UNSIGNED, node TEXT, queuedAt INT,
                 startedAt INT, completedAt INT, result INT, output BLOB,
                 outputLen INT, parentJob TEXT, parentBuild INT, reason TEXT,
                 PRIMARY KEY (name, number));
             CREATE INDEX IF NOT EXISTS idx_completion_time
                 ON builds(completedAt DESC);",
        )?;
        Ok(())
    }

    /// Highest assigned build number per job, used to seed the in-memory
    /// counters at startup.
    pub fn latest_build_numbers(&self) -> Result<HashMap<String, u32>, StorageError> {
        let mut stmt =
            self.conn.prepare("SELECT name, MAX(number) FROM builds GROUP BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?))
        })?;
        let mut nums = HashMap::new();
        for row in rows {
            let (name, number) = row?;
            nums.insert(name, number);
        }
        Ok(nums)
    }

    /// Persist a finished run, compressing long logs.
    pub fn insert_build(&self, record: &BuildRecord) -> Result<(), StorageError> {
        let (blob, output_len) = maybe_compress(&record.log);
        self.conn.execute(
            "INSERT INTO builds VALUES(?,?,?,?,?,?,?,?,?,?,?,?)",
            params![
                record.name,
                record.number,
                record.node,
                record.queued_at,
                record.started_at,
                record.completed_at,
                record.result as i64,
                blob,
                output_len as i64,
                record.parent_job,
                record.parent_build,
                record.reason,
            ],
        )?;
        Ok(())
    }

    /// Terminal result of the most recently completed build of a job.
    pub fn last_result(&self, job: &str) -> Result<Option<RunState>, StorageError> {
        let result = self
            .conn
            .query_row(
                "SELECT result FROM builds WHERE name = ?
                 ORDER BY completedAt DESC LIMIT 1",
                params![job],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(result.map(RunState::from_i64))
    }

    /// Duration of the most recently completed build of a job, in seconds.
    pub fn last_duration(&self, job: &str) -> Result<Option<i64>, StorageError> {
        Ok(self
            .conn
            .query_row(
                "SELECT completedAt - startedAt FROM builds WHERE name = ?
                 ORDER BY completedAt DESC LIMIT 1",
                params![job],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// Stored log for a build, decompressed if necessary.
    ///
    /// Returns `Ok(None)` when the build is unknown or the stored blob fails
    /// to decompress (the failure is logged; the request must not fail).
    pub fn fetch_log(&self, job: &str, num: u32) -> Result<Option<Vec<u8>>, StorageError> {
        let row = self
            .conn
            .query_row(
                "SELECT output, outputLen FROM builds WHERE name = ? AND number = ?",
                params![job, num],
                |row| Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;
        Ok(row.and_then(|(blob, len)| maybe_decompress(blob, len as usize)))
    }

    /// Most recently completed builds across all jobs.
    pub fn recent_builds(&self, limit: u32) -> Result<Vec<BuildRow>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT name, number, node, startedAt, completedAt, result
             FROM builds ORDER BY completedAt DESC LIMIT ?",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok(BuildRow {
                name: row.get(0)?,
                number: row.get(1)?,
                node: row.get(2)?,
                started_at: row.get(3)?,
                completed_at: row.get(4)?,
                result: RunState::from_i64(row.get(5)?),
            })
        })?;
        rows.collect::<Result<_, _>>().map_err(Into::into)
    }

    /// One page of a job's build history.
    ///
    /// The sort column is a whitelisted identifier (it cannot be bound), the
    /// rest of the statement is parameterized.
    pub fn job_page(
        &self,
        job: &str,
        page: u32,
        field: SortField,
        desc: bool,
    ) -> Result<Vec<PageRow>, StorageError> {
        let direction = if desc { "DESC" } else { "ASC" };
        let order_by = match field {
            SortField::Number => format!("number {direction}"),
            SortField::Result => format!("result {direction}, number DESC"),
            SortField::Started => format!("startedAt {direction}, number DESC"),
            SortField::Duration => {
                format!("(completedAt-startedAt) {direction}, number DESC")
            }
        };
        let sql = format!(
            "SELECT number, startedAt, completedAt, result, reason
             FROM builds WHERE name = ? ORDER BY {order_by} LIMIT ?,?",
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![job, page * RUNS_PER_PAGE, RUNS_PER_PAGE],
            |row| {
                Ok(PageRow {
                    number: row.get(0)?,
                    started_at: row.get(1)?,
                    completed_at: row.get(2)?,
                    result: RunState::from_i64(row.get(3)?),
                    reason: row.get(4)?,
                })
            },
        )?;
        rows.collect::<Result<_, _>>().map_err(Into::into)
    }

    /// Number of persisted builds of a job.
    pub fn build_count(&self, job: &str) -> Result<u32, StorageError> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM builds WHERE name = ?",
            params![job],
            |row| row.get(0),
        )?)
    }

    /// Most recent successful build of a job: (number, startedAt).
    pub fn last_success(&self, job: &str) -> Result<Option<(u32, i64)>, StorageError> {
        Ok(self
            .conn
            .query_row(
                "SELECT number, startedAt FROM builds
                 WHERE name = ? AND result = ?
                 ORDER BY completedAt DESC LIMIT 1",
                params![job, RunState::Success as i64],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?)
    }

    /// Most recent unsuccessful build of a job: (number, startedAt).
    pub fn last_failed(&self, job: &str) -> Result<Option<(u32, i64)>, StorageError> {
        Ok(self
            .conn
            .query_row(
                "SELECT number, startedAt FROM builds
                 WHERE name = ? AND result <> ?
                 ORDER BY completedAt DESC LIMIT 1",
                params![job, RunState::Success as i64],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?)
    }

    /// Latest persisted build per job.
    pub fn job_summaries(&self) -> Result<Vec<JobSummary>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT name, number, startedAt, completedAt, result FROM builds b
             WHERE number = (SELECT MAX(number) FROM builds WHERE name = b.name)
             ORDER BY name",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(JobSummary {
                name: row.get(0)?,
                number: row.get(1)?,
                started_at: row.get(2)?,
                completed_at: row.get(3)?,
                result: RunState::from_i64(row.get(4)?),
            })
        })?;
        rows.collect::<Result<_, _>>().map_err(Into::into)
    }

    /// Per-result build counts for each of the last 7 days (oldest first).
    pub fn builds_per_day(&self, now: i64) -> Result<Vec<DaySummary>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT result, COUNT(*) FROM builds
             WHERE completedAt > ? AND completedAt < ? GROUP BY result",
        )?;
        let mut days = Vec::with_capacity(7);
        for i in (0..7).rev() {
            let start = 86400 * (now / 86400 - i);
            let end = 86400 * (now / 86400 - (i - 1));
            let rows = stmt.query_map(params![start, end], |row| {
                Ok((RunState::from_i64(row.get(0)?), row.get::<_, u32>(1)?))
            })?;
            let counts = rows.collect::<Result<_, _>>()?;
            days.push(DaySummary { counts });
        }
        Ok(days)
    }

    /// Busiest jobs over the last 24 hours: (name, build count), top 5.
    pub fn builds_per_job(&self, now: i64) -> Result<Vec<(String, u32)>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT name, COUNT(*) c FROM builds WHERE completedAt > ?
             GROUP BY name ORDER BY c DESC LIMIT 5",
        )?;
        let rows = stmt.query_map(params![now - 86400], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?;
        rows.collect::<Result<_, _>>().map_err(Into::into)
    }

    /// Slowest jobs by average duration over the last 7 days, top 5.
    pub fn time_per_job(&self, now: i64) -> Result<Vec<(String, i64)>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT name, AVG(completedAt-startedAt) av FROM builds
             WHERE completedAt > ? GROUP BY name ORDER BY av DESC LIMIT 5",
        )?;
        let rows = stmt.query_map(params![now - 7 * 86400], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)? as i64))
        })?;
        rows.collect::<Result<_, _>>().map_err(Into::into)
    }

    /// Timing columns of one persisted build, for the run status page.
    pub fn build_times(
        &self,
        job: &str,
        num: u32,
    ) -> Result<Option<PageRow>, StorageError> {
        Ok(self
            .conn
            .query_row(
                "SELECT number, startedAt, completedAt, result, reason
                 FROM builds WHERE name = ? AND number = ?",
                params![job, num],
                |row| {
                    Ok(PageRow {
                        number: row.get(0)?,
                        started_at: row.get(1)?,
                        completed_at: row.get(2)?,
                        result: RunState::from_i64(row.get(3)?),
                        reason: row.get(4)?,
                    })
                },
            )
            .optional()?)
    }

    /// Total queued-time of one persisted build, for the run status page.
    pub fn queued_at(&self, job: &str, num: u32) -> Result<Option<i64>, StorageError> {
        Ok(self
            .conn
            .query_row(
                "SELECT queuedAt FROM builds WHERE name = ? AND number = ?",
                params![job, num],
                |row| row.get(0),
            )
            .optional()?)
    }
}

#[cfg(test)]
#[path = "db_tests.rs"]
mod tests;
