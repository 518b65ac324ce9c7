//! Build run history queries.
//!
//! Runs are append-only. Status updates only apply to rows that are still
//! `RUNNING`, so a terminal run can never be rewritten.

use rusqlite::{Connection, OptionalExtension};
use wot_types::{BuildRun, BuildStatus, BuildTrigger};

use super::opt_u64_at;
use crate::{is_constraint_violation, DbError, Result};

const RUN_COLUMNS: &str = "id, status, triggered_by, started_at, completed_at, seeders_count,
     nodes_count, fetch_failures, max_depth, error_message";

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BuildRun> {
    let status: String = row.get(1)?;
    let trigger: String = row.get(2)?;
    Ok(BuildRun {
        id: row.get(0)?,
        status: status.parse().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, e.into())
        })?,
        trigger: trigger.parse().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, e.into())
        })?,
        started_at: row.get::<_, i64>(3)? as u64,
        completed_at: opt_u64_at(row, 4)?,
        seeders_count: opt_u64_at(row, 5)?,
        nodes_count: opt_u64_at(row, 6)?,
        fetch_failures: opt_u64_at(row, 7)?,
        max_depth: row.get(8)?,
        error_message: row.get(9)?,
    })
}

/// Create a `RUNNING` run and return its id.
///
/// Fails with `BuildRunning` if another run is still `RUNNING`; the
/// partial unique index makes this check atomic.
pub fn start(
    conn: &Connection,
    trigger: BuildTrigger,
    max_depth: u32,
    started_at: u64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO build_runs (status, triggered_by, started_at, max_depth)
         VALUES ('RUNNING', ?1, ?2, ?3)",
        rusqlite::params![trigger.as_str(), started_at as i64, max_depth],
    )
    .map_err(|e| {
        if is_constraint_violation(&e) {
            DbError::BuildRunning
        } else {
            DbError::Sqlite(e)
        }
    })?;
    Ok(conn.last_insert_rowid())
}

/// Record how many seeders the run started from.
pub fn set_seeders_count(conn: &Connection, id: i64, seeders_count: u64) -> Result<()> {
    let changed = conn.execute(
        "UPDATE build_runs SET seeders_count = ?2 WHERE id = ?1 AND status = 'RUNNING'",
        rusqlite::params![id, seeders_count as i64],
    )?;
    expect_running(changed, id)
}

/// Move a run to `COMPLETED`.
pub fn complete(
    conn: &Connection,
    id: i64,
    nodes_count: u64,
    fetch_failures: u64,
    completed_at: u64,
) -> Result<()> {
    let changed = conn.execute(
        "UPDATE build_runs
         SET status = 'COMPLETED', nodes_count = ?2, fetch_failures = ?3, completed_at = ?4
         WHERE id = ?1 AND status = 'RUNNING'",
        rusqlite::params![id, nodes_count as i64, fetch_failures as i64, completed_at as i64],
    )?;
    expect_running(changed, id)
}

/// Move a run to `FAILED` with an error message.
pub fn fail(conn: &Connection, id: i64, error_message: &str, completed_at: u64) -> Result<()> {
    let changed = conn.execute(
        "UPDATE build_runs
         SET status = 'FAILED', error_message = ?2, completed_at = ?3
         WHERE id = ?1 AND status = 'RUNNING'",
        rusqlite::params![id, error_message, completed_at as i64],
    )?;
    expect_running(changed, id)
}

/// Fail every run left `RUNNING`, e.g. by a crashed process.
/// Returns the number of runs touched.
pub fn fail_all_running(conn: &Connection, error_message: &str, completed_at: u64) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE build_runs
         SET status = 'FAILED', error_message = ?1, completed_at = ?2
         WHERE status = 'RUNNING'",
        rusqlite::params![error_message, completed_at as i64],
    )?;
    Ok(changed)
}

fn expect_running(changed: usize, id: i64) -> Result<()> {
    if changed == 0 {
        return Err(DbError::Constraint(format!(
            "build run {id} does not exist or is no longer {}",
            BuildStatus::Running
        )));
    }
    Ok(())
}

/// Get a run by id.
pub fn get(conn: &Connection, id: i64) -> Result<BuildRun> {
    conn.query_row(
        &format!("SELECT {RUN_COLUMNS} FROM build_runs WHERE id = ?1"),
        [id],
        map_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => DbError::NotFound(format!("build run {id}")),
        other => DbError::Sqlite(other),
    })
}

/// Whether any run is `RUNNING`.
pub fn is_running(conn: &Connection) -> Result<bool> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM build_runs WHERE status = 'RUNNING'",
        [],
        |row| row.get(0),
    )?;
    Ok(n > 0)
}

/// Most recently started run.
pub fn latest(conn: &Connection) -> Result<Option<BuildRun>> {
    let run = conn
        .query_row(
            &format!("SELECT {RUN_COLUMNS} FROM build_runs ORDER BY id DESC LIMIT 1"),
            [],
            map_row,
        )
        .optional()?;
    Ok(run)
}

/// Most recent runs, newest first.
pub fn history(conn: &Connection, limit: u32) -> Result<Vec<BuildRun>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RUN_COLUMNS} FROM build_runs ORDER BY id DESC LIMIT ?1"
    ))?;
    let rows = stmt
        .query_map([limit], map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
