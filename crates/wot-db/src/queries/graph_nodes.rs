//! Graph node generations.
//!
//! A build writes its nodes under its own run id (`stage`), then flips the
//! `graph_state` pointer and drops the previous generation in one
//! transaction (`commit`). Readers only ever see the committed generation.

use rusqlite::{Connection, OptionalExtension};
use wot_types::{DepthCount, GraphNode, Pubkey};

use super::{build_runs, pubkey_at};
use crate::{DbError, Result};

/// Id of the committed generation, `None` before the first successful build.
pub fn current_generation(conn: &Connection) -> Result<Option<i64>> {
    let generation = conn
        .query_row(
            "SELECT current_generation FROM graph_state WHERE id = 1",
            [],
            |row| row.get::<_, Option<i64>>(0),
        )
        .optional()?
        .flatten();
    Ok(generation)
}

/// Write a new, not yet visible generation.
///
/// All rows go in under one transaction; on error nothing is left behind.
pub fn stage(conn: &Connection, generation: i64, nodes: &[GraphNode]) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO graph_nodes (generation, pubkey, depth, score) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for node in nodes {
            stmt.execute(rusqlite::params![
                generation,
                node.pubkey.as_str(),
                node.depth,
                node.score
            ])?;
        }
    }
    tx.commit()?;
    tracing::debug!(generation, nodes = nodes.len(), "staged graph generation");
    Ok(())
}

/// Make a staged generation current and mark its build run `COMPLETED`.
///
/// The pointer flip, the deletion of every other generation and the run
/// status change happen in one transaction. Returns the committed node count.
pub fn commit(
    conn: &Connection,
    generation: i64,
    fetch_failures: u64,
    completed_at: u64,
) -> Result<u64> {
    let tx = conn.unchecked_transaction()?;
    let nodes_count: i64 = tx.query_row(
        "SELECT COUNT(*) FROM graph_nodes WHERE generation = ?1",
        [generation],
        |row| row.get(0),
    )?;
    build_runs::complete(&tx, generation, nodes_count as u64, fetch_failures, completed_at)?;

    let changed = tx.execute(
        "UPDATE graph_state SET current_generation = ?1, swapped_at = ?2 WHERE id = 1",
        rusqlite::params![generation, completed_at as i64],
    )?;
    if changed == 0 {
        return Err(DbError::NotFound("graph_state row".into()));
    }
    let removed = tx.execute(
        "DELETE FROM graph_nodes WHERE generation != ?1",
        [generation],
    )?;
    tx.commit()?;
    tracing::debug!(generation, nodes_count, removed, "committed graph generation");
    Ok(nodes_count as u64)
}

/// Drop a staged generation that will never be committed.
///
/// Refuses to touch the committed generation.
pub fn discard(conn: &Connection, generation: i64) -> Result<usize> {
    if current_generation(conn)? == Some(generation) {
        return Err(DbError::Constraint(format!(
            "generation {generation} is committed"
        )));
    }
    let removed = conn.execute("DELETE FROM graph_nodes WHERE generation = ?1", [generation])?;
    Ok(removed)
}

/// Look up one key in the committed generation.
pub fn get(conn: &Connection, pubkey: &Pubkey) -> Result<Option<GraphNode>> {
    let node = conn
        .query_row(
            "SELECT n.pubkey, n.depth, n.score
             FROM graph_nodes n
             JOIN graph_state s ON s.id = 1 AND n.generation = s.current_generation
             WHERE n.pubkey = ?1",
            [pubkey.as_str()],
            map_row,
        )
        .optional()?;
    Ok(node)
}

/// Page through the committed generation ordered by depth then pubkey.
pub fn list(conn: &Connection, limit: u32, offset: u32) -> Result<Vec<GraphNode>> {
    let mut stmt = conn.prepare(
        "SELECT n.pubkey, n.depth, n.score
         FROM graph_nodes n
         JOIN graph_state s ON s.id = 1 AND n.generation = s.current_generation
         ORDER BY n.depth, n.pubkey
         LIMIT ?1 OFFSET ?2",
    )?;
    let rows = stmt
        .query_map([limit, offset], map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Number of nodes in the committed generation.
pub fn count(conn: &Connection) -> Result<u64> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*)
         FROM graph_nodes n
         JOIN graph_state s ON s.id = 1 AND n.generation = s.current_generation",
        [],
        |row| row.get(0),
    )?;
    Ok(n as u64)
}

/// Node counts per depth in the committed generation, shallowest first.
pub fn counts_by_depth(conn: &Connection) -> Result<Vec<DepthCount>> {
    let mut stmt = conn.prepare(
        "SELECT n.depth, COUNT(*)
         FROM graph_nodes n
         JOIN graph_state s ON s.id = 1 AND n.generation = s.current_generation
         GROUP BY n.depth
         ORDER BY n.depth",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(DepthCount {
                depth: row.get(0)?,
                count: row.get::<_, i64>(1)? as u64,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<GraphNode> {
    Ok(GraphNode {
        pubkey: pubkey_at(row, 0)?,
        depth: row.get(1)?,
        score: row.get(2)?,
    })
}
