//! Cached graph stats.
//!
//! Stats are read on every admin page load but only change when a build
//! finishes. Entries are served for up to `ttl`; after that the next read
//! goes back to the database. Builds call [`GraphCache::refresh`] when they
//! finish, so the window only matters for changes made by other processes.

use std::time::{Duration, Instant};

use rusqlite::Connection;
use tokio::sync::RwLock;
use wot_db::queries::{build_runs, graph_nodes};
use wot_types::GraphStats;

use crate::Db;

pub struct GraphCache {
    db: Db,
    ttl: Duration,
    entry: RwLock<Option<(GraphStats, Instant)>>,
}

impl GraphCache {
    pub fn new(db: Db, ttl: Duration) -> Self {
        Self {
            db,
            ttl,
            entry: RwLock::new(None),
        }
    }

    /// Current stats, from the cache while fresh.
    pub async fn stats(&self) -> wot_db::Result<GraphStats> {
        if let Some((stats, loaded_at)) = self.entry.read().await.as_ref() {
            if loaded_at.elapsed() < self.ttl {
                return Ok(stats.clone());
            }
        }
        self.refresh().await
    }

    /// Reload stats from the database.
    pub async fn refresh(&self) -> wot_db::Result<GraphStats> {
        let stats = {
            let db = self.db.lock().await;
            load_stats(&db)?
        };
        *self.entry.write().await = Some((stats.clone(), Instant::now()));
        Ok(stats)
    }

    /// Drop the cached entry; the next read hits the database.
    pub async fn invalidate(&self) {
        *self.entry.write().await = None;
    }
}

fn load_stats(conn: &Connection) -> wot_db::Result<GraphStats> {
    Ok(GraphStats {
        total_nodes: graph_nodes::count(conn)?,
        nodes_by_depth: graph_nodes::counts_by_depth(conn)?,
        last_build: build_runs::latest(conn)?,
    })
}
