//! Graph build lifecycle.
//!
//! A build moves through `RUNNING -> COMPLETED | FAILED` and is persisted as
//! a `build_runs` row. Only one build runs at a time: the in-process lock
//! rejects concurrent triggers without queueing them, and the partial unique
//! index on running runs rejects a second `RUNNING` row from any other
//! process sharing the database.
//!
//! New nodes are staged under the run id and swapped in on success, so
//! readers keep seeing the previous graph until the very end and a failed
//! build leaves it untouched.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use wot_db::queries::{build_runs, graph_nodes, seeders};
use wot_db::DbError;
use wot_graph::{propagate, FollowFetcher, GraphError, PropagationConfig};
use wot_types::{unix_now, BuildOutcome, BuildRun, BuildTrigger, GraphNode, GraphStats, Pubkey};

use crate::{Db, GraphCache};

/// Message stored on runs found `RUNNING` at startup.
pub const INTERRUPTED_MESSAGE: &str = "interrupted by restart";

/// A build was requested while another one is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("a graph build is already running")]
pub struct BuildConflict;

/// Why a started build failed.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("database error: {0}")]
    Db(#[from] DbError),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Runs graph builds and serves reads of the committed graph.
pub struct BuildManager {
    db: Db,
    fetcher: Arc<dyn FollowFetcher>,
    config: PropagationConfig,
    lock: Mutex<()>,
    cache: GraphCache,
}

impl BuildManager {
    pub fn new(
        db: Db,
        fetcher: Arc<dyn FollowFetcher>,
        config: PropagationConfig,
        cache: GraphCache,
    ) -> Self {
        Self {
            db,
            fetcher,
            config,
            lock: Mutex::new(()),
            cache,
        }
    }

    /// Whether a `RUNNING` run exists in the database.
    pub async fn is_build_running(&self) -> wot_db::Result<bool> {
        let db = self.db.lock().await;
        build_runs::is_running(&db)
    }

    /// Run one build to completion.
    ///
    /// Returns `Err(BuildConflict)` without touching the database when a
    /// build is already running. Every other failure is recorded on the run
    /// and reported as an unsuccessful [`BuildOutcome`].
    pub async fn build_community_graph(
        &self,
        trigger: BuildTrigger,
    ) -> Result<BuildOutcome, BuildConflict> {
        let _guard = self.lock.try_lock().map_err(|_| BuildConflict)?;

        let run_id = {
            let db = self.db.lock().await;
            match build_runs::is_running(&db) {
                Ok(true) => return Err(BuildConflict),
                Ok(false) => {}
                Err(e) => {
                    error!(error = %e, "could not check build state");
                    return Ok(BuildOutcome::failed(None, e.to_string()));
                }
            }
            match build_runs::start(&db, trigger, self.config.max_depth, unix_now()) {
                Ok(id) => id,
                Err(DbError::BuildRunning) => return Err(BuildConflict),
                Err(e) => {
                    error!(error = %e, "could not record build start");
                    return Ok(BuildOutcome::failed(None, e.to_string()));
                }
            }
        };
        self.cache.invalidate().await;
        info!(run_id, %trigger, max_depth = self.config.max_depth, "graph build started");

        let started = Instant::now();
        let outcome = match self.execute(run_id).await {
            Ok(nodes_count) => {
                info!(
                    run_id,
                    nodes_count,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "graph build completed"
                );
                BuildOutcome::completed(run_id, nodes_count)
            }
            Err(e) => {
                let message = e.to_string();
                error!(run_id, error = %message, "graph build failed");
                self.record_failure(run_id, &message).await;
                BuildOutcome::failed(Some(run_id), message)
            }
        };

        if let Err(e) = self.cache.refresh().await {
            warn!(error = %e, "graph stats refresh failed");
        }
        Ok(outcome)
    }

    /// Run a build on its own task so that it finishes even if the caller
    /// goes away.
    pub fn spawn_build(
        self: &Arc<Self>,
        trigger: BuildTrigger,
    ) -> JoinHandle<Result<BuildOutcome, BuildConflict>> {
        let manager = Arc::clone(self);
        tokio::spawn(async move { manager.build_community_graph(trigger).await })
    }

    /// Mark `run_id` failed. One retry, then any `RUNNING` row is failed so
    /// the next trigger is not rejected.
    async fn record_failure(&self, run_id: i64, message: &str) {
        let db = self.db.lock().await;
        let Err(first) = build_runs::fail(&db, run_id, message, unix_now()) else {
            return;
        };
        warn!(run_id, error = %first, "could not mark build run failed, retrying");
        let Err(second) = build_runs::fail(&db, run_id, message, unix_now()) else {
            return;
        };
        error!(run_id, error = %second, "retry failed, failing all running runs");
        match build_runs::fail_all_running(&db, message, unix_now()) {
            Ok(changed) => debug!(run_id, changed, "failed running runs"),
            Err(e) => error!(run_id, error = %e, "build run left RUNNING"),
        }
    }

    async fn execute(&self, run_id: i64) -> Result<u64, BuildError> {
        if let Err(e) = self.fetcher.refresh().await {
            warn!(run_id, error = %e, "follow source refresh failed, using previous data");
        }

        let seeders: Vec<Pubkey> = {
            let db = self.db.lock().await;
            let seeders = seeders::list(&db, None)?;
            build_runs::set_seeders_count(&db, run_id, seeders.len() as u64)?;
            seeders.into_iter().map(|s| s.pubkey).collect()
        };
        debug!(run_id, seeders = seeders.len(), "loaded seeders");

        let propagation = propagate(self.fetcher.as_ref(), &seeders, &self.config).await?;
        if propagation.fetch_failures > 0 {
            warn!(
                run_id,
                failures = propagation.fetch_failures,
                fetches = propagation.fetches,
                "some follow lists could not be fetched"
            );
        }

        let db = self.db.lock().await;
        graph_nodes::stage(&db, run_id, &propagation.nodes)?;
        match graph_nodes::commit(&db, run_id, propagation.fetch_failures, unix_now()) {
            Ok(nodes_count) => Ok(nodes_count),
            Err(e) => {
                if let Err(discard_err) = graph_nodes::discard(&db, run_id) {
                    warn!(run_id, error = %discard_err, "could not discard staged nodes");
                }
                Err(e.into())
            }
        }
    }

    /// Stats of the committed graph plus the latest run.
    pub async fn get_graph_stats(&self) -> wot_db::Result<GraphStats> {
        self.cache.stats().await
    }

    /// Most recent runs, newest first.
    pub async fn get_build_history(&self, limit: u32) -> wot_db::Result<Vec<BuildRun>> {
        let db = self.db.lock().await;
        build_runs::history(&db, limit)
    }

    /// Trust entry for `pubkey` in the committed graph.
    pub async fn get_trust(&self, pubkey: &Pubkey) -> wot_db::Result<Option<GraphNode>> {
        let db = self.db.lock().await;
        graph_nodes::get(&db, pubkey)
    }

    /// Fail runs left `RUNNING` by a previous process.
    pub async fn recover_stale_runs(&self) -> wot_db::Result<usize> {
        let recovered = {
            let db = self.db.lock().await;
            build_runs::fail_all_running(&db, INTERRUPTED_MESSAGE, unix_now())?
        };
        if recovered > 0 {
            warn!(recovered, "marked interrupted build runs as failed");
            self.cache.invalidate().await;
        }
        Ok(recovered)
    }
}
