//! Layered breadth-first trust propagation.
//!
//! ## Algorithm
//!
//! 1. Every seeder is placed at depth 0 and forms the first frontier.
//! 2. For each frontier below the maximum depth, the follow lists of all
//!    frontier keys are fetched with at most `concurrency` lookups in
//!    flight. The whole layer finishes before the next one starts.
//! 3. A followed key not yet seen is recorded at `depth + 1` and joins the
//!    next frontier. Keys are inserted once, so a key's depth is its
//!    shortest distance from any seeder.
//! 4. Each recorded key is scored from the depth table.
//!
//! The frontier at the maximum depth is never expanded: anything it follows
//! would land past the table and be dropped anyway.
//!
//! Per-key fetch errors and timeouts count as "follows nobody". Only a
//! layer in which every lookup fails aborts the run.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use wot_types::{
    DepthCount, GraphNode, Pubkey, ScoreTable, DEFAULT_FETCH_CONCURRENCY,
    DEFAULT_FETCH_TIMEOUT_MS, DEFAULT_MAX_DEPTH,
};

use crate::{FetchError, FollowFetcher, GraphError, Result};

/// Parameters for a propagation run.
#[derive(Clone, Debug)]
pub struct PropagationConfig {
    /// Deepest layer kept in the output.
    pub max_depth: u32,
    /// Depth→score table. Must cover `max_depth`.
    pub scores: ScoreTable,
    /// Follow lookups allowed in flight at once.
    pub concurrency: usize,
    /// Timeout applied to each lookup.
    pub fetch_timeout: Duration,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            scores: ScoreTable::default(),
            concurrency: DEFAULT_FETCH_CONCURRENCY,
            fetch_timeout: Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS),
        }
    }
}

impl PropagationConfig {
    /// Check that the parameters can drive a run.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(GraphError::InvalidConfig(
                "concurrency must be at least 1".into(),
            ));
        }
        if self.scores.max_depth() < self.max_depth {
            return Err(GraphError::InvalidConfig(format!(
                "score table covers depth {} but max_depth is {}",
                self.scores.max_depth(),
                self.max_depth
            )));
        }
        if self.fetch_timeout.is_zero() {
            return Err(GraphError::InvalidConfig(
                "fetch timeout must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Output of a propagation run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Propagation {
    /// Every retained key, ordered by depth then pubkey.
    pub nodes: Vec<GraphNode>,
    /// Node count per depth, shallowest first. Empty layers are omitted.
    pub depth_counts: Vec<DepthCount>,
    /// Lookups issued.
    pub fetches: u64,
    /// Lookups that failed or timed out.
    pub fetch_failures: u64,
}

/// Propagate trust from `seeders` through the follow graph.
pub async fn propagate<F>(
    fetcher: &F,
    seeders: &[Pubkey],
    config: &PropagationConfig,
) -> Result<Propagation>
where
    F: FollowFetcher + ?Sized,
{
    config.validate()?;
    let scores = config.scores.truncated(config.max_depth);
    let semaphore = Arc::new(Semaphore::new(config.concurrency));

    let mut visited: HashMap<Pubkey, u32> = HashMap::new();
    let mut frontier: Vec<Pubkey> = Vec::new();
    for seeder in seeders {
        if visited.insert(seeder.clone(), 0).is_none() {
            frontier.push(seeder.clone());
        }
    }

    let mut fetches = 0u64;
    let mut fetch_failures = 0u64;
    let mut depth = 0u32;

    while !frontier.is_empty() && depth < config.max_depth {
        debug!(depth, frontier = frontier.len(), "expanding layer");

        let results = fetch_layer(fetcher, &frontier, &semaphore, config.fetch_timeout).await;
        fetches += frontier.len() as u64;

        let mut failed = 0usize;
        let mut last_error = None;
        let mut next = Vec::new();

        // Results are in frontier order so the next frontier is stable.
        for (pubkey, result) in frontier.iter().zip(results) {
            let follows = match result {
                Ok(follows) => follows,
                Err(e) => {
                    warn!(%pubkey, depth, error = %e, "follow fetch failed, treating as no follows");
                    failed += 1;
                    last_error = Some(e);
                    continue;
                }
            };

            let mut follows: Vec<Pubkey> = follows.into_iter().collect();
            follows.sort();
            for followed in follows {
                if !visited.contains_key(&followed) {
                    visited.insert(followed.clone(), depth + 1);
                    next.push(followed);
                }
            }
        }

        fetch_failures += failed as u64;
        if failed == frontier.len() {
            if let Some(last_error) = last_error {
                return Err(GraphError::FrontierUnreachable {
                    depth,
                    failed,
                    last_error,
                });
            }
        }

        debug!(depth, discovered = next.len(), failed, "layer complete");
        frontier = next;
        depth += 1;
    }

    let mut nodes: Vec<GraphNode> = visited
        .into_iter()
        .filter_map(|(pubkey, depth)| {
            scores
                .score_for(depth)
                .map(|score| GraphNode { pubkey, depth, score })
        })
        .collect();
    nodes.sort_by(|a, b| a.depth.cmp(&b.depth).then_with(|| a.pubkey.cmp(&b.pubkey)));

    let depth_counts = count_by_depth(&nodes);

    info!(
        seeders = seeders.len(),
        nodes = nodes.len(),
        fetches,
        fetch_failures,
        "propagation finished"
    );

    Ok(Propagation {
        nodes,
        depth_counts,
        fetches,
        fetch_failures,
    })
}

/// Fetch follow sets for one layer, returned in frontier order.
async fn fetch_layer<F>(
    fetcher: &F,
    frontier: &[Pubkey],
    semaphore: &Arc<Semaphore>,
    timeout: Duration,
) -> Vec<std::result::Result<HashSet<Pubkey>, FetchError>>
where
    F: FollowFetcher + ?Sized,
{
    let mut futs = FuturesUnordered::new();
    for (idx, pubkey) in frontier.iter().enumerate() {
        let sem = Arc::clone(semaphore);
        futs.push(async move {
            let result = match sem.acquire_owned().await {
                Ok(_permit) => {
                    match tokio::time::timeout(timeout, fetcher.fetch_follows(pubkey, timeout))
                        .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(FetchError::Timeout(timeout)),
                    }
                }
                Err(_) => Err(FetchError::Failure("fetch semaphore closed".into())),
            };
            (idx, result)
        });
    }

    let mut results: Vec<Option<std::result::Result<HashSet<Pubkey>, FetchError>>> =
        (0..frontier.len()).map(|_| None).collect();
    while let Some((idx, result)) = futs.next().await {
        results[idx] = Some(result);
    }

    results
        .into_iter()
        .map(|r| r.unwrap_or_else(|| Err(FetchError::Failure("lookup did not complete".into()))))
        .collect()
}

fn count_by_depth(nodes: &[GraphNode]) -> Vec<DepthCount> {
    let mut counts: Vec<DepthCount> = Vec::new();
    for node in nodes {
        match counts.last_mut() {
            Some(last) if last.depth == node.depth => last.count += 1,
            _ => counts.push(DepthCount {
                depth: node.depth,
                count: 1,
            }),
        }
    }
    counts
}
