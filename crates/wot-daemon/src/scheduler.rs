//! Periodic graph rebuilds.
//!
//! Optional: external cron jobs can use `POST /api/cron/rebuild-graph`
//! instead. The first tick fires one full interval after startup.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use wot_types::BuildTrigger;

use crate::{BuildConflict, BuildManager};

/// Trigger a scheduled build every `every` until `shutdown` fires.
pub async fn run(
    builds: Arc<BuildManager>,
    every: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(interval_secs = every.as_secs(), "rebuild scheduler started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match builds.build_community_graph(BuildTrigger::Schedule).await {
                    Ok(outcome) if outcome.success => {
                        debug!(nodes = outcome.nodes_count, "scheduled rebuild done");
                    }
                    Ok(outcome) => {
                        warn!(error = ?outcome.error, "scheduled rebuild failed");
                    }
                    Err(BuildConflict) => {
                        debug!("build already running, skipping scheduled rebuild");
                    }
                }
            }
            _ = shutdown.recv() => {
                info!("rebuild scheduler stopped");
                break;
            }
        }
    }
}
