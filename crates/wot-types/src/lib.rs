//! # wot-types
//!
//! Shared domain types for the web-of-trust graph service.
//! Everything the admin dashboard receives over HTTP is defined here and
//! exported to TypeScript through `ts-rs`.

pub mod build;
pub mod graph;
pub mod pubkey;
pub mod seeder;

pub use build::{BuildOutcome, BuildRun, BuildStatus, BuildTrigger};
pub use graph::{DepthCount, GraphNode, GraphStats, ScoreTable, ScoreTableError};
pub use pubkey::{Pubkey, PubkeyError};
pub use seeder::{Seeder, SeederUpdate};

/// Length of a hex-encoded Nostr public key.
pub const PUBKEY_HEX_LEN: usize = 64;

/// Default maximum BFS depth from the seeders.
pub const DEFAULT_MAX_DEPTH: u32 = 2;

/// Default per-depth trust scores (depth 0, 1, 2).
pub const DEFAULT_SCORES: [f64; 3] = [1.0, 0.4, 0.1];

/// Default number of in-flight follow fetches per layer.
pub const DEFAULT_FETCH_CONCURRENCY: usize = 16;

/// Default timeout for a single follow fetch in milliseconds.
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 5_000;

/// Current Unix time in seconds.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_default_scores_cover_default_depth() {
        assert_eq!(
            super::DEFAULT_SCORES.len(),
            super::DEFAULT_MAX_DEPTH as usize + 1
        );
    }

    #[test]
    #[ignore] // Run manually to generate bindings
    fn export_ts_bindings() {
        use ts_rs::TS;
        let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../bindings");
        std::fs::create_dir_all(&dir).expect("create bindings dir");
        crate::seeder::Seeder::export_all_to(&dir).expect("export Seeder");
        crate::graph::GraphStats::export_all_to(&dir).expect("export GraphStats");
        crate::graph::GraphNode::export_all_to(&dir).expect("export GraphNode");
        crate::build::BuildOutcome::export_all_to(&dir).expect("export BuildOutcome");
    }
}
