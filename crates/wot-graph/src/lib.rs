//! # wot-graph
//!
//! Web-of-trust propagation over the Nostr follow graph.
//!
//! Trust starts at a set of curated seeder keys and spreads outward along
//! follow edges, one breadth-first layer at a time. A key's score depends
//! only on its shortest distance from any seeder.
//!
//! ## Modules
//!
//! - [`fetcher`]: the follow-list source contract and an in-memory source.
//! - [`nip02`]: NIP-02 contact-list parsing and a snapshot-file source.
//! - [`propagate`]: the layered BFS with bounded fetch concurrency.

use std::time::Duration;

pub mod fetcher;
pub mod nip02;
pub mod propagate;

pub use fetcher::{FollowFetcher, StaticFetcher};
pub use nip02::{parse_contact_list, ContactListEvent, SnapshotFetcher};
pub use propagate::{propagate, Propagation, PropagationConfig};

/// A failed follow-list lookup for a single key.
///
/// These never abort a build on their own; the propagator counts them and
/// moves on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// No answer within the per-call timeout.
    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),

    /// The source reported an error.
    #[error("fetch failed: {0}")]
    Failure(String),
}

/// Error types for graph construction.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Every fetch in a non-empty layer failed.
    #[error("all {failed} follow fetches failed at depth {depth}: {last_error}")]
    FrontierUnreachable {
        depth: u32,
        failed: usize,
        last_error: FetchError,
    },

    /// Propagation parameters are unusable.
    #[error("invalid propagation config: {0}")]
    InvalidConfig(String),

    /// A follow snapshot could not be parsed.
    #[error("snapshot error: {0}")]
    Snapshot(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type for graph operations.
pub type Result<T> = std::result::Result<T, GraphError>;
