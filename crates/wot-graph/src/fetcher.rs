//! Follow-list sources.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use wot_types::Pubkey;

use crate::FetchError;

/// Source of outgoing follow edges.
///
/// An empty set means the key follows nobody (or nothing was found) and is
/// not an error. Calls are independent and may run concurrently.
pub trait FollowFetcher: Send + Sync {
    /// Keys followed by `pubkey`. Implementations should give up after
    /// `timeout`; the propagator enforces it as well.
    fn fetch_follows<'a>(
        &'a self,
        pubkey: &'a Pubkey,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<HashSet<Pubkey>, FetchError>>;

    /// Pick up changes in the underlying source before a build.
    /// Sources without external state have nothing to do.
    fn refresh(&self) -> BoxFuture<'_, Result<(), FetchError>> {
        async { Ok(()) }.boxed()
    }
}

/// In-memory follow graph.
///
/// Unknown keys follow nobody. Individual keys can be made to fail or to
/// respond slowly, and every call is counted.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    follows: HashMap<Pubkey, HashSet<Pubkey>>,
    failing: HashSet<Pubkey>,
    delays: HashMap<Pubkey, Duration>,
    base_delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directed edge `from -> to`.
    pub fn add_follow(&mut self, from: Pubkey, to: Pubkey) {
        self.follows.entry(from).or_default().insert(to);
    }

    /// Make lookups for `pubkey` fail.
    pub fn fail_for(&mut self, pubkey: Pubkey) {
        self.failing.insert(pubkey);
    }

    /// Delay lookups for `pubkey`.
    pub fn delay_for(&mut self, pubkey: Pubkey, delay: Duration) {
        self.delays.insert(pubkey, delay);
    }

    /// Delay every lookup by at least `delay`.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Total number of lookups served.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of lookups observed in flight at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

impl FollowFetcher for StaticFetcher {
    fn fetch_follows<'a>(
        &'a self,
        pubkey: &'a Pubkey,
        _timeout: Duration,
    ) -> BoxFuture<'a, Result<HashSet<Pubkey>, FetchError>> {
        async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let _guard = InFlight::enter(&self.in_flight, &self.peak_in_flight);

            let delay = self.delays.get(pubkey).copied().unwrap_or(self.base_delay);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            if self.failing.contains(pubkey) {
                return Err(FetchError::Failure(format!("no relay answered for {pubkey}")));
            }
            Ok(self.follows.get(pubkey).cloned().unwrap_or_default())
        }
        .boxed()
    }
}

/// Tracks one in-flight lookup; released on drop so cancelled calls count too.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(in_flight: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self(in_flight)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
