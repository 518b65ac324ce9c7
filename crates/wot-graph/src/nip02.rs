//! NIP-02 contact lists.
//!
//! A contact list is a kind-3 event whose `p` tags name the followed keys:
//!
//! ```json
//! {"pubkey": "<hex>", "kind": 3, "created_at": 1700000000,
//!  "tags": [["p", "<hex>", "wss://relay.example", "alice"]], ...}
//! ```
//!
//! [`SnapshotFetcher`] serves follow sets from a file of such events, either
//! a JSON array or one event per line. Signatures are not checked.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info};
use wot_types::Pubkey;

use crate::{FetchError, FollowFetcher, GraphError, Result};

/// Event kind of a NIP-02 contact list.
pub const CONTACT_LIST_KIND: u32 = 3;

/// The fields of a Nostr event that matter for follow extraction.
#[derive(Clone, Debug, Deserialize)]
pub struct ContactListEvent {
    pub pubkey: String,
    pub kind: u32,
    pub created_at: u64,
    #[serde(default)]
    pub tags: Vec<Vec<String>>,
}

/// Followed keys named by an event's `p` tags.
///
/// Returns an empty set for events that are not contact lists. Malformed
/// tags and self-follows are skipped.
pub fn parse_contact_list(event: &ContactListEvent) -> HashSet<Pubkey> {
    if event.kind != CONTACT_LIST_KIND {
        return HashSet::new();
    }
    event
        .tags
        .iter()
        .filter(|tag| tag.first().map(String::as_str) == Some("p"))
        .filter_map(|tag| tag.get(1))
        .filter(|hex| **hex != event.pubkey)
        .filter_map(|hex| Pubkey::parse(hex).ok())
        .collect()
}

/// Parse a snapshot body into per-author follow sets.
///
/// For each author the newest contact list wins, as relays do for
/// replaceable events.
pub fn parse_snapshot(body: &str) -> Result<HashMap<Pubkey, HashSet<Pubkey>>> {
    let events: Vec<ContactListEvent> = if body.trim_start().starts_with('[') {
        serde_json::from_str(body).map_err(|e| GraphError::Snapshot(e.to_string()))?
    } else {
        body.lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| {
                serde_json::from_str(line)
                    .map_err(|e| GraphError::Snapshot(format!("line {}: {e}", n + 1)))
            })
            .collect::<Result<Vec<_>>>()?
    };

    let mut newest: HashMap<Pubkey, ContactListEvent> = HashMap::new();
    for event in events {
        if event.kind != CONTACT_LIST_KIND {
            continue;
        }
        let Ok(author) = Pubkey::parse(&event.pubkey) else {
            debug!(pubkey = %event.pubkey, "skipping contact list with malformed author");
            continue;
        };
        match newest.get(&author) {
            Some(existing) if existing.created_at >= event.created_at => {}
            _ => {
                newest.insert(author, event);
            }
        }
    }

    Ok(newest
        .into_iter()
        .map(|(author, event)| (author, parse_contact_list(&event)))
        .collect())
}

/// Follow source backed by a snapshot file of contact-list events.
pub struct SnapshotFetcher {
    path: PathBuf,
    follows: RwLock<HashMap<Pubkey, HashSet<Pubkey>>>,
}

impl SnapshotFetcher {
    /// Load a snapshot file.
    pub async fn load(path: &Path) -> Result<Self> {
        let follows = read_snapshot(path).await?;
        Ok(Self {
            path: path.to_path_buf(),
            follows: RwLock::new(follows),
        })
    }

    /// Re-read the snapshot file. On error the previous data is kept.
    /// Returns the number of authors loaded.
    pub async fn reload(&self) -> Result<usize> {
        let follows = read_snapshot(&self.path).await?;
        let authors = follows.len();
        *self.follows.write().await = follows;
        Ok(authors)
    }

    /// Number of authors with a contact list.
    pub async fn authors(&self) -> usize {
        self.follows.read().await.len()
    }
}

async fn read_snapshot(path: &Path) -> Result<HashMap<Pubkey, HashSet<Pubkey>>> {
    let body = tokio::fs::read_to_string(path).await?;
    let follows = parse_snapshot(&body)?;
    info!(path = %path.display(), authors = follows.len(), "loaded follow snapshot");
    Ok(follows)
}

impl FollowFetcher for SnapshotFetcher {
    fn fetch_follows<'a>(
        &'a self,
        pubkey: &'a Pubkey,
        _timeout: Duration,
    ) -> BoxFuture<'a, std::result::Result<HashSet<Pubkey>, FetchError>> {
        async move {
            Ok(self
                .follows
                .read()
                .await
                .get(pubkey)
                .cloned()
                .unwrap_or_default())
        }
        .boxed()
    }

    /// Re-reads the snapshot file. A broken file keeps the previous data.
    fn refresh(&self) -> BoxFuture<'_, std::result::Result<(), FetchError>> {
        async move {
            self.reload()
                .await
                .map(|_| ())
                .map_err(|e| FetchError::Failure(format!("snapshot reload: {e}")))
        }
        .boxed()
    }
}
