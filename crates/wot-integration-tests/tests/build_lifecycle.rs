//! Integration test: graph builds against an on-disk database.
//!
//! Exercises the registry -> propagation -> generation swap pipeline:
//! 1. Register seeders through the registry
//! 2. Serve follows from a NIP-02 snapshot file
//! 3. Build, read back stats and trust entries
//! 4. Tolerate partial fetch failures, fail on total ones
//! 5. Recover runs left RUNNING by a crashed process

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use wot_daemon::{BuildManager, Db, GraphCache, SeederRegistry};
use wot_db::queries::build_runs;
use wot_graph::{FollowFetcher, PropagationConfig, SnapshotFetcher, StaticFetcher};
use wot_types::{BuildStatus, BuildTrigger, Pubkey};

/// Admin key used as `added_by`.
const ADMIN: u8 = 0xAD;

fn key(byte: u8) -> Pubkey {
    Pubkey::from_bytes(&[byte; 32])
}

fn open_db(path: &Path) -> Db {
    Arc::new(tokio::sync::Mutex::new(
        wot_db::open(path).expect("open db"),
    ))
}

fn manager(db: &Db, fetcher: Arc<dyn FollowFetcher>) -> BuildManager {
    BuildManager::new(
        db.clone(),
        fetcher,
        PropagationConfig::default(),
        GraphCache::new(db.clone(), Duration::from_secs(60)),
    )
}

async fn register(registry: &SeederRegistry, byte: u8, region: &str) {
    registry
        .create(&key(byte).to_string(), region, None, &key(ADMIN).to_string())
        .await
        .expect("register seeder");
}

fn contact_list(author: u8, created_at: u64, follows: &[u8]) -> serde_json::Value {
    let tags: Vec<Vec<String>> = follows
        .iter()
        .map(|b| vec!["p".to_string(), key(*b).to_string()])
        .collect();
    serde_json::json!({
        "id": format!("{author:02x}{created_at}"),
        "pubkey": key(author).to_string(),
        "kind": 3,
        "created_at": created_at,
        "tags": tags,
        "content": "",
        "sig": "",
    })
}

#[tokio::test]
async fn snapshot_build_scores_by_shortest_depth() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = open_db(&dir.path().join("wot.db"));

    // A -> {B, C}, B -> {D}, D -> {A}. An older list for A is superseded.
    let (a, b, c, d) = (1, 2, 3, 4);
    let snapshot = dir.path().join("follows.json");
    let events = vec![
        contact_list(a, 100, &[d]),
        contact_list(a, 200, &[b, c]),
        contact_list(b, 200, &[d]),
        contact_list(d, 200, &[a]),
    ];
    std::fs::write(
        &snapshot,
        serde_json::to_string(&events).expect("serialize"),
    )
    .expect("write snapshot");

    let fetcher = SnapshotFetcher::load(&snapshot).await.expect("load snapshot");
    let registry = SeederRegistry::new(db.clone());
    register(&registry, a, "europe").await;
    let builds = manager(&db, Arc::new(fetcher));

    let outcome = builds
        .build_community_graph(BuildTrigger::Admin)
        .await
        .expect("no conflict");
    assert!(outcome.success, "build failed: {:?}", outcome.error);
    assert_eq!(outcome.nodes_count, 4);

    let expected = [(a, 0, 1.0), (b, 1, 0.4), (c, 1, 0.4), (d, 2, 0.1)];
    for (byte, depth, score) in expected {
        let node = builds
            .get_trust(&key(byte))
            .await
            .expect("trust lookup")
            .expect("node present");
        assert_eq!(node.depth, depth, "depth of {byte}");
        assert!((node.score - score).abs() < f64::EPSILON, "score of {byte}");
    }

    let stats = builds.get_graph_stats().await.expect("stats");
    let by_depth: Vec<(u32, u64)> = stats
        .nodes_by_depth
        .iter()
        .map(|dc| (dc.depth, dc.count))
        .collect();
    assert_eq!(by_depth, vec![(0, 1), (1, 2), (2, 1)]);
    let run = stats.last_build.expect("last build");
    assert_eq!(run.status, BuildStatus::Completed);
    assert_eq!(run.seeders_count, Some(1));
    assert_eq!(run.fetch_failures, Some(0));
}

#[tokio::test]
async fn rebuild_picks_up_rewritten_snapshot() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = open_db(&dir.path().join("wot.db"));
    let snapshot = dir.path().join("follows.json");
    let write = |events: Vec<serde_json::Value>| {
        std::fs::write(&snapshot, serde_json::to_string(&events).expect("serialize"))
            .expect("write snapshot");
    };

    write(vec![contact_list(1, 100, &[2])]);
    let fetcher = SnapshotFetcher::load(&snapshot).await.expect("load snapshot");
    let registry = SeederRegistry::new(db.clone());
    register(&registry, 1, "europe").await;
    let builds = manager(&db, Arc::new(fetcher));

    builds
        .build_community_graph(BuildTrigger::Admin)
        .await
        .expect("no conflict");
    assert!(builds.get_trust(&key(2)).await.expect("trust").is_some());

    // Same process, newer contact list on disk.
    write(vec![contact_list(1, 100, &[2]), contact_list(1, 200, &[3])]);
    let outcome = builds
        .build_community_graph(BuildTrigger::Cron)
        .await
        .expect("no conflict");
    assert!(outcome.success, "build failed: {:?}", outcome.error);
    assert_eq!(outcome.nodes_count, 2);

    let node = builds.get_trust(&key(3)).await.expect("trust").expect("node");
    assert_eq!(node.depth, 1);
    assert!(builds.get_trust(&key(2)).await.expect("trust").is_none());
}

#[tokio::test]
async fn one_failed_fetch_of_fifty_still_completes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = open_db(&dir.path().join("wot.db"));
    let registry = SeederRegistry::new(db.clone());

    let mut fetcher = StaticFetcher::new();
    for byte in 1..=50u8 {
        register(&registry, byte, "latam").await;
        fetcher.add_follow(key(byte), key(byte + 100));
    }
    fetcher.fail_for(key(17));
    let builds = manager(&db, Arc::new(fetcher));

    let outcome = builds
        .build_community_graph(BuildTrigger::Cron)
        .await
        .expect("no conflict");
    assert!(outcome.success);
    // 50 seeders plus the 49 keys reachable through working lookups.
    assert_eq!(outcome.nodes_count, 99);
    assert!(builds.get_trust(&key(117)).await.expect("trust").is_none());

    let history = builds.get_build_history(1).await.expect("history");
    assert_eq!(history[0].status, BuildStatus::Completed);
    assert_eq!(history[0].fetch_failures, Some(1));
}

#[tokio::test]
async fn empty_registry_builds_empty_graph() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = open_db(&dir.path().join("wot.db"));
    let builds = manager(&db, Arc::new(StaticFetcher::new()));

    let outcome = builds
        .build_community_graph(BuildTrigger::Admin)
        .await
        .expect("no conflict");
    assert!(outcome.success);
    assert_eq!(outcome.nodes_count, 0);
    assert_eq!(builds.get_graph_stats().await.expect("stats").total_nodes, 0);
}

#[tokio::test]
async fn graph_survives_reopen_and_failed_rebuild() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("wot.db");

    {
        let db = open_db(&db_path);
        let registry = SeederRegistry::new(db.clone());
        register(&registry, 1, "europe").await;
        let mut fetcher = StaticFetcher::new();
        fetcher.add_follow(key(1), key(2));
        let builds = manager(&db, Arc::new(fetcher));
        let outcome = builds
            .build_community_graph(BuildTrigger::Admin)
            .await
            .expect("no conflict");
        assert_eq!(outcome.nodes_count, 2);
    }

    // Same database, but now every lookup of the only seeder fails.
    let db = open_db(&db_path);
    let mut fetcher = StaticFetcher::new();
    fetcher.fail_for(key(1));
    let builds = manager(&db, Arc::new(fetcher));
    assert_eq!(builds.get_graph_stats().await.expect("stats").total_nodes, 2);

    let outcome = builds
        .build_community_graph(BuildTrigger::Admin)
        .await
        .expect("no conflict");
    assert!(!outcome.success);

    let history = builds.get_build_history(10).await.expect("history");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].status, BuildStatus::Failed);
    assert_eq!(history[1].status, BuildStatus::Completed);
    assert!(!builds.is_build_running().await.expect("running"));

    let node = builds.get_trust(&key(2)).await.expect("trust").expect("node");
    assert_eq!(node.depth, 1);
}

#[tokio::test]
async fn stale_run_from_crashed_process_is_recovered() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("wot.db");

    {
        // A process that died mid-build.
        let conn = wot_db::open(&db_path).expect("open db");
        build_runs::start(&conn, BuildTrigger::Schedule, 2, 1_700_000_000).expect("start");
    }

    let db = open_db(&db_path);
    let builds = manager(&db, Arc::new(StaticFetcher::new()));
    assert!(builds.is_build_running().await.expect("running"));
    assert!(builds
        .build_community_graph(BuildTrigger::Admin)
        .await
        .is_err());

    assert_eq!(builds.recover_stale_runs().await.expect("recover"), 1);
    assert!(!builds.is_build_running().await.expect("running"));

    let outcome = builds
        .build_community_graph(BuildTrigger::Admin)
        .await
        .expect("no conflict");
    assert!(outcome.success);

    let history = builds.get_build_history(10).await.expect("history");
    assert_eq!(history.len(), 2);
    assert_eq!(
        history[1].error_message.as_deref(),
        Some(wot_daemon::lifecycle::INTERRUPTED_MESSAGE)
    );
}

#[tokio::test]
async fn rebuild_with_unchanged_inputs_is_structurally_identical() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = open_db(&dir.path().join("wot.db"));
    let registry = SeederRegistry::new(db.clone());
    register(&registry, 1, "europe").await;
    register(&registry, 2, "asia").await;

    let mut fetcher = StaticFetcher::new();
    fetcher.add_follow(key(1), key(3));
    fetcher.add_follow(key(2), key(3));
    fetcher.add_follow(key(3), key(4));
    fetcher.add_follow(key(4), key(5));
    let builds = manager(&db, Arc::new(fetcher));

    let mut snapshots = Vec::new();
    for _ in 0..2 {
        builds
            .build_community_graph(BuildTrigger::Admin)
            .await
            .expect("no conflict");
        let conn = db.lock().await;
        snapshots.push(wot_db::queries::graph_nodes::list(&conn, 100, 0).expect("list"));
    }
    assert_eq!(snapshots[0], snapshots[1]);
    assert_eq!(snapshots[0].len(), 4);
}
