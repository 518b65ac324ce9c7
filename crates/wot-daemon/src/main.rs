//! wot-daemon: serves the community trust graph over HTTP.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{error, info, warn};
use wot_daemon::{api, scheduler, AppState, BuildManager, DaemonConfig, GraphCache};
use wot_graph::{FollowFetcher, SnapshotFetcher, StaticFetcher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load config
    let config = DaemonConfig::load()?;

    // 2. Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("wot={}", config.logging.log_level).parse()?)
                .add_directive(format!("tower_http={}", config.logging.log_level).parse()?),
        )
        .init();

    info!("WoT daemon starting");

    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)?;

    // 3. Open database
    let db_path = data_dir.join("wot.db");
    let conn = wot_db::open(&db_path)?;
    let db = Arc::new(tokio::sync::Mutex::new(conn));
    info!("Database opened at {:?}", db_path);

    // 4. Follow source
    let fetcher: Arc<dyn FollowFetcher> = match config.follows_snapshot() {
        Some(path) => Arc::new(SnapshotFetcher::load(&path).await?),
        None => {
            warn!("no follows snapshot configured, builds will only contain seeders");
            Arc::new(StaticFetcher::new())
        }
    };

    // 5. Build manager
    let cache = GraphCache::new(db.clone(), config.cache_ttl());
    let builds = Arc::new(BuildManager::new(
        db.clone(),
        fetcher,
        config.propagation()?,
        cache,
    ));
    let recovered = builds.recover_stale_runs().await?;
    if recovered > 0 {
        info!(recovered, "Recovered interrupted build runs");
    }

    if config.admin_token().is_none() {
        warn!("no admin token configured, admin routes will reject every request");
    }

    // 6. Create shutdown channel
    let (shutdown_tx, _shutdown_rx) = broadcast::channel(1);

    // 7. Start scheduler
    if let Some(every) = config.rebuild_interval() {
        tokio::spawn(scheduler::run(builds.clone(), every, shutdown_tx.subscribe()));
    }

    // 8. Serve HTTP until shutdown
    let state = Arc::new(AppState::new(
        db,
        builds,
        config.admin_token().map(str::to_string),
    ));
    let addr = config.listen_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    tokio::select! {
        result = axum::serve(listener, api::build_router(state)) => {
            if let Err(e) = result {
                error!("HTTP server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
        }
    }

    // Graceful shutdown
    let _ = shutdown_tx.send(());
    info!("Daemon stopped");
    Ok(())
}
