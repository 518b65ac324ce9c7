//! wot-daemon: community Web-of-Trust graph service.
//!
//! Keeps a registry of seeder keys, rebuilds the trust graph by propagating
//! trust through the follow graph, and serves the result over HTTP.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod registry;
pub mod scheduler;

use std::sync::Arc;

pub use cache::GraphCache;
pub use config::DaemonConfig;
pub use lifecycle::{BuildConflict, BuildError, BuildManager};
pub use registry::{RegistryError, SeederRegistry};

/// Shared database handle.
pub type Db = Arc<tokio::sync::Mutex<rusqlite::Connection>>;

/// State shared by every request handler.
pub struct AppState {
    /// Seeder registry.
    pub registry: SeederRegistry,
    /// Graph builds and reads.
    pub builds: Arc<BuildManager>,
    /// Bearer token for admin routes. `None` locks them.
    pub admin_token: Option<String>,
}

impl AppState {
    pub fn new(db: Db, builds: Arc<BuildManager>, admin_token: Option<String>) -> Self {
        Self {
            registry: SeederRegistry::new(db),
            builds,
            admin_token,
        }
    }
}
