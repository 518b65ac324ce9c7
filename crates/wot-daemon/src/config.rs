//! Configuration file management.
//!
//! Read from `$WOT_DATA_DIR/config.toml`; every field has a default so a
//! missing file or section is fine.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use wot_graph::PropagationConfig;
use wot_types::{
    ScoreTable, DEFAULT_FETCH_CONCURRENCY, DEFAULT_FETCH_TIMEOUT_MS, DEFAULT_MAX_DEPTH,
    DEFAULT_SCORES,
};

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// HTTP settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Graph build parameters.
    #[serde(default)]
    pub graph: GraphConfig,
    /// Internal rebuild schedule.
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Bearer token for admin routes. Empty = admin routes always 401.
    /// `WOT_ADMIN_TOKEN` overrides it.
    #[serde(default)]
    pub admin_token: String,
}

/// Storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Data directory. Empty = platform default.
    #[serde(default)]
    pub data_dir: String,
}

/// Graph build configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    /// Score per depth, index = depth. Needs `max_depth + 1` entries.
    #[serde(default = "default_scores")]
    pub scores: Vec<f64>,
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
    /// NIP-02 snapshot file to serve follows from. Empty = none.
    #[serde(default)]
    pub follows_snapshot: String,
    /// How long cached graph stats may be served before a refresh.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
}

/// Internal scheduler configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Seconds between scheduled rebuilds. 0 = disabled.
    #[serde(default)]
    pub rebuild_interval_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions

fn default_listen_addr() -> String {
    "127.0.0.1:8787".to_string()
}

fn default_max_depth() -> u32 {
    DEFAULT_MAX_DEPTH
}

fn default_scores() -> Vec<f64> {
    DEFAULT_SCORES.to_vec()
}

fn default_fetch_concurrency() -> usize {
    DEFAULT_FETCH_CONCURRENCY
}

fn default_fetch_timeout_ms() -> u64 {
    DEFAULT_FETCH_TIMEOUT_MS
}

fn default_cache_ttl() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            admin_token: String::new(),
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            scores: default_scores(),
            fetch_concurrency: default_fetch_concurrency(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            follows_snapshot: String::new(),
            cache_ttl_secs: default_cache_ttl(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from the default config file location.
    ///
    /// Falls back to defaults if file does not exist.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();
        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };
        if let Ok(token) = std::env::var("WOT_ADMIN_TOKEN") {
            config.server.admin_token = token;
        }
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the daemon cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.listen_addr()?;
        self.propagation()?;
        Ok(())
    }

    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        self.server
            .listen_addr
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid listen_addr '{}': {e}", self.server.listen_addr))
    }

    /// Admin token, `None` when unset.
    pub fn admin_token(&self) -> Option<&str> {
        let token = self.server.admin_token.trim();
        (!token.is_empty()).then_some(token)
    }

    /// Propagation parameters for the graph builder.
    pub fn propagation(&self) -> anyhow::Result<PropagationConfig> {
        let graph = &self.graph;
        if graph.scores.len() != graph.max_depth as usize + 1 {
            anyhow::bail!(
                "graph.scores has {} entries, max_depth {} needs {}",
                graph.scores.len(),
                graph.max_depth,
                graph.max_depth + 1
            );
        }
        let config = PropagationConfig {
            max_depth: graph.max_depth,
            scores: ScoreTable::new(graph.scores.clone())?,
            concurrency: graph.fetch_concurrency,
            fetch_timeout: Duration::from_millis(graph.fetch_timeout_ms),
        };
        config.validate()?;
        Ok(config)
    }

    /// Snapshot path, if configured.
    pub fn follows_snapshot(&self) -> Option<PathBuf> {
        let path = self.graph.follows_snapshot.trim();
        (!path.is_empty()).then(|| PathBuf::from(path))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.graph.cache_ttl_secs)
    }

    /// Scheduled rebuild interval, `None` when disabled.
    pub fn rebuild_interval(&self) -> Option<Duration> {
        match self.schedule.rebuild_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> PathBuf {
        if self.storage.data_dir.is_empty() {
            Self::default_data_dir()
        } else {
            PathBuf::from(&self.storage.data_dir)
        }
    }

    /// Get the config file path.
    fn config_path() -> PathBuf {
        Self::default_data_dir().join("config.toml")
    }

    /// Platform-specific default data directory.
    fn default_data_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("WOT_DATA_DIR") {
            return PathBuf::from(dir);
        }
        #[cfg(target_os = "macos")]
        {
            dirs_fallback("Library/Application Support/wot-graph")
        }
        #[cfg(not(target_os = "macos"))]
        {
            dirs_fallback(".wot-graph")
        }
    }
}

/// Fallback home directory resolution.
fn dirs_fallback(subpath: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(subpath))
        .unwrap_or_else(|_| PathBuf::from("/tmp/wot-graph"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DaemonConfig::default();
        assert_eq!(config.graph.max_depth, 2);
        assert_eq!(config.graph.scores, vec![1.0, 0.4, 0.1]);
        assert_eq!(config.graph.fetch_concurrency, 16);
        assert!(config.admin_token().is_none());
        assert!(config.rebuild_interval().is_none());
        assert!(config.follows_snapshot().is_none());
        config.validate().expect("defaults are valid");
    }

    #[test]
    fn test_config_serialization() {
        let config = DaemonConfig::default();
        let toml_str = toml::to_string(&config).expect("serialize");
        let _parsed: DaemonConfig = toml::from_str(&toml_str).expect("parse");
    }

    #[test]
    fn test_partial_file() {
        let config: DaemonConfig = toml::from_str(
            r#"
            [server]
            admin_token = "s3cret"

            [graph]
            max_depth = 1
            scores = [1.0, 0.5]

            [schedule]
            rebuild_interval_secs = 3600
            "#,
        )
        .expect("parse");
        assert_eq!(config.admin_token(), Some("s3cret"));
        assert_eq!(config.server.listen_addr, "127.0.0.1:8787");
        assert_eq!(config.rebuild_interval(), Some(Duration::from_secs(3600)));

        let propagation = config.propagation().expect("valid");
        assert_eq!(propagation.max_depth, 1);
        assert_eq!(propagation.scores.score_for(1), Some(0.5));
    }

    #[test]
    fn test_rejects_mismatched_scores() {
        let mut config = DaemonConfig::default();
        config.graph.max_depth = 3;
        assert!(config.propagation().is_err());
    }

    #[test]
    fn test_rejects_increasing_scores() {
        let mut config = DaemonConfig::default();
        config.graph.scores = vec![1.0, 0.1, 0.4];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let mut config = DaemonConfig::default();
        config.graph.fetch_concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_listen_addr() {
        let mut config = DaemonConfig::default();
        config.server.listen_addr = "localhost".into();
        assert!(config.validate().is_err());
    }
}
