//! Configuration management for codegraph.
//!
//! Configuration is loaded from multiple sources with the following priority:
//! 1. Environment variables (highest priority)
//! 2. Project-local `codegraph.toml` file
//! 3. User config `~/.config/codegraph/config.toml`
//! 4. Built-in defaults (lowest priority)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

mod defaults;

pub use defaults::*;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Fact ingestion configuration.
    pub ingest: IngestConfig,

    /// Graph algorithm bounds and scoring.
    pub graph: GraphConfig,

    /// Storage configuration.
    pub storage: StorageConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// Searches for config in order:
    /// 1. `./codegraph.toml` (project local)
    /// 2. `~/.config/codegraph/config.toml` (user config)
    /// 3. Falls back to defaults
    pub fn load() -> Result<Self, ConfigError> {
        if Path::new("codegraph.toml").exists() {
            return Self::from_file("codegraph.toml");
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("codegraph").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(threads) = std::env::var("CODEGRAPH_WORKER_THREADS") {
            if let Ok(n) = threads.parse() {
                self.ingest.worker_threads = n;
            }
        }

        if let Ok(depth) = std::env::var("CODEGRAPH_CALL_DEPTH") {
            if let Ok(n) = depth.parse() {
                self.graph.default_call_depth = n;
            }
        }
        if let Ok(threshold) = std::env::var("CODEGRAPH_COMPLEXITY_THRESHOLD") {
            if let Ok(n) = threshold.parse() {
                self.graph.complexity_threshold = n;
            }
        }

        if let Ok(dir) = std::env::var("CODEGRAPH_DATA_DIR") {
            self.storage.data_dir = dir;
        }

        if let Ok(filter) = std::env::var("CODEGRAPH_LOG") {
            self.logging.filter = filter;
        }
    }

    /// Reject values that would make the graph algorithms unbounded.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.graph.max_reachable_nodes == 0 {
            return Err(ConfigError::Invalid(
                "graph.max_reachable_nodes must be greater than 0".to_string(),
            ));
        }
        if self.graph.max_call_graph_nodes == 0 {
            return Err(ConfigError::Invalid(
                "graph.max_call_graph_nodes must be greater than 0".to_string(),
            ));
        }
        if self.storage.bulk_batch_size == 0 {
            return Err(ConfigError::Invalid(
                "storage.bulk_batch_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Create a default config file content as a string.
    pub fn default_config_string() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Fact ingestion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Worker threads for per-module entity building (0 = one per core).
    pub worker_threads: usize,

    /// Drop overloaded-literal pseudo calls before resolution.
    pub skip_literal_calls: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            worker_threads: DEFAULT_WORKER_THREADS,
            skip_literal_calls: DEFAULT_SKIP_LITERAL_CALLS,
        }
    }
}

impl IngestConfig {
    /// Resolve the worker count, falling back to the available parallelism.
    pub fn effective_threads(&self) -> usize {
        if self.worker_threads > 0 {
            return self.worker_threads;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

/// Graph algorithm configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Depth used by call-graph expansion when the caller gives none.
    pub default_call_depth: usize,

    /// Node bound for type reachability.
    pub max_reachable_nodes: usize,

    /// Node bound for call-graph expansion.
    pub max_call_graph_nodes: usize,

    /// Threshold for `find_complex_functions`.
    pub complexity_threshold: usize,

    /// Decision keywords counted in a function's source text.
    pub complexity_keywords: Vec<String>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            default_call_depth: DEFAULT_CALL_DEPTH,
            max_reachable_nodes: DEFAULT_MAX_REACHABLE_NODES,
            max_call_graph_nodes: DEFAULT_MAX_CALL_GRAPH_NODES,
            complexity_threshold: DEFAULT_COMPLEXITY_THRESHOLD,
            complexity_keywords: DEFAULT_COMPLEXITY_KEYWORDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base directory for codegraph data (default: ".codegraph").
    pub data_dir: String,

    /// Database directory inside `data_dir`.
    pub db_file: String,

    /// SurrealDB namespace.
    pub namespace: String,

    /// SurrealDB database.
    pub database: String,

    /// Records per write batch during persistence.
    pub bulk_batch_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: DEFAULT_DATA_DIR.to_string(),
            db_file: DEFAULT_DB_FILE.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            bulk_batch_size: DEFAULT_BULK_BATCH_SIZE,
        }
    }
}

impl StorageConfig {
    /// Full path to the on-disk database.
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(&self.db_file)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}
