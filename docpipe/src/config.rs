use std::time::Duration;

use serde::{Deserialize, Serialize};

use docpipe_storage::PoolConfig;

/// General, non-backend-specific options, following `src/config.rs`'s
/// `GeneralConfig` shape. Nothing network-specific is needed here (there's
/// no server in this engine); `log_level` is kept for completeness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Overrides `RUST_LOG` when set (spec.md §6's logging knob).
    #[serde(default)]
    pub log_level: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> GeneralConfig {
        GeneralConfig { log_level: None }
    }
}

/// The database configuration struct, following `src/config.rs`'s
/// `DatabaseConfig` shape: a connection string plus the pool knobs named in
/// spec.md §4.4's construction table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// The database connection string (a SQLite path for the reference backend).
    pub url: String,
    /// Base number of pooled connections.
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    /// Extra connections allowed beyond `pool_size`.
    #[serde(default = "default_max_overflow")]
    pub max_overflow: u32,
    /// Seconds to wait for a free connection before giving up.
    #[serde(default = "default_pool_timeout")]
    pub pool_timeout_secs: u64,
    /// Seconds an idle connection may sit in the pool before being recycled.
    #[serde(default = "default_pool_recycle")]
    pub pool_recycle_secs: u64,
}

fn default_pool_size() -> u32 {
    5
}

fn default_max_overflow() -> u32 {
    5
}

fn default_pool_timeout() -> u64 {
    30
}

fn default_pool_recycle() -> u64 {
    1800
}

impl From<&DatabaseConfig> for PoolConfig {
    fn from(config: &DatabaseConfig) -> PoolConfig {
        PoolConfig {
            pool_size: config.pool_size,
            max_overflow: config.max_overflow,
            pool_timeout: Duration::from_secs(config.pool_timeout_secs),
            pool_recycle: Duration::from_secs(config.pool_recycle_secs),
        }
    }
}

/// The pipeline-level configuration struct: the error state name and the
/// concurrency gate's capacity (spec.md §4.4's construction table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// The state used as `to_state` for synthesized error documents.
    #[serde(default = "default_error_state")]
    pub error_state: String,
    /// The concurrency gate's capacity.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_error_state() -> String {
    "error".to_string()
}

fn default_max_concurrency() -> usize {
    10
}

impl Default for PipelineConfig {
    fn default() -> PipelineConfig {
        PipelineConfig {
            error_state: default_error_state(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

/// The application configuration struct, loaded from a TOML file by the CLI
/// binary (spec.md §6: "no environment variables or CLI surface at the core
/// layer"; this struct belongs to the containing CLI application, not to
/// `DocStore` itself).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// General instance configuration options.
    #[serde(default)]
    pub general: GeneralConfig,
    /// The database configuration.
    pub database: DatabaseConfig,
    /// The pipeline configuration.
    #[serde(default)]
    pub pipeline: PipelineConfig,
}
