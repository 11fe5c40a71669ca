//! Configuration management for PaperLineage
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/{APP_ENV}.toml)
//! - Default values
//!
//! Every section has defaults, so an empty environment yields a usable
//! configuration for snapshot-based runs.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Analysis policies and options
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// PostgreSQL URL (pgvector extension required)
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: openai, mock
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API key for embedding service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension (used by the mock provider)
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries
    #[serde(default = "default_embedding_retries")]
    pub max_retries: u32,

    /// Texts per embedding request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Requests in flight at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error) or a full EnvFilter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default)]
    pub metrics_port: u16,

    /// Service name attached to logs
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

/// Analysis configuration, one section per pipeline stage
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub graph: GraphPolicy,

    #[serde(default)]
    pub inheritance: InheritanceConfig,

    #[serde(default)]
    pub comparator: ComparatorConfig,

    #[serde(default)]
    pub evolution: EvolutionConfig,
}

/// What to do with an edge whose endpoint is not a known paper
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownIdPolicy {
    /// Drop the edge and record it in the build report
    #[default]
    Drop,
    /// Abort graph construction
    FailFast,
    /// Keep the edge, pointing at a sentinel node with no metadata
    Sentinel,
}

/// What to do when the edge set contains a cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePolicy {
    /// Remove the back edge that closes the cycle and continue
    #[default]
    Exclude,
    /// Abort graph construction
    FailFast,
}

/// What to do with references to papers published after the citing paper
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TemporalPolicy {
    /// Keep the edge and record the inversion
    #[default]
    Flag,
    /// Remove the edge before cycle detection
    Drop,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct GraphPolicy {
    #[serde(default)]
    pub unknown_ids: UnknownIdPolicy,

    #[serde(default)]
    pub cycles: CyclePolicy,

    #[serde(default)]
    pub temporal: TemporalPolicy,
}

/// Built-in predecessor weighting schemes
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WeightingScheme {
    /// Every predecessor counts equally
    #[default]
    Uniform,
    /// Exponential decay with the age gap between citing and cited paper
    Recency { half_life_days: f64 },
    /// Down-weight predecessors that themselves cite many papers
    OutDegree,
    /// Up-weight predecessors that are cited often
    InDegree,
    /// Use the scraper's per-edge confidence
    EdgeConfidence,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct InheritanceConfig {
    #[serde(default)]
    pub weighting: WeightingScheme,

    /// Shard papers across a rayon pool
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct ComparatorConfig {
    /// Leave root papers (factor fixed at 0) out of the correlation sample
    #[serde(default = "default_exclude_roots")]
    pub exclude_roots: bool,
}

/// Width of an evolution time bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketWidth {
    /// Calendar years, aligned to multiples of the width
    Years(u32),
    /// Fixed day spans counted from the Unix epoch
    Days(u32),
}

impl Default for BucketWidth {
    fn default() -> Self {
        BucketWidth::Years(1)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct EvolutionConfig {
    #[serde(default)]
    pub bucket_width: BucketWidth,

    /// Drop size, in standard deviations of the trailing means, that marks a burst
    #[serde(default = "default_burst_threshold")]
    pub burst_threshold: f64,

    /// Number of prior buckets in the trailing moving average
    #[serde(default = "default_trailing_window")]
    pub trailing_window: usize,

    /// Prior buckets required before a bucket can be flagged
    #[serde(default = "default_min_history")]
    pub min_history: usize,

    /// Absolute drop below the trailing average that a burst must exceed
    #[serde(default = "default_min_drop")]
    pub min_drop: f64,

    /// Include root papers in bucket statistics
    #[serde(default)]
    pub include_roots: bool,
}

// Default value functions
fn default_database_url() -> String { "postgres://localhost/paperlineage".to_string() }
fn default_max_connections() -> u32 { 10 }
fn default_min_connections() -> u32 { 1 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_embedding_provider() -> String { "mock".to_string() }
fn default_embedding_model() -> String { crate::DEFAULT_EMBEDDING_MODEL.to_string() }
fn default_embedding_dimension() -> usize { crate::DEFAULT_EMBEDDING_DIMENSION }
fn default_embedding_timeout() -> u64 { 30 }
fn default_embedding_retries() -> u32 { 3 }
fn default_batch_size() -> usize { 32 }
fn default_concurrency() -> usize { 4 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { false }
fn default_service_name() -> String { "paperlineage".to_string() }
fn default_parallel() -> bool { true }
fn default_exclude_roots() -> bool { true }
fn default_burst_threshold() -> f64 { 1.5 }
fn default_trailing_window() -> usize { 3 }
fn default_min_history() -> usize { 2 }
fn default_min_drop() -> f64 { 0.01 }

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

impl EmbeddingConfig {
    /// Per-request timeout for the embedding API
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            api_base: None,
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout(),
            max_retries: default_embedding_retries(),
            batch_size: default_batch_size(),
            concurrency: default_concurrency(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: 0,
            service_name: default_service_name(),
        }
    }
}

impl Default for InheritanceConfig {
    fn default() -> Self {
        Self {
            weighting: WeightingScheme::default(),
            parallel: default_parallel(),
        }
    }
}

impl Default for ComparatorConfig {
    fn default() -> Self {
        Self {
            exclude_roots: default_exclude_roots(),
        }
    }
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            bucket_width: BucketWidth::default(),
            burst_threshold: default_burst_threshold(),
            trailing_window: default_trailing_window(),
            min_history: default_min_history(),
            min_drop: default_min_drop(),
            include_roots: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with APP__ prefix
            // e.g., APP__ANALYSIS__GRAPH__CYCLES=fail_fast
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific file, still honouring APP__ overrides
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.embedding.provider, "mock");
        assert_eq!(config.analysis.graph.cycles, CyclePolicy::Exclude);
        assert_eq!(config.analysis.graph.unknown_ids, UnknownIdPolicy::Drop);
        assert_eq!(config.analysis.evolution.bucket_width, BucketWidth::Years(1));
        assert!((config.analysis.evolution.burst_threshold - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lineage.toml");
        std::fs::write(
            &path,
            r#"
            [analysis.graph]
            cycles = "fail_fast"
            unknown_ids = "sentinel"

            [analysis.inheritance.weighting]
            kind = "recency"
            half_life_days = 365.0

            [analysis.evolution]
            bucket_width = { days = 90 }
            "#,
        )
        .unwrap();

        let config = AppConfig::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.analysis.graph.cycles, CyclePolicy::FailFast);
        assert_eq!(config.analysis.graph.unknown_ids, UnknownIdPolicy::Sentinel);
        assert_eq!(
            config.analysis.inheritance.weighting,
            WeightingScheme::Recency { half_life_days: 365.0 }
        );
        assert_eq!(config.analysis.evolution.bucket_width, BucketWidth::Days(90));
        assert_eq!(config.analysis.evolution.trailing_window, 3);
    }

    #[test]
    fn test_embedding_timeout() {
        let config = AppConfig::default();
        assert_eq!(config.embedding.timeout(), Duration::from_secs(30));
    }
}
