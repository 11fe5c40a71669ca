//! PaperLineage Common Library
//!
//! Shared code for the PaperLineage analysis pipeline including:
//! - Paper and citation models
//! - Paper store abstraction, JSON snapshots, PostgreSQL store
//! - Embedding client abstraction
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod config;
pub mod db;
pub mod embeddings;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod store;

// Re-export commonly used types
pub use config::AppConfig;
pub use embeddings::Embedder;
pub use errors::{AppError, Result};
pub use models::{CitationEdge, Paper, PaperId};
pub use store::{MemoryStore, PaperStore, Snapshot};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Output dimension of the default model
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;
