//! Error types for PaperLineage
//!
//! Provides a single error enum for the I/O edges of the pipeline
//! (stores, embedding service, configuration) with:
//! - Distinct variants for different failure modes
//! - Machine-readable error codes
//! - Retry classification for the embedding client

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    InvalidFormat,
    DimensionMismatch,

    // Resource errors (4xxx)
    SnapshotNotFound,

    // Database errors (7xxx)
    DatabaseError,
    ConnectionError,

    // External service errors (8xxx)
    UpstreamError,
    EmbeddingError,
    EmbeddingTimeout,

    // Internal errors (9xxx)
    ConfigurationError,
    SerializationError,
    IoError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,
            ErrorCode::InvalidFormat => 1003,
            ErrorCode::DimensionMismatch => 1005,

            ErrorCode::SnapshotNotFound => 4006,

            ErrorCode::DatabaseError => 7001,
            ErrorCode::ConnectionError => 7002,

            ErrorCode::UpstreamError => 8001,
            ErrorCode::EmbeddingError => 8002,
            ErrorCode::EmbeddingTimeout => 8003,

            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
            ErrorCode::IoError => 9004,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    // Resource errors
    #[error("Snapshot not found: {path}")]
    SnapshotNotFound { path: String },

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    // External service errors
    #[error("Embedding service error: {message}")]
    EmbeddingError { message: String },

    #[error("Embedding timeout after {timeout_ms}ms")]
    EmbeddingTimeout { timeout_ms: u64 },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            AppError::DimensionMismatch { .. } => ErrorCode::DimensionMismatch,
            AppError::SnapshotNotFound { .. } => ErrorCode::SnapshotNotFound,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::DatabaseConnection { .. } => ErrorCode::ConnectionError,
            AppError::EmbeddingError { .. } => ErrorCode::EmbeddingError,
            AppError::EmbeddingTimeout { .. } => ErrorCode::EmbeddingTimeout,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Io(_) => ErrorCode::IoError,
        }
    }

    /// Whether retrying the same call might succeed
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::EmbeddingTimeout { .. } | AppError::DatabaseConnection { .. } => true,
            AppError::HttpClient(e) => e.is_timeout() || e.is_connect(),
            AppError::EmbeddingError { .. } => true,
            _ => false,
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}
