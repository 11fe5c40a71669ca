//! Database layer for PaperLineage
//!
//! Provides:
//! - SeaORM entity models
//! - `PgPaperStore`, the PostgreSQL-backed [`crate::store::PaperStore`]
//! - Connection pool management
//! - Schema bootstrap

pub mod models;
mod repository;

pub use repository::{format_vector, parse_vector, PgPaperStore};

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use std::time::Duration;
use tracing::info;

/// Schema for papers, citations and the pgvector embedding column
pub const SCHEMA_SQL: &str = r#"
CREATE EXTENSION IF NOT EXISTS vector;

CREATE TABLE IF NOT EXISTS papers (
    id              TEXT PRIMARY KEY,
    title           TEXT NOT NULL DEFAULT '',
    abstract_text   TEXT NOT NULL DEFAULT '',
    authors         JSONB NOT NULL DEFAULT '[]'::jsonb,
    category        TEXT,
    published_at    DATE,
    citation_count  BIGINT,
    embedding       vector,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS citations (
    citing_id   TEXT NOT NULL,
    cited_id    TEXT NOT NULL,
    confidence  DOUBLE PRECISION,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (citing_id, cited_id)
);

-- Either endpoint may be unknown; graph construction decides what to do with it
ALTER TABLE citations DROP CONSTRAINT IF EXISTS citations_citing_id_fkey;

CREATE INDEX IF NOT EXISTS citations_cited_idx ON citations (cited_id);
"#;

/// Database connection pool wrapper
#[derive(Clone)]
pub struct DbPool {
    conn: DatabaseConnection,
}

impl DbPool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to database...");

        let mut opts = ConnectOptions::new(&config.url);
        opts.max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .sqlx_logging(false);

        let conn = Database::connect(opts)
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Failed to connect: {}", e),
            })?;

        info!("Database connection established");

        Ok(Self { conn })
    }

    pub fn conn(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        self.conn
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Ping failed: {}", e),
            })?;
        Ok(())
    }

    /// Create tables and the pgvector extension if they do not exist
    pub async fn init_schema(&self) -> Result<()> {
        self.conn.execute_unprepared(SCHEMA_SQL).await?;
        info!("Database schema ready");
        Ok(())
    }
}
