//! PostgreSQL paper store
//!
//! Metadata goes through SeaORM entities; the pgvector `embedding` column
//! is exchanged in its text form (`[0.1,0.2,...]`) via raw SQL.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use crate::models::{CitationEdge, Paper, PaperId};
use crate::store::{PaperStore, Snapshot};
use async_trait::async_trait;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait, QueryOrder, QuerySelect, Set,
    Statement, TransactionTrait,
};
use std::collections::HashMap;
use tracing::{debug, info};

/// PostgreSQL-backed paper store
#[derive(Clone)]
pub struct PgPaperStore {
    pool: DbPool,
}

impl PgPaperStore {
    /// Create a new store with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> &DatabaseConnection {
        self.pool.conn()
    }

    /// Load one embedding
    async fn embedding_for(&self, id: &str) -> Result<Option<Vec<f32>>> {
        let row = self
            .conn()
            .query_one(Statement::from_sql_and_values(
                DbBackend::Postgres,
                "SELECT embedding::text AS embedding FROM papers WHERE id = $1 AND embedding IS NOT NULL",
                vec![id.into()],
            ))
            .await?;

        match row {
            Some(row) => {
                let text: String = row.try_get("", "embedding")?;
                Ok(Some(parse_vector(&text)?))
            }
            None => Ok(None),
        }
    }

    /// Load every stored embedding keyed by paper id
    async fn all_embeddings(&self) -> Result<HashMap<String, Vec<f32>>> {
        let rows = self
            .conn()
            .query_all(Statement::from_string(
                DbBackend::Postgres,
                "SELECT id, embedding::text AS embedding FROM papers WHERE embedding IS NOT NULL",
            ))
            .await?;

        let mut embeddings = HashMap::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("", "id")?;
            let text: String = row.try_get("", "embedding")?;
            embeddings.insert(id, parse_vector(&text)?);
        }
        Ok(embeddings)
    }

    /// Write embeddings for existing papers
    pub async fn store_embeddings(&self, embeddings: &[(PaperId, Vec<f32>)]) -> Result<u64> {
        let txn = self.conn().begin().await?;
        let updated = write_embeddings(&txn, embeddings).await?;
        txn.commit().await?;
        debug!(updated, "Embeddings stored");
        Ok(updated)
    }

    /// Upsert a snapshot's papers, citations and embeddings in one transaction
    ///
    /// Repeated paper ids keep the last record; repeated citation pairs keep
    /// the highest confidence.
    pub async fn import_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        let now = chrono::Utc::now();
        let papers = unique_papers(&snapshot.papers);
        let citations = unique_citations(&snapshot.citations);

        let txn = self.conn().begin().await?;

        for batch in papers.chunks(IMPORT_BATCH_ROWS) {
            let rows = batch.iter().map(|paper| PaperActiveModel {
                id: Set(paper.id.to_string()),
                title: Set(paper.title.clone()),
                abstract_text: Set(paper.abstract_text.clone()),
                authors: Set(serde_json::json!(paper.authors)),
                category: Set(paper.category.clone()),
                published_at: Set(paper.published_at),
                citation_count: Set(paper.citation_count.map(|c| c as i64)),
                created_at: Set(now.into()),
            });

            PaperEntity::insert_many(rows)
                .on_conflict(
                    OnConflict::column(PaperColumn::Id)
                        .update_columns([
                            PaperColumn::Title,
                            PaperColumn::AbstractText,
                            PaperColumn::Authors,
                            PaperColumn::Category,
                            PaperColumn::PublishedAt,
                            PaperColumn::CitationCount,
                        ])
                        .to_owned(),
                )
                .exec_without_returning(&txn)
                .await?;
        }

        for batch in citations.chunks(IMPORT_BATCH_ROWS) {
            let rows = batch.iter().map(|edge| CitationActiveModel {
                citing_id: Set(edge.citing.to_string()),
                cited_id: Set(edge.cited.to_string()),
                confidence: Set(edge.confidence),
                created_at: Set(now.into()),
            });

            CitationEntity::insert_many(rows)
                .on_conflict(
                    OnConflict::columns([CitationColumn::CitingId, CitationColumn::CitedId])
                        .update_column(CitationColumn::Confidence)
                        .to_owned(),
                )
                .exec_without_returning(&txn)
                .await?;
        }

        let embeddings: Vec<(PaperId, Vec<f32>)> = papers
            .iter()
            .filter_map(|p| p.embedding.clone().map(|e| (p.id.clone(), e)))
            .collect();
        write_embeddings(&txn, &embeddings).await?;

        txn.commit().await?;

        info!(
            papers = papers.len(),
            citations = citations.len(),
            embeddings = embeddings.len(),
            "Snapshot imported"
        );
        Ok(())
    }
}

/// Rows per multi-row INSERT; the widest row binds 8 parameters, well under
/// PostgreSQL's 65535 limit
const IMPORT_BATCH_ROWS: usize = 1000;

async fn write_embeddings<C: ConnectionTrait>(conn: &C, embeddings: &[(PaperId, Vec<f32>)]) -> Result<u64> {
    let mut updated = 0;
    for (id, embedding) in embeddings {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "UPDATE papers SET embedding = $1::vector WHERE id = $2",
            vec![format_vector(embedding).into(), id.as_str().into()],
        );
        updated += conn.execute(stmt).await?.rows_affected();
    }
    Ok(updated)
}

/// One record per id, in first-seen order, holding the last version
fn unique_papers(papers: &[Paper]) -> Vec<&Paper> {
    let mut position: HashMap<&PaperId, usize> = HashMap::with_capacity(papers.len());
    let mut unique: Vec<&Paper> = Vec::with_capacity(papers.len());
    for paper in papers {
        match position.get(&paper.id) {
            Some(&at) => unique[at] = paper,
            None => {
                position.insert(&paper.id, unique.len());
                unique.push(paper);
            }
        }
    }
    unique
}

/// One edge per (citing, cited) pair, keeping the highest confidence
fn unique_citations(citations: &[CitationEdge]) -> Vec<CitationEdge> {
    let mut position: HashMap<(&PaperId, &PaperId), usize> = HashMap::with_capacity(citations.len());
    let mut unique: Vec<CitationEdge> = Vec::with_capacity(citations.len());
    for edge in citations {
        match position.get(&(&edge.citing, &edge.cited)) {
            Some(&at) => {
                let existing = &mut unique[at].confidence;
                *existing = match (*existing, edge.confidence) {
                    (Some(a), Some(b)) => Some(a.max(b)),
                    (a, b) => a.or(b),
                };
            }
            None => {
                position.insert((&edge.citing, &edge.cited), unique.len());
                unique.push(edge.clone());
            }
        }
    }
    unique
}

fn paper_from_row(row: PaperRow, embedding: Option<Vec<f32>>) -> Paper {
    let authors = serde_json::from_value(row.authors).unwrap_or_default();
    Paper {
        id: PaperId::new(row.id),
        title: row.title,
        abstract_text: row.abstract_text,
        authors,
        category: row.category,
        published_at: row.published_at,
        citation_count: row.citation_count.and_then(|c| u64::try_from(c).ok()),
        embedding,
    }
}

#[async_trait]
impl PaperStore for PgPaperStore {
    async fn get_paper(&self, id: &PaperId) -> Result<Option<Paper>> {
        let Some(row) = PaperEntity::find_by_id(id.to_string()).one(self.conn()).await? else {
            return Ok(None);
        };
        let embedding = self.embedding_for(id.as_str()).await?;
        Ok(Some(paper_from_row(row, embedding)))
    }

    async fn iterate_citation_edges(&self) -> Result<Vec<CitationEdge>> {
        let rows = CitationEntity::find()
            .order_by_asc(CitationColumn::CreatedAt)
            .order_by_asc(CitationColumn::CitingId)
            .order_by_asc(CitationColumn::CitedId)
            .all(self.conn())
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| CitationEdge {
                citing: PaperId::new(row.citing_id),
                cited: PaperId::new(row.cited_id),
                confidence: row.confidence,
            })
            .collect())
    }

    async fn paper_ids(&self) -> Result<Vec<PaperId>> {
        let ids: Vec<String> = PaperEntity::find()
            .select_only()
            .column(PaperColumn::Id)
            .order_by_asc(PaperColumn::Id)
            .into_tuple()
            .all(self.conn())
            .await?;
        Ok(ids.into_iter().map(PaperId::new).collect())
    }

    async fn load_snapshot(&self) -> Result<Snapshot> {
        // Two bulk queries instead of one round trip per paper
        let rows = PaperEntity::find()
            .order_by_asc(PaperColumn::Id)
            .all(self.conn())
            .await?;
        let mut embeddings = self.all_embeddings().await?;

        let papers = rows
            .into_iter()
            .map(|row| {
                let embedding = embeddings.remove(&row.id);
                paper_from_row(row, embedding)
            })
            .collect();
        let citations = self.iterate_citation_edges().await?;

        Ok(Snapshot::new(papers, citations))
    }
}

/// Render a vector in pgvector text format
pub fn format_vector(values: &[f32]) -> String {
    format!(
        "[{}]",
        values
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(",")
    )
}

/// Parse pgvector text format (`[1,2.5,-3]`)
pub fn parse_vector(text: &str) -> Result<Vec<f32>> {
    let inner = text
        .trim()
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| AppError::InvalidFormat {
            message: format!("Not a vector literal: {}", text),
        })?;

    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }

    inner
        .split(',')
        .map(|part| {
            part.trim().parse::<f32>().map_err(|e| AppError::InvalidFormat {
                message: format!("Bad vector component '{}': {}", part.trim(), e),
            })
        })
        .collect()
}
