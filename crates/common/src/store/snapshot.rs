//! JSON snapshot files
//!
//! A snapshot is the exchange format between the scraping/embedding side and
//! the analysis side: `{ "papers": [...], "citations": [...] }` with
//! embeddings as raw float arrays.

use crate::errors::{AppError, Result};
use crate::models::{CitationEdge, Paper};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub papers: Vec<Paper>,

    #[serde(default)]
    pub citations: Vec<CitationEdge>,
}

impl Snapshot {
    pub fn new(papers: Vec<Paper>, citations: Vec<CitationEdge>) -> Self {
        Self { papers, citations }
    }

    /// Read a snapshot file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::SnapshotNotFound {
                    path: path.display().to_string(),
                }
            } else {
                AppError::Io(e)
            }
        })?;

        let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
        tracing::debug!(
            path = %path.display(),
            papers = snapshot.papers.len(),
            citations = snapshot.citations.len(),
            "Snapshot loaded"
        );
        Ok(snapshot)
    }

    /// Write the snapshot as pretty-printed JSON
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(path.as_ref(), json).await?;
        Ok(())
    }

    /// Common embedding dimension, if every embedded paper agrees on one
    pub fn embedding_dimension(&self) -> Result<Option<usize>> {
        let mut dimension: Option<usize> = None;
        for embedding in self.papers.iter().filter_map(|p| p.embedding.as_ref()) {
            match dimension {
                None => dimension = Some(embedding.len()),
                Some(expected) if expected != embedding.len() => {
                    return Err(AppError::DimensionMismatch {
                        expected,
                        actual: embedding.len(),
                    })
                }
                Some(_) => {}
            }
        }
        Ok(dimension)
    }

    /// Hex SHA-256 of the canonical JSON form, recorded on analysis reports
    pub fn fingerprint(&self) -> Result<String> {
        let json = serde_json::to_vec(self)?;
        Ok(hex::encode(Sha256::digest(&json)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PaperId;
    use chrono::NaiveDate;

    fn sample() -> Snapshot {
        Snapshot::new(
            vec![
                Paper::new("10.1234/example")
                    .with_title("Sample")
                    .with_abstract("An example paper")
                    .with_date(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap())
                    .with_embedding(vec![0.5, 0.5]),
                Paper::new("10.1234/another").with_title("Another"),
            ],
            vec![CitationEdge::new("10.1234/another", "10.1234/example").with_confidence(0.9)],
        )
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("papers.json");

        let snapshot = sample();
        snapshot.save(&path).await.unwrap();
        let loaded = Snapshot::load(&path).await.unwrap();

        assert_eq!(loaded, snapshot);
        assert_eq!(loaded.citations[0].cited, PaperId::from("10.1234/example"));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let err = Snapshot::load("/nonexistent/snapshot.json").await.unwrap_err();
        assert!(matches!(err, AppError::SnapshotNotFound { .. }));
    }

    #[test]
    fn test_dimension_check() {
        let mut snapshot = sample();
        assert_eq!(snapshot.embedding_dimension().unwrap(), Some(2));

        snapshot.papers[1].embedding = Some(vec![1.0, 2.0, 3.0]);
        assert!(matches!(
            snapshot.embedding_dimension(),
            Err(AppError::DimensionMismatch { expected: 2, actual: 3 })
        ));
    }

    #[test]
    fn test_fingerprint_changes_with_content() {
        let a = sample();
        let mut b = sample();
        b.citations.clear();

        assert_eq!(a.fingerprint().unwrap(), sample().fingerprint().unwrap());
        assert_ne!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
        assert_eq!(a.fingerprint().unwrap().len(), 64);
    }
}
