//! Paper store abstraction
//!
//! The analysis core never talks to a database or a file directly. It asks a
//! `PaperStore` for a [`Snapshot`] once per run and works on that.
//!
//! Implementations:
//! - [`MemoryStore`]: in-process map, also what a loaded snapshot file becomes
//! - [`crate::db::PgPaperStore`]: PostgreSQL + pgvector

mod snapshot;

pub use snapshot::Snapshot;

use crate::errors::Result;
use crate::models::{CitationEdge, Paper, PaperId};
use async_trait::async_trait;
use std::collections::HashMap;

/// Read access to papers, embeddings and citation pairs
#[async_trait]
pub trait PaperStore: Send + Sync {
    /// Look up one paper (metadata + embedding)
    async fn get_paper(&self, id: &PaperId) -> Result<Option<Paper>>;

    /// All citation pairs in insertion order
    async fn iterate_citation_edges(&self) -> Result<Vec<CitationEdge>>;

    /// Identifiers of every stored paper
    async fn paper_ids(&self) -> Result<Vec<PaperId>>;

    /// Materialise the whole store for one analysis pass
    async fn load_snapshot(&self) -> Result<Snapshot> {
        let ids = self.paper_ids().await?;
        let mut papers = Vec::with_capacity(ids.len());
        for id in &ids {
            if let Some(paper) = self.get_paper(id).await? {
                papers.push(paper);
            }
        }
        let citations = self.iterate_citation_edges().await?;
        Ok(Snapshot::new(papers, citations))
    }
}

/// In-memory store
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    papers: HashMap<PaperId, Paper>,
    order: Vec<PaperId>,
    citations: Vec<CitationEdge>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a paper
    pub fn insert_paper(&mut self, paper: Paper) {
        if !self.papers.contains_key(&paper.id) {
            self.order.push(paper.id.clone());
        }
        self.papers.insert(paper.id.clone(), paper);
    }

    /// Append a citation pair
    pub fn insert_citation(&mut self, edge: CitationEdge) {
        self.citations.push(edge);
    }

    pub fn len(&self) -> usize {
        self.papers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.papers.is_empty()
    }
}

impl From<Snapshot> for MemoryStore {
    fn from(snapshot: Snapshot) -> Self {
        let mut store = MemoryStore::new();
        for paper in snapshot.papers {
            store.insert_paper(paper);
        }
        store.citations = snapshot.citations;
        store
    }
}

#[async_trait]
impl PaperStore for MemoryStore {
    async fn get_paper(&self, id: &PaperId) -> Result<Option<Paper>> {
        Ok(self.papers.get(id).cloned())
    }

    async fn iterate_citation_edges(&self) -> Result<Vec<CitationEdge>> {
        Ok(self.citations.clone())
    }

    async fn paper_ids(&self) -> Result<Vec<PaperId>> {
        Ok(self.order.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_lookup() {
        let mut store = MemoryStore::new();
        store.insert_paper(Paper::new("10.1/a").with_title("A"));
        store.insert_paper(Paper::new("10.1/b").with_title("B"));
        store.insert_citation(CitationEdge::new("10.1/b", "10.1/a"));

        let paper = store.get_paper(&PaperId::from("10.1/a")).await.unwrap();
        assert_eq!(paper.map(|p| p.title), Some("A".to_string()));
        assert!(store.get_paper(&PaperId::from("10.1/zz")).await.unwrap().is_none());
        assert_eq!(store.iterate_citation_edges().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_replace_keeps_insertion_order() {
        let mut store = MemoryStore::new();
        store.insert_paper(Paper::new("b"));
        store.insert_paper(Paper::new("a"));
        store.insert_paper(Paper::new("b").with_title("updated"));

        let snapshot = store.load_snapshot().await.unwrap();
        let ids: Vec<&str> = snapshot.papers.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(snapshot.papers[0].title, "updated");
    }

    #[test]
    fn test_snapshot_conversion() {
        let snapshot = Snapshot::new(
            vec![Paper::new("a"), Paper::new("b")],
            vec![CitationEdge::new("b", "a")],
        );
        let store = MemoryStore::from(snapshot);

        let ids = tokio_test::block_on(store.paper_ids()).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&PaperId::from("b")));
    }
}
