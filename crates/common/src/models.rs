//! Core paper and citation types
//!
//! These are the in-memory shapes every store produces and every analysis
//! stage consumes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Paper identifier (usually a DOI, sometimes an arXiv id)
///
/// Ordered lexicographically; graph tie-breaks rely on this ordering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaperId(String);

impl PaperId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaperId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PaperId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for PaperId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for PaperId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A scraped paper with its (optional) embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    /// Unique identifier
    pub id: PaperId,

    /// Paper title
    #[serde(default)]
    pub title: String,

    /// Abstract text, possibly still carrying JATS markup from Crossref
    #[serde(default, rename = "abstract")]
    pub abstract_text: String,

    #[serde(default)]
    pub authors: Vec<String>,

    /// Field or subject category (e.g. "cs.AI")
    #[serde(default)]
    pub category: Option<String>,

    /// Publication date
    #[serde(default)]
    pub published_at: Option<NaiveDate>,

    /// Citation count reported by the upstream source
    #[serde(default)]
    pub citation_count: Option<u64>,

    /// Dense embedding of title + abstract
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

impl Paper {
    /// Create a paper with only an identifier
    pub fn new(id: impl Into<PaperId>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            abstract_text: String::new(),
            authors: Vec::new(),
            category: None,
            published_at: None,
            citation_count: None,
            embedding: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_abstract(mut self, abstract_text: impl Into<String>) -> Self {
        self.abstract_text = abstract_text.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.published_at = Some(date);
        self
    }

    pub fn with_citation_count(mut self, count: u64) -> Self {
        self.citation_count = Some(count);
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Whether the paper already carries an embedding
    pub fn is_embedded(&self) -> bool {
        self.embedding.as_ref().is_some_and(|e| !e.is_empty())
    }
}

/// Directed citation: `citing` references `cited`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitationEdge {
    /// Paper that contains the reference
    pub citing: PaperId,

    /// Paper being referenced
    pub cited: PaperId,

    /// Extraction confidence in [0, 1], when the scraper reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl CitationEdge {
    pub fn new(citing: impl Into<PaperId>, cited: impl Into<PaperId>) -> Self {
        Self {
            citing: citing.into(),
            cited: cited.into(),
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Self-citation of a paper to itself
    pub fn is_self_loop(&self) -> bool {
        self.citing == self.cited
    }
}
