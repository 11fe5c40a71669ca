//! PaperLineage analysis core
//!
//! Citation-aware inheritance analysis over a snapshot of papers:
//! - Citation DAG construction with unknown-id, cycle and temporal policies
//! - Inheritance factor per paper against its weighted predecessors
//! - Correlation of inheritance with bibliometric indicators
//! - Evolution over time with innovation-burst detection
//! - Similarity, clustering and dimension reduction of the embedding space

pub mod clustering;
pub mod comparator;
pub mod errors;
pub mod evolution;
pub mod graph;
pub mod inheritance;
pub mod pipeline;
pub mod reduction;
pub mod similarity;
pub mod stats;
pub mod vector;
pub mod weighting;

pub use comparator::{compare_metrics, ComparisonOptions, ComparisonTable, CorrelationMethod, GraphMetric};
pub use errors::{AnalysisError, Result};
pub use evolution::{analyze_evolution, EvolutionOptions, EvolutionTable};
pub use graph::{build_graph, BuildOutcome, BuildReport, CitationGraph, GraphBuilder};
pub use inheritance::{
    compute_inheritance, compute_inheritance_with, EmbeddingTable, InheritanceFlag, InheritanceMap,
    InheritanceOptions, InheritanceRecord,
};
pub use pipeline::{AnalysisReport, Pipeline};
pub use reduction::Reducer;
pub use stats::CorrelationFlag;
pub use weighting::{WeightContext, WeightingPolicy};
