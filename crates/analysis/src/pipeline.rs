//! One analysis run end to end
//!
//! graph -> inheritance -> (comparison, evolution), over a snapshot that is
//! already in memory. All I/O happens before [`Pipeline::run`] is called.

use crate::comparator::{compare_metrics, ComparisonOptions, ComparisonTable};
use crate::errors::Result;
use crate::evolution::{analyze_evolution, EvolutionOptions, EvolutionTable};
use crate::graph::{BuildReport, GraphBuilder};
use crate::inheritance::{compute_inheritance_with, EmbeddingTable, InheritanceMap, InheritanceOptions};
use crate::weighting::WeightingPolicy;
use chrono::{DateTime, Utc};
use paperlineage_common::config::AnalysisConfig;
use paperlineage_common::metrics::StageTimer;
use paperlineage_common::{PaperStore, Snapshot, VERSION};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, info_span};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct GraphSummary {
    pub papers: usize,
    pub edges: usize,
    pub report: BuildReport,
}

/// Everything one run produced
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub version: String,
    /// SHA-256 of the input snapshot
    pub snapshot_fingerprint: String,
    pub config: AnalysisConfig,
    pub graph: GraphSummary,
    pub inheritance: InheritanceMap,
    pub comparison: ComparisonTable,
    pub evolution: EvolutionTable,
    /// Seconds per stage
    pub timings: BTreeMap<String, f64>,
}

pub struct Pipeline {
    config: AnalysisConfig,
    weighting: Arc<dyn WeightingPolicy>,
}

impl Pipeline {
    /// Pipeline using the weighting scheme named in `config`
    pub fn new(config: AnalysisConfig) -> Self {
        let weighting: Arc<dyn WeightingPolicy> = Arc::new(config.inheritance.weighting);
        Self { config, weighting }
    }

    /// Replace the configured weighting with a custom policy
    pub fn with_weighting(mut self, weighting: impl WeightingPolicy + 'static) -> Self {
        self.weighting = Arc::new(weighting);
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Load a snapshot from `store` and analyze it
    pub async fn run_store(&self, store: &dyn PaperStore) -> Result<AnalysisReport> {
        let snapshot = store.load_snapshot().await?;
        self.run(&snapshot)
    }

    pub fn run(&self, snapshot: &Snapshot) -> Result<AnalysisReport> {
        let run_id = Uuid::now_v7();
        let span = info_span!("analysis", %run_id);
        let _guard = span.enter();

        info!(
            papers = snapshot.papers.len(),
            citations = snapshot.citations.len(),
            "Starting analysis"
        );

        let fingerprint = snapshot.fingerprint()?;
        let mut timings = BTreeMap::new();

        let timer = StageTimer::start("graph");
        let outcome = GraphBuilder::new(self.config.graph).build(&snapshot.citations, &snapshot.papers)?;
        timings.insert("graph".to_string(), timer.finish());
        let graph = outcome.graph;

        let embeddings: EmbeddingTable = snapshot
            .papers
            .iter()
            .filter_map(|p| p.embedding.as_ref().map(|e| (p.id.clone(), e.clone())))
            .collect();

        let timer = StageTimer::start("inheritance");
        let inheritance = compute_inheritance_with(
            &graph,
            &embeddings,
            self.weighting.as_ref(),
            InheritanceOptions {
                parallel: self.config.inheritance.parallel,
            },
        );
        timings.insert("inheritance".to_string(), timer.finish());

        let timer = StageTimer::start("comparison");
        let comparison = compare_metrics(&graph, &inheritance, &ComparisonOptions::from(self.config.comparator));
        timings.insert("comparison".to_string(), timer.finish());

        let timer = StageTimer::start("evolution");
        let evolution = analyze_evolution(&graph, &inheritance, &EvolutionOptions::from(self.config.evolution))?;
        timings.insert("evolution".to_string(), timer.finish());

        info!(
            scored = inheritance.len(),
            bursts = evolution.bursts().count(),
            "Analysis complete"
        );

        Ok(AnalysisReport {
            run_id,
            generated_at: Utc::now(),
            version: VERSION.to_string(),
            snapshot_fingerprint: fingerprint,
            config: self.config.clone(),
            graph: GraphSummary {
                papers: graph.paper_count(),
                edges: graph.edge_count(),
                report: outcome.report,
            },
            inheritance,
            comparison,
            evolution,
            timings,
        })
    }
}
