//! Inheritance factor vs. graph metrics
//!
//! Correlates each paper's inheritance factor with its bibliometric
//! indicators, producing one row per (metric, method) pair.

use crate::graph::CitationGraph;
use crate::inheritance::InheritanceMap;
use crate::stats::{self, CorrelationFlag, Summary};
use chrono::{Datelike, NaiveDate};
use paperlineage_common::config::ComparatorConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Days from 0001-01-01 to 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i64 = 719_163;

pub(crate) fn days_since_epoch(date: NaiveDate) -> i64 {
    date.num_days_from_ce() as i64 - UNIX_EPOCH_DAYS_FROM_CE
}

pub(crate) fn date_from_epoch_days(days: i64) -> Option<NaiveDate> {
    i32::try_from(days + UNIX_EPOCH_DAYS_FROM_CE)
        .ok()
        .and_then(NaiveDate::from_num_days_from_ce_opt)
}

/// Name of the factor series in summaries
pub const FACTOR_SERIES: &str = "inheritance_factor";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphMetric {
    InDegree,
    OutDegree,
    /// Reported citation count, else in-degree
    CitationCount,
    /// Days since the Unix epoch; undated papers have no value
    PublicationRecency,
}

impl GraphMetric {
    pub const ALL: [GraphMetric; 4] = [
        GraphMetric::InDegree,
        GraphMetric::OutDegree,
        GraphMetric::CitationCount,
        GraphMetric::PublicationRecency,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            GraphMetric::InDegree => "in_degree",
            GraphMetric::OutDegree => "out_degree",
            GraphMetric::CitationCount => "citation_count",
            GraphMetric::PublicationRecency => "publication_recency",
        }
    }

    pub fn value(&self, graph: &CitationGraph, id: &str) -> Option<f64> {
        if !graph.contains(id) {
            return None;
        }
        match self {
            GraphMetric::InDegree => Some(graph.in_degree(id) as f64),
            GraphMetric::OutDegree => Some(graph.out_degree(id) as f64),
            GraphMetric::CitationCount => Some(graph.citation_count(id) as f64),
            GraphMetric::PublicationRecency => graph.published_at(id).map(|d| days_since_epoch(d) as f64),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationMethod {
    Pearson,
    Spearman,
}

impl CorrelationMethod {
    fn apply(&self, x: &[f64], y: &[f64]) -> Result<f64, CorrelationFlag> {
        match self {
            CorrelationMethod::Pearson => stats::pearson(x, y),
            CorrelationMethod::Spearman => stats::spearman(x, y),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    /// e.g. `inheritance_factor~in_degree`
    pub pair: String,
    pub metric: GraphMetric,
    pub method: CorrelationMethod,
    pub correlation: f64,
    pub p_value: f64,
    pub n: usize,
    pub flags: Vec<CorrelationFlag>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonTable {
    pub rows: Vec<ComparisonRow>,
    /// Per-series summaries keyed by series name
    pub summaries: BTreeMap<String, Summary>,
    /// Papers in the base sample
    pub sample_size: usize,
    /// Papers left out of the sample
    pub excluded: usize,
}

impl ComparisonTable {
    pub fn row(&self, metric: GraphMetric, method: CorrelationMethod) -> Option<&ComparisonRow> {
        self.rows.iter().find(|r| r.metric == metric && r.method == method)
    }
}

#[derive(Debug, Clone)]
pub struct ComparisonOptions {
    /// Leave root papers (factor fixed at 0) out of the sample
    pub exclude_roots: bool,
    pub metrics: Vec<GraphMetric>,
}

impl Default for ComparisonOptions {
    fn default() -> Self {
        Self {
            exclude_roots: true,
            metrics: GraphMetric::ALL.to_vec(),
        }
    }
}

impl From<ComparatorConfig> for ComparisonOptions {
    fn from(config: ComparatorConfig) -> Self {
        Self {
            exclude_roots: config.exclude_roots,
            ..Default::default()
        }
    }
}

/// Correlate inheritance factors with graph metrics
pub fn compare_metrics(graph: &CitationGraph, inheritance: &InheritanceMap, options: &ComparisonOptions) -> ComparisonTable {
    let sample: Vec<(&str, f64)> = inheritance
        .iter()
        .filter(|(id, _)| graph.contains(id.as_str()))
        .filter(|(_, r)| r.is_scored() && !(options.exclude_roots && r.is_root()))
        .map(|(id, r)| (id.as_str(), r.factor))
        .collect();

    let factors: Vec<f64> = sample.iter().map(|(_, f)| *f).collect();
    let mut table = ComparisonTable {
        sample_size: sample.len(),
        excluded: inheritance.len() - sample.len(),
        ..Default::default()
    };
    table.summaries.insert(FACTOR_SERIES.to_string(), Summary::of(&factors));

    for &metric in &options.metrics {
        // Pairs where the metric is defined; undated papers drop out of recency only
        let (x, y): (Vec<f64>, Vec<f64>) = sample
            .iter()
            .filter_map(|&(id, factor)| metric.value(graph, id).map(|m| (factor, m)))
            .unzip();

        table.summaries.insert(metric.name().to_string(), Summary::of(&y));

        for method in [CorrelationMethod::Pearson, CorrelationMethod::Spearman] {
            let (correlation, flags) = match method.apply(&x, &y) {
                Ok(r) => (r, Vec::new()),
                Err(flag) => {
                    debug!(metric = metric.name(), ?method, ?flag, "Correlation undefined");
                    (f64::NAN, vec![flag])
                }
            };

            table.rows.push(ComparisonRow {
                pair: format!("{}~{}", FACTOR_SERIES, metric.name()),
                metric,
                method,
                correlation,
                p_value: stats::correlation_p_value(correlation, x.len()),
                n: x.len(),
                flags,
            });
        }
    }

    info!(
        sample = table.sample_size,
        excluded = table.excluded,
        rows = table.rows.len(),
        "Metrics compared"
    );

    table
}
