//! Inheritance over time
//!
//! Buckets papers by publication date, summarises each bucket and flags
//! innovation bursts: buckets whose mean inheritance factor drops well below
//! the trailing average of the buckets before them.

use crate::comparator::{date_from_epoch_days, days_since_epoch};
use crate::errors::{AnalysisError, Result};
use crate::graph::CitationGraph;
use crate::inheritance::InheritanceMap;
use crate::stats::{self, Summary};
use chrono::{Datelike, NaiveDate};
use paperlineage_common::config::{BucketWidth, EvolutionConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy)]
pub struct EvolutionOptions {
    pub bucket_width: BucketWidth,
    pub burst_threshold: f64,
    pub trailing_window: usize,
    pub min_history: usize,
    pub min_drop: f64,
    pub include_roots: bool,
}

impl Default for EvolutionOptions {
    fn default() -> Self {
        EvolutionConfig::default().into()
    }
}

impl From<EvolutionConfig> for EvolutionOptions {
    fn from(config: EvolutionConfig) -> Self {
        Self {
            bucket_width: config.bucket_width,
            burst_threshold: config.burst_threshold,
            trailing_window: config.trailing_window,
            min_history: config.min_history,
            min_drop: config.min_drop,
            include_roots: config.include_roots,
        }
    }
}

impl EvolutionOptions {
    fn validate(&self) -> Result<()> {
        let width = match self.bucket_width {
            BucketWidth::Years(n) | BucketWidth::Days(n) => n,
        };
        if width == 0 {
            return Err(AnalysisError::InvalidInput("bucket width must be positive".into()));
        }
        if self.trailing_window == 0 {
            return Err(AnalysisError::InvalidInput("trailing window must be positive".into()));
        }
        if !self.burst_threshold.is_finite() || self.burst_threshold < 0.0 {
            return Err(AnalysisError::InvalidInput(format!(
                "burst threshold must be a non-negative number, got {}",
                self.burst_threshold
            )));
        }
        if !self.min_drop.is_finite() || self.min_drop < 0.0 {
            return Err(AnalysisError::InvalidInput(format!(
                "minimum drop must be a non-negative number, got {}",
                self.min_drop
            )));
        }
        Ok(())
    }

    /// Start of the bucket containing `date`, in years or days since the epoch
    fn bucket_key(&self, date: NaiveDate) -> i64 {
        match self.bucket_width {
            BucketWidth::Years(n) => (date.year() as i64).div_euclid(n as i64) * n as i64,
            BucketWidth::Days(n) => days_since_epoch(date).div_euclid(n as i64) * n as i64,
        }
    }

    fn bucket_label(&self, key: i64) -> String {
        match self.bucket_width {
            BucketWidth::Years(1) => key.to_string(),
            BucketWidth::Years(n) => format!("{}-{}", key, key + n as i64 - 1),
            BucketWidth::Days(_) => date_from_epoch_days(key)
                .map(|d| d.to_string())
                .unwrap_or_else(|| format!("day {}", key)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionBucket {
    pub key: i64,
    pub label: String,
    /// Dated papers in the bucket
    pub papers: usize,
    /// Factors contributing to the mean
    pub count: usize,
    pub mean: f64,
    pub variance: f64,
    pub mean_in_degree: f64,
    pub mean_out_degree: f64,
    /// References from this bucket into a later one
    pub temporal_inversions: usize,
    pub trailing_mean: Option<f64>,
    pub trailing_std: Option<f64>,
    pub burst: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvolutionTable {
    pub buckets: Vec<EvolutionBucket>,
    /// Papers without a publication date
    pub undated: usize,
    /// Dated papers left out of the factor statistics
    pub excluded: usize,
    pub categories: BTreeMap<String, Summary>,
}

impl EvolutionTable {
    pub fn bursts(&self) -> impl Iterator<Item = &EvolutionBucket> {
        self.buckets.iter().filter(|b| b.burst)
    }
}

#[derive(Default)]
struct Accumulator {
    papers: usize,
    factors: Vec<f64>,
    in_degree: usize,
    out_degree: usize,
    inversions: usize,
}

/// Bucket papers by date and flag innovation bursts
pub fn analyze_evolution(
    graph: &CitationGraph,
    inheritance: &InheritanceMap,
    options: &EvolutionOptions,
) -> Result<EvolutionTable> {
    options.validate()?;

    let mut table = EvolutionTable::default();
    let mut accumulators: BTreeMap<i64, Accumulator> = BTreeMap::new();
    let mut categories: BTreeMap<String, Vec<f64>> = BTreeMap::new();

    for id in graph.topological_order() {
        if graph.is_sentinel(id.as_str()) {
            continue;
        }
        let Some(date) = graph.published_at(id.as_str()) else {
            table.undated += 1;
            continue;
        };

        let key = options.bucket_key(date);
        let acc = accumulators.entry(key).or_default();
        acc.papers += 1;
        acc.in_degree += graph.in_degree(id.as_str());
        acc.out_degree += graph.out_degree(id.as_str());
        acc.inversions += graph
            .predecessors(id.as_str())
            .filter_map(|p| graph.published_at(p.as_str()))
            .filter(|&d| options.bucket_key(d) > key)
            .count();

        let included = inheritance
            .get(id.as_str())
            .filter(|r| options.include_roots || (r.is_scored() && !r.is_root()));
        match included {
            Some(record) => {
                acc.factors.push(record.factor);
                if let Some(category) = graph.category(id.as_str()) {
                    categories.entry(category.to_string()).or_default().push(record.factor);
                }
            }
            None => table.excluded += 1,
        }
    }

    // Means of earlier non-empty buckets only
    let mut history: Vec<f64> = Vec::new();
    for (key, acc) in accumulators {
        let count = acc.factors.len();
        let mean = stats::mean(&acc.factors);

        let (trailing_mean, trailing_std, burst) = if count > 0 && history.len() >= options.min_history.max(1) {
            let window = &history[history.len().saturating_sub(options.trailing_window)..];
            let trailing_mean = stats::mean(window);
            let trailing_std = stats::sample_variance(window).sqrt();
            let drop = trailing_mean - mean;
            let burst = drop > (options.burst_threshold * trailing_std).max(options.min_drop);
            (Some(trailing_mean), Some(trailing_std), burst)
        } else {
            (None, None, false)
        };

        if burst {
            debug!(bucket = key, mean, ?trailing_mean, "Innovation burst");
        }
        if count > 0 {
            history.push(mean);
        }

        table.buckets.push(EvolutionBucket {
            key,
            label: options.bucket_label(key),
            papers: acc.papers,
            count,
            mean,
            variance: stats::sample_variance(&acc.factors),
            mean_in_degree: acc.in_degree as f64 / acc.papers as f64,
            mean_out_degree: acc.out_degree as f64 / acc.papers as f64,
            temporal_inversions: acc.inversions,
            trailing_mean,
            trailing_std,
            burst,
        });
    }

    table.categories = categories
        .into_iter()
        .map(|(category, values)| (category, Summary::of(&values)))
        .collect();

    info!(
        buckets = table.buckets.len(),
        bursts = table.bursts().count(),
        undated = table.undated,
        "Evolution analyzed"
    );

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inheritance::{InheritanceFlag, InheritanceRecord};
    use crate::graph::build_graph;
    use approx::assert_relative_eq;
    use paperlineage_common::config::GraphPolicy;
    use paperlineage_common::{CitationEdge, Paper, PaperId};
    use proptest::prelude::*;

    fn record(factor: f64) -> InheritanceRecord {
        InheritanceRecord {
            factor,
            flags: Vec::new(),
            predecessors_used: 1,
            predecessors_total: 1,
        }
    }

    fn root() -> InheritanceRecord {
        InheritanceRecord {
            factor: 0.0,
            flags: vec![InheritanceFlag::Root],
            predecessors_used: 0,
            predecessors_total: 0,
        }
    }

    /// One root in 1999 cited by every other paper; `yearly` lists factors per year from 2000
    fn fixture(yearly: &[&[f64]]) -> (CitationGraph, InheritanceMap) {
        let mut papers = vec![Paper::new("root").with_date(NaiveDate::from_ymd_opt(1999, 6, 1).unwrap())];
        let mut edges = Vec::new();
        let mut records = vec![(PaperId::from("root"), root())];

        for (offset, factors) in yearly.iter().enumerate() {
            for (i, &factor) in factors.iter().enumerate() {
                let id = format!("y{}-{}", offset, i);
                let date = NaiveDate::from_ymd_opt(2000 + offset as i32, 3, 1).unwrap();
                papers.push(Paper::new(id.as_str()).with_date(date).with_category(if i % 2 == 0 { "cs.AI" } else { "cs.CL" }));
                edges.push(CitationEdge::new(id.as_str(), "root"));
                records.push((PaperId::new(id), record(factor)));
            }
        }

        let graph = build_graph(&edges, &papers, GraphPolicy::default()).unwrap().graph;
        (graph, records.into_iter().collect())
    }

    #[test]
    fn test_bucket_statistics() {
        let (graph, map) = fixture(&[&[0.8, 0.6], &[0.7]]);
        let table = analyze_evolution(&graph, &map, &EvolutionOptions::default()).unwrap();

        assert_eq!(table.buckets.len(), 3);
        let root_bucket = &table.buckets[0];
        assert_eq!(root_bucket.label, "1999");
        assert_eq!(root_bucket.count, 0);
        assert!(root_bucket.mean.is_nan());
        assert_relative_eq!(root_bucket.mean_in_degree, 3.0);
        assert_eq!(table.excluded, 1);

        let first = &table.buckets[1];
        assert_eq!(first.count, 2);
        assert_relative_eq!(first.mean, 0.7, epsilon = 1e-12);
        assert_relative_eq!(first.variance, 0.02, epsilon = 1e-12);
        assert_relative_eq!(first.mean_out_degree, 1.0);

        assert_eq!(table.buckets[2].variance, 0.0);
        assert_eq!(table.categories["cs.AI"].n, 2);
        assert_eq!(table.categories["cs.CL"].n, 1);
    }

    #[test]
    fn test_include_roots() {
        let (graph, map) = fixture(&[&[0.8]]);
        let options = EvolutionOptions {
            include_roots: true,
            ..Default::default()
        };
        let table = analyze_evolution(&graph, &map, &options).unwrap();
        assert_eq!(table.buckets[0].count, 1);
        assert_eq!(table.buckets[0].mean, 0.0);
        assert_eq!(table.excluded, 0);
    }

    #[test]
    fn test_multi_year_buckets() {
        let (graph, map) = fixture(&[&[0.5], &[0.5], &[0.5], &[0.5]]);
        let options = EvolutionOptions {
            bucket_width: BucketWidth::Years(2),
            ..Default::default()
        };
        let table = analyze_evolution(&graph, &map, &options).unwrap();
        let labels: Vec<&str> = table.buckets.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["1998-1999", "2000-2001", "2002-2003"]);
        assert_eq!(table.buckets[1].count, 2);
    }

    #[test]
    fn test_day_buckets() {
        let options = EvolutionOptions {
            bucket_width: BucketWidth::Days(7),
            ..Default::default()
        };
        // 1970-01-08 is seven days after the epoch
        let date = NaiveDate::from_ymd_opt(1970, 1, 10).unwrap();
        assert_eq!(options.bucket_key(date), 7);
        assert_eq!(options.bucket_label(7), "1970-01-08");
    }

    #[test]
    fn test_burst_detection() {
        let (graph, map) = fixture(&[&[0.80], &[0.82], &[0.81], &[0.40], &[0.79]]);
        let table = analyze_evolution(&graph, &map, &EvolutionOptions::default()).unwrap();

        let bursts: Vec<&str> = table.bursts().map(|b| b.label.as_str()).collect();
        assert_eq!(bursts, vec!["2003"]);

        // Too little history for the first two dated buckets
        assert!(table.buckets[1].trailing_mean.is_none());
        assert!(table.buckets[2].trailing_mean.is_none());
        assert!(table.buckets[3].trailing_mean.is_some());
    }

    #[test]
    fn test_flat_history_needs_min_drop() {
        let (graph, map) = fixture(&[&[0.5], &[0.5], &[0.5], &[0.499]]);
        let table = analyze_evolution(&graph, &map, &EvolutionOptions::default()).unwrap();
        assert_eq!(table.bursts().count(), 0);

        let (graph, map) = fixture(&[&[0.5], &[0.5], &[0.5], &[0.3]]);
        let table = analyze_evolution(&graph, &map, &EvolutionOptions::default()).unwrap();
        assert_eq!(table.bursts().count(), 1);
    }

    #[test]
    fn test_undated_papers_counted() {
        let papers = vec![Paper::new("a"), Paper::new("b").with_date(NaiveDate::from_ymd_opt(2001, 1, 1).unwrap())];
        let edges = vec![CitationEdge::new("b", "a")];
        let graph = build_graph(&edges, &papers, GraphPolicy::default()).unwrap().graph;
        let map: InheritanceMap = [(PaperId::from("a"), root()), (PaperId::from("b"), record(0.9))]
            .into_iter()
            .collect();

        let table = analyze_evolution(&graph, &map, &EvolutionOptions::default()).unwrap();
        assert_eq!(table.undated, 1);
        assert_eq!(table.buckets.len(), 1);
    }

    #[test]
    fn test_temporal_inversions_counted() {
        let papers = vec![
            Paper::new("early").with_date(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()),
            Paper::new("late").with_date(NaiveDate::from_ymd_opt(2005, 1, 1).unwrap()),
        ];
        let edges = vec![CitationEdge::new("early", "late")];
        let graph = build_graph(&edges, &papers, GraphPolicy::default()).unwrap().graph;
        let map: InheritanceMap = [(PaperId::from("late"), root()), (PaperId::from("early"), record(0.9))]
            .into_iter()
            .collect();

        let table = analyze_evolution(&graph, &map, &EvolutionOptions::default()).unwrap();
        assert_eq!(table.buckets[0].temporal_inversions, 1);
        assert_eq!(table.buckets[1].temporal_inversions, 0);
    }

    #[test]
    fn test_invalid_options() {
        let (graph, map) = fixture(&[&[0.5]]);
        let options = EvolutionOptions {
            bucket_width: BucketWidth::Years(0),
            ..Default::default()
        };
        assert!(matches!(
            analyze_evolution(&graph, &map, &options),
            Err(AnalysisError::InvalidInput(_))
        ));

        for min_drop in [f64::NAN, -0.1, f64::INFINITY] {
            let options = EvolutionOptions {
                min_drop,
                ..Default::default()
            };
            assert!(matches!(
                analyze_evolution(&graph, &map, &options),
                Err(AnalysisError::InvalidInput(_))
            ));
        }
    }

    proptest! {
        #[test]
        fn prop_burst_flags_are_causal(
            values in proptest::collection::vec(0.0f64..1.0, 6..12),
            split in 2usize..6,
            seed in any::<u64>(),
        ) {
            let yearly: Vec<Vec<f64>> = values.iter().map(|v| vec![*v]).collect();
            let slices: Vec<&[f64]> = yearly.iter().map(Vec::as_slice).collect();
            let (graph, map) = fixture(&slices);
            let before = analyze_evolution(&graph, &map, &EvolutionOptions::default()).unwrap();

            // Rotate the values after `split`
            let mut permuted = yearly.clone();
            let tail = &mut permuted[split..];
            let len = tail.len();
            tail.rotate_left((seed as usize) % len);
            let slices: Vec<&[f64]> = permuted.iter().map(Vec::as_slice).collect();
            let (graph, map) = fixture(&slices);
            let after = analyze_evolution(&graph, &map, &EvolutionOptions::default()).unwrap();

            // Bucket 0 holds the root; year offset i sits at bucket i + 1
            for i in 0..=split {
                prop_assert_eq!(before.buckets[i].burst, after.buckets[i].burst);
                prop_assert_eq!(before.buckets[i].trailing_mean, after.buckets[i].trailing_mean);
            }
        }
    }
}
