//! Inheritance factor computation
//!
//! For every paper, the factor measures how much of its content points in the
//! same direction as the weighted average of the papers it cites:
//! `(cos(e(P), avg) + 1) / 2`, in [0, 1]. Root papers score 0.
//!
//! Scoring is independent per paper and never fails; degenerate inputs are
//! reported through [`InheritanceFlag`]s on the record.

use crate::graph::CitationGraph;
use crate::vector::{self, NORM_EPSILON};
use crate::weighting::{sanitize, WeightContext, WeightingPolicy};
use paperlineage_common::metrics;
use paperlineage_common::PaperId;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Paper embeddings keyed by id
pub type EmbeddingTable = HashMap<PaperId, Vec<f32>>;

/// Diagnostic attached to an inheritance record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InheritanceFlag {
    /// No usable predecessors; factor fixed at 0
    Root,
    /// Some predecessors were skipped (unknown, unembedded or mismatched)
    DanglingPredecessors,
    /// Degenerate embedding or predecessor average; factor fixed at 0
    ZeroNormEmbedding,
    /// Paper has no embedding; factor fixed at 0
    MissingEmbedding,
    /// Policy produced no positive weight; uniform weights used instead
    ZeroWeight,
}

impl InheritanceFlag {
    pub const ALL: [InheritanceFlag; 5] = [
        InheritanceFlag::Root,
        InheritanceFlag::DanglingPredecessors,
        InheritanceFlag::ZeroNormEmbedding,
        InheritanceFlag::MissingEmbedding,
        InheritanceFlag::ZeroWeight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InheritanceFlag::Root => "root",
            InheritanceFlag::DanglingPredecessors => "dangling_predecessors",
            InheritanceFlag::ZeroNormEmbedding => "zero_norm_embedding",
            InheritanceFlag::MissingEmbedding => "missing_embedding",
            InheritanceFlag::ZeroWeight => "zero_weight",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InheritanceRecord {
    pub factor: f64,
    pub flags: Vec<InheritanceFlag>,
    /// Predecessors that contributed to the weighted average
    pub predecessors_used: usize,
    /// Predecessors in the graph, including skipped ones
    pub predecessors_total: usize,
}

impl InheritanceRecord {
    fn zero(flags: Vec<InheritanceFlag>, used: usize, total: usize) -> Self {
        let mut record = Self {
            factor: 0.0,
            flags,
            predecessors_used: used,
            predecessors_total: total,
        };
        record.flags.sort_unstable();
        record.flags.dedup();
        record
    }

    pub fn has_flag(&self, flag: InheritanceFlag) -> bool {
        self.flags.contains(&flag)
    }

    pub fn is_root(&self) -> bool {
        self.has_flag(InheritanceFlag::Root)
    }

    /// Whether the paper's own embedding was usable
    pub fn is_scored(&self) -> bool {
        !self.has_flag(InheritanceFlag::MissingEmbedding) && !self.has_flag(InheritanceFlag::ZeroNormEmbedding)
    }
}

/// Inheritance records for every known paper, ordered by id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InheritanceMap {
    records: BTreeMap<PaperId, InheritanceRecord>,
}

impl InheritanceMap {
    pub fn get(&self, id: &str) -> Option<&InheritanceRecord> {
        self.records.get(id)
    }

    pub fn factor(&self, id: &str) -> Option<f64> {
        self.get(id).map(|r| r.factor)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PaperId, &InheritanceRecord)> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records carrying `flag`
    pub fn count_flag(&self, flag: InheritanceFlag) -> usize {
        self.records.values().filter(|r| r.has_flag(flag)).count()
    }
}

impl FromIterator<(PaperId, InheritanceRecord)> for InheritanceMap {
    fn from_iter<I: IntoIterator<Item = (PaperId, InheritanceRecord)>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct InheritanceOptions {
    /// Shard papers across the rayon pool
    pub parallel: bool,
}

impl Default for InheritanceOptions {
    fn default() -> Self {
        Self { parallel: true }
    }
}

/// Compute the inheritance factor of every known paper in `graph`
pub fn compute_inheritance<W>(graph: &CitationGraph, embeddings: &EmbeddingTable, weighting: &W) -> InheritanceMap
where
    W: WeightingPolicy + ?Sized,
{
    compute_inheritance_with(graph, embeddings, weighting, InheritanceOptions::default())
}

pub fn compute_inheritance_with<W>(
    graph: &CitationGraph,
    embeddings: &EmbeddingTable,
    weighting: &W,
    options: InheritanceOptions,
) -> InheritanceMap
where
    W: WeightingPolicy + ?Sized,
{
    let scorer = Scorer {
        graph,
        embeddings,
        weighting,
    };

    let nodes = (0..graph.node_count()).filter(|&i| !graph.is_sentinel_index(i));
    let map: InheritanceMap = if options.parallel {
        nodes
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|i| (graph.id_at(i).clone(), scorer.score(i)))
            .collect::<Vec<_>>()
            .into_iter()
            .collect()
    } else {
        nodes.map(|i| (graph.id_at(i).clone(), scorer.score(i))).collect()
    };

    metrics::record_scored(map.len());
    for flag in InheritanceFlag::ALL {
        metrics::record_flag(flag.as_str(), map.count_flag(flag));
    }

    info!(
        papers = map.len(),
        roots = map.count_flag(InheritanceFlag::Root),
        dangling = map.count_flag(InheritanceFlag::DanglingPredecessors),
        missing = map.count_flag(InheritanceFlag::MissingEmbedding),
        zero_norm = map.count_flag(InheritanceFlag::ZeroNormEmbedding),
        parallel = options.parallel,
        "Inheritance factors computed"
    );

    map
}

/// Normalise weights to sum to 1; all-zero input falls back to uniform.
/// The flag is true when the fallback was used.
pub fn normalized_weights(raw: &[f64]) -> (Vec<f64>, bool) {
    let cleaned: Vec<f64> = raw.iter().copied().map(sanitize).collect();
    let total: f64 = cleaned.iter().sum();

    if raw.is_empty() {
        return (Vec::new(), false);
    }
    if !(total > 0.0) || !total.is_finite() {
        let uniform = 1.0 / raw.len() as f64;
        return (vec![uniform; raw.len()], true);
    }
    (cleaned.into_iter().map(|w| w / total).collect(), false)
}

struct Scorer<'a, W: ?Sized> {
    graph: &'a CitationGraph,
    embeddings: &'a EmbeddingTable,
    weighting: &'a W,
}

impl<W: WeightingPolicy + ?Sized> Scorer<'_, W> {
    fn score(&self, index: usize) -> InheritanceRecord {
        let graph = self.graph;
        let id = graph.id_at(index);
        let predecessors = graph.predecessor_indices(index);
        let total = predecessors.len();

        let own = self.embeddings.get(id);
        let mut flags = Vec::new();
        match own {
            None => flags.push(InheritanceFlag::MissingEmbedding),
            Some(e) if !vector::is_well_formed(e) => flags.push(InheritanceFlag::ZeroNormEmbedding),
            Some(_) => {}
        }

        if total == 0 {
            flags.push(InheritanceFlag::Root);
            return InheritanceRecord::zero(flags, 0, 0);
        }
        let Some(own) = own.filter(|_| flags.is_empty()) else {
            return InheritanceRecord::zero(flags, 0, total);
        };

        // Predecessors with a usable embedding of matching dimension
        let usable: Vec<(usize, &Vec<f32>)> = predecessors
            .iter()
            .filter(|&&p| !graph.is_sentinel_index(p))
            .filter_map(|&p| self.embeddings.get(graph.id_at(p)).map(|e| (p, e)))
            .filter(|(_, e)| e.len() == own.len() && e.iter().all(|x| x.is_finite()))
            .collect();

        if usable.len() < total {
            flags.push(InheritanceFlag::DanglingPredecessors);
        }
        if usable.is_empty() {
            flags.push(InheritanceFlag::Root);
            return InheritanceRecord::zero(flags, 0, total);
        }

        let raw: Vec<f64> = usable
            .iter()
            .map(|&(p, _)| {
                self.weighting.weight(&WeightContext {
                    citing: id,
                    cited: graph.id_at(p),
                    citing_date: graph.published_at_index(index),
                    cited_date: graph.published_at_index(p),
                    cited_in_degree: graph.in_degree_index(p),
                    cited_out_degree: graph.out_degree_index(p),
                    confidence: graph.confidence_index(index, p),
                })
            })
            .collect();
        let (weights, fallback) = normalized_weights(&raw);
        if fallback {
            flags.push(InheritanceFlag::ZeroWeight);
        }

        let mut average = vec![0.0f64; own.len()];
        for ((_, embedding), w) in usable.iter().zip(&weights) {
            for (acc, &x) in average.iter_mut().zip(embedding.iter()) {
                *acc += w * x as f64;
            }
        }

        let used = usable.len();
        let average_norm = average.iter().map(|x| x * x).sum::<f64>().sqrt();
        let cosine = if average_norm > NORM_EPSILON {
            vector::cosine_f64(own, &average)
        } else {
            None
        };

        match cosine {
            Some(cos) => {
                flags.sort_unstable();
                flags.dedup();
                InheritanceRecord {
                    factor: ((cos + 1.0) / 2.0).clamp(0.0, 1.0),
                    flags,
                    predecessors_used: used,
                    predecessors_total: total,
                }
            }
            None => {
                debug!(paper = %id, "Degenerate predecessor average");
                flags.push(InheritanceFlag::ZeroNormEmbedding);
                InheritanceRecord::zero(flags, used, total)
            }
        }
    }
}
