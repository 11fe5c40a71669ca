//! Citation graph construction
//!
//! Builds the in-memory citation DAG for one analysis run from a list of
//! citing -> cited pairs and the set of known papers. Scraped reference data
//! is noisy, so construction validates every edge and records what it had to
//! drop in a [`BuildReport`] instead of failing, unless a fail-fast policy is
//! configured.
//!
//! Node indices follow the lexicographic order of paper identifiers, which
//! makes traversal order, cycle exclusion and the topological order
//! deterministic for a given input.

use crate::errors::{AnalysisError, Result};
use chrono::NaiveDate;
use paperlineage_common::config::{CyclePolicy, GraphPolicy, TemporalPolicy, UnknownIdPolicy};
use paperlineage_common::metrics;
use paperlineage_common::{CitationEdge, Paper, PaperId};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet, VecDeque};
use tracing::{debug, info, warn};

/// Metadata the graph keeps per known paper
#[derive(Debug, Clone, Default)]
struct NodeMeta {
    published_at: Option<NaiveDate>,
    category: Option<String>,
    citation_count: Option<u64>,
}

/// A citing -> cited pair in reports
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeRef {
    pub citing: PaperId,
    pub cited: PaperId,
}

impl EdgeRef {
    fn new(citing: &PaperId, cited: &PaperId) -> Self {
        Self {
            citing: citing.clone(),
            cited: cited.clone(),
        }
    }
}

/// A cycle found during construction and the edge removed to break it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    /// Shortest cycle through the excluded edge, in citation order
    pub cycle: Vec<PaperId>,
    pub excluded_edge: EdgeRef,
}

/// What graph construction dropped, merged or flagged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildReport {
    pub edges_in: usize,
    pub edges_kept: usize,
    pub unknown_edges: Vec<EdgeRef>,
    pub self_loops: Vec<PaperId>,
    pub duplicates: usize,
    /// Edges whose cited paper is dated after the citing paper
    pub temporal_inversions: Vec<EdgeRef>,
    pub temporal_dropped: bool,
    pub cycles: Vec<CycleReport>,
    pub sentinels: Vec<PaperId>,
}

impl BuildReport {
    /// Whether construction had to correct anything
    pub fn is_clean(&self) -> bool {
        self.unknown_edges.is_empty()
            && self.self_loops.is_empty()
            && self.temporal_inversions.is_empty()
            && self.cycles.is_empty()
            && self.sentinels.is_empty()
    }
}

/// Graph plus construction report
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub graph: CitationGraph,
    pub report: BuildReport,
}

/// Immutable citation DAG
#[derive(Debug, Clone)]
pub struct CitationGraph {
    /// Node identifiers, sorted
    ids: Vec<PaperId>,

    index: HashMap<PaperId, usize>,

    /// `None` for sentinel nodes standing in for unknown papers
    meta: Vec<Option<NodeMeta>>,

    /// Adjacency list: node -> nodes it cites
    outgoing: Vec<Vec<usize>>,

    /// Reverse adjacency: node -> nodes citing it
    incoming: Vec<Vec<usize>>,

    confidence: HashMap<(usize, usize), f64>,

    /// Cited papers before the papers citing them
    topo: Vec<usize>,
}

/// Build a citation DAG
pub fn build_graph(edges: &[CitationEdge], papers: &[Paper], policy: GraphPolicy) -> Result<BuildOutcome> {
    GraphBuilder::new(policy).build(edges, papers)
}

/// Citation graph builder
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    policy: GraphPolicy,
}

/// Accepted edge before index assignment
struct PendingEdge {
    citing: PaperId,
    cited: PaperId,
    confidence: Option<f64>,
}

impl GraphBuilder {
    pub fn new(policy: GraphPolicy) -> Self {
        Self { policy }
    }

    pub fn build(&self, edges: &[CitationEdge], papers: &[Paper]) -> Result<BuildOutcome> {
        let mut report = BuildReport {
            edges_in: edges.len(),
            temporal_dropped: self.policy.temporal == TemporalPolicy::Drop,
            ..Default::default()
        };

        let mut known: HashMap<&PaperId, NodeMeta> = HashMap::with_capacity(papers.len());
        for paper in papers {
            known.entry(&paper.id).or_insert_with(|| NodeMeta {
                published_at: paper.published_at,
                category: paper.category.clone(),
                citation_count: paper.citation_count,
            });
        }

        let mut sentinels: BTreeSet<PaperId> = BTreeSet::new();
        let mut pending: Vec<PendingEdge> = Vec::with_capacity(edges.len());
        // Every distinct pair seen so far; `None` when the first copy was dropped
        let mut seen: HashMap<(&PaperId, &PaperId), Option<usize>> = HashMap::with_capacity(edges.len());

        for edge in edges {
            if edge.is_self_loop() {
                report.self_loops.push(edge.citing.clone());
                continue;
            }

            let key = (&edge.citing, &edge.cited);
            if let Some(&slot) = seen.get(&key) {
                report.duplicates += 1;
                if let Some(at) = slot {
                    let existing = &mut pending[at].confidence;
                    *existing = match (*existing, edge.confidence) {
                        (Some(a), Some(b)) => Some(a.max(b)),
                        (a, b) => a.or(b),
                    };
                }
                continue;
            }

            let missing = [&edge.citing, &edge.cited]
                .into_iter()
                .filter(|id| !known.contains_key(id))
                .cloned()
                .collect::<Vec<_>>();

            if !missing.is_empty() {
                match self.policy.unknown_ids {
                    UnknownIdPolicy::Drop => {
                        report.unknown_edges.push(EdgeRef::new(&edge.citing, &edge.cited));
                        seen.insert(key, None);
                        continue;
                    }
                    UnknownIdPolicy::FailFast => {
                        return Err(AnalysisError::UnknownIdentifier {
                            citing: edge.citing.clone(),
                            cited: edge.cited.clone(),
                            missing: missing[0].clone(),
                        });
                    }
                    UnknownIdPolicy::Sentinel => {
                        report.unknown_edges.push(EdgeRef::new(&edge.citing, &edge.cited));
                        sentinels.extend(missing);
                    }
                }
            }

            let citing_date = known.get(&edge.citing).and_then(|m| m.published_at);
            let cited_date = known.get(&edge.cited).and_then(|m| m.published_at);
            if let (Some(citing_date), Some(cited_date)) = (citing_date, cited_date) {
                if cited_date > citing_date {
                    report.temporal_inversions.push(EdgeRef::new(&edge.citing, &edge.cited));
                    if self.policy.temporal == TemporalPolicy::Drop {
                        seen.insert(key, None);
                        continue;
                    }
                }
            }

            seen.insert(key, Some(pending.len()));
            pending.push(PendingEdge {
                citing: edge.citing.clone(),
                cited: edge.cited.clone(),
                confidence: edge.confidence,
            });
        }

        // Sorted node set: known papers plus sentinels
        let mut ids: Vec<PaperId> = known.keys().map(|id| (*id).clone()).collect();
        ids.extend(sentinels.iter().cloned());
        ids.sort();
        ids.dedup();

        let index: HashMap<PaperId, usize> = ids.iter().enumerate().map(|(i, id)| (id.clone(), i)).collect();
        let meta: Vec<Option<NodeMeta>> = ids.iter().map(|id| known.get(id).cloned()).collect();

        let n = ids.len();
        let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut confidence: HashMap<(usize, usize), f64> = HashMap::new();
        for edge in &pending {
            let (from, to) = (index[&edge.citing], index[&edge.cited]);
            outgoing[from].push(to);
            if let Some(c) = edge.confidence {
                confidence.insert((from, to), c);
            }
        }
        for targets in &mut outgoing {
            targets.sort_unstable();
        }

        let removed = self.break_cycles(&ids, &mut outgoing, &mut report)?;
        confidence.retain(|edge, _| !removed.contains(edge));

        let mut incoming: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (from, targets) in outgoing.iter().enumerate() {
            for &to in targets {
                incoming[to].push(from);
            }
        }

        let topo = topological_order(&outgoing, &incoming);

        report.edges_kept = outgoing.iter().map(Vec::len).sum();
        report.sentinels = sentinels.into_iter().collect();

        let graph = CitationGraph {
            ids,
            index,
            meta,
            outgoing,
            incoming,
            confidence,
            topo,
        };

        metrics::record_graph(graph.paper_count(), report.edges_kept);
        if self.policy.unknown_ids == UnknownIdPolicy::Drop {
            metrics::record_rejected_edges("unknown_id", report.unknown_edges.len());
        }
        metrics::record_rejected_edges("self_loop", report.self_loops.len());
        metrics::record_rejected_edges("cycle", report.cycles.len());
        if report.temporal_dropped {
            metrics::record_rejected_edges("temporal", report.temporal_inversions.len());
        }

        if !report.is_clean() {
            warn!(
                unknown = report.unknown_edges.len(),
                self_loops = report.self_loops.len(),
                temporal_inversions = report.temporal_inversions.len(),
                cycles = report.cycles.len(),
                sentinels = report.sentinels.len(),
                "Citation graph built with corrections"
            );
        }
        info!(
            papers = graph.paper_count(),
            edges = report.edges_kept,
            "Citation graph built"
        );

        Ok(BuildOutcome { graph, report })
    }

    /// Depth-first search with a visiting marker; every back edge closes a
    /// cycle and is removed (or reported, under fail-fast).
    fn break_cycles(
        &self,
        ids: &[PaperId],
        outgoing: &mut [Vec<usize>],
        report: &mut BuildReport,
    ) -> Result<HashSet<(usize, usize)>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            Visiting,
            Done,
        }

        let n = ids.len();
        let mut marks = vec![Mark::Unvisited; n];
        let mut removed: HashSet<(usize, usize)> = HashSet::new();

        for root in 0..n {
            if marks[root] != Mark::Unvisited {
                continue;
            }

            // (node, position of the next child to explore)
            let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
            marks[root] = Mark::Visiting;

            while let Some(top) = stack.last_mut() {
                let node = top.0;
                if top.1 >= outgoing[node].len() {
                    marks[node] = Mark::Done;
                    stack.pop();
                    continue;
                }

                let child = outgoing[node][top.1];
                top.1 += 1;

                match marks[child] {
                    Mark::Unvisited => {
                        marks[child] = Mark::Visiting;
                        stack.push((child, 0));
                    }
                    Mark::Visiting => {
                        let cycle = shortest_cycle(outgoing, &removed, node, child)
                            .into_iter()
                            .map(|i| ids[i].clone())
                            .collect::<Vec<_>>();
                        let offending = (ids[node].clone(), ids[child].clone());

                        if self.policy.cycles == CyclePolicy::FailFast {
                            return Err(AnalysisError::Cycle {
                                cycle,
                                offending_edge: offending,
                            });
                        }

                        debug!(citing = %offending.0, cited = %offending.1, "Excluding cycle edge");
                        removed.insert((node, child));
                        report.cycles.push(CycleReport {
                            cycle,
                            excluded_edge: EdgeRef::new(&offending.0, &offending.1),
                        });
                    }
                    Mark::Done => {}
                }
            }
        }

        if !removed.is_empty() {
            for (from, targets) in outgoing.iter_mut().enumerate() {
                targets.retain(|&to| !removed.contains(&(from, to)));
            }
        }

        Ok(removed)
    }
}

/// Shortest path `to -> ... -> from` over live edges, which together with the
/// back edge `from -> to` forms the smallest cycle through that edge
fn shortest_cycle(outgoing: &[Vec<usize>], removed: &HashSet<(usize, usize)>, from: usize, to: usize) -> Vec<usize> {
    let mut parent: HashMap<usize, usize> = HashMap::new();
    let mut queue = VecDeque::from([to]);
    let mut visited: HashSet<usize> = HashSet::from([to]);

    while let Some(current) = queue.pop_front() {
        if current == from {
            let mut path = vec![from];
            let mut cursor = from;
            while cursor != to {
                cursor = parent[&cursor];
                path.push(cursor);
            }
            path.reverse();
            return path;
        }
        for &next in &outgoing[current] {
            if removed.contains(&(current, next)) || !visited.insert(next) {
                continue;
            }
            parent.insert(next, current);
            queue.push_back(next);
        }
    }

    // The DFS stack guarantees a path exists; fall back to the edge itself
    vec![to, from]
}

/// Kahn's algorithm over "cited before citing", smallest index first
fn topological_order(outgoing: &[Vec<usize>], incoming: &[Vec<usize>]) -> Vec<usize> {
    let mut remaining: Vec<usize> = outgoing.iter().map(Vec::len).collect();
    let mut ready: BinaryHeap<Reverse<usize>> = remaining
        .iter()
        .enumerate()
        .filter(|(_, &r)| r == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut order = Vec::with_capacity(outgoing.len());
    while let Some(Reverse(node)) = ready.pop() {
        order.push(node);
        for &citing in &incoming[node] {
            remaining[citing] -= 1;
            if remaining[citing] == 0 {
                ready.push(Reverse(citing));
            }
        }
    }
    order
}

impl CitationGraph {
    pub(crate) fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub(crate) fn id_at(&self, index: usize) -> &PaperId {
        &self.ids[index]
    }

    pub(crate) fn predecessor_indices(&self, index: usize) -> &[usize] {
        &self.outgoing[index]
    }

    pub(crate) fn node_count(&self) -> usize {
        self.ids.len()
    }

    pub(crate) fn is_sentinel_index(&self, index: usize) -> bool {
        self.meta[index].is_none()
    }

    pub(crate) fn published_at_index(&self, index: usize) -> Option<NaiveDate> {
        self.meta[index].as_ref().and_then(|m| m.published_at)
    }

    pub(crate) fn in_degree_index(&self, index: usize) -> usize {
        self.incoming[index].len()
    }

    pub(crate) fn out_degree_index(&self, index: usize) -> usize {
        self.outgoing[index].len()
    }

    pub(crate) fn confidence_index(&self, citing: usize, cited: usize) -> Option<f64> {
        self.confidence.get(&(citing, cited)).copied()
    }

    /// Known papers (sentinels excluded), sorted by identifier
    pub fn papers(&self) -> impl Iterator<Item = &PaperId> {
        self.ids
            .iter()
            .zip(&self.meta)
            .filter(|(_, m)| m.is_some())
            .map(|(id, _)| id)
    }

    /// Number of known papers
    pub fn paper_count(&self) -> usize {
        self.meta.iter().filter(|m| m.is_some()).count()
    }

    pub fn edge_count(&self) -> usize {
        self.outgoing.iter().map(Vec::len).sum()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Whether `id` is a placeholder for an unknown cited paper
    pub fn is_sentinel(&self, id: &str) -> bool {
        self.index_of(id).is_some_and(|i| self.is_sentinel_index(i))
    }

    /// Papers cited by this paper
    pub fn predecessors(&self, id: &str) -> impl Iterator<Item = &PaperId> {
        self.neighbors(id, &self.outgoing)
    }

    /// Papers citing this paper
    pub fn successors(&self, id: &str) -> impl Iterator<Item = &PaperId> {
        self.neighbors(id, &self.incoming)
    }

    fn neighbors<'a>(&'a self, id: &str, adjacency: &'a [Vec<usize>]) -> impl Iterator<Item = &'a PaperId> {
        self.index_of(id)
            .map(|i| adjacency[i].as_slice())
            .unwrap_or(&[])
            .iter()
            .map(|&j| &self.ids[j])
    }

    /// Times this paper is cited within the graph
    pub fn in_degree(&self, id: &str) -> usize {
        self.index_of(id).map(|i| self.incoming[i].len()).unwrap_or(0)
    }

    /// References this paper makes within the graph
    pub fn out_degree(&self, id: &str) -> usize {
        self.index_of(id).map(|i| self.outgoing[i].len()).unwrap_or(0)
    }

    /// Citation count reported upstream, falling back to in-degree
    pub fn citation_count(&self, id: &str) -> usize {
        self.index_of(id)
            .and_then(|i| self.meta[i].as_ref())
            .and_then(|m| m.citation_count)
            .map(|c| c as usize)
            .unwrap_or_else(|| self.in_degree(id))
    }

    pub fn edge_confidence(&self, citing: &str, cited: &str) -> Option<f64> {
        let (from, to) = (self.index_of(citing)?, self.index_of(cited)?);
        self.confidence_index(from, to)
    }

    pub fn published_at(&self, id: &str) -> Option<NaiveDate> {
        self.index_of(id).and_then(|i| self.published_at_index(i))
    }

    pub fn category(&self, id: &str) -> Option<&str> {
        self.index_of(id)
            .and_then(|i| self.meta[i].as_ref())
            .and_then(|m| m.category.as_deref())
    }

    /// Every node after all the papers it cites; ties broken by identifier
    pub fn topological_order(&self) -> impl Iterator<Item = &PaperId> {
        self.topo.iter().map(|&i| &self.ids[i])
    }

    /// Papers reachable from `start` within `depth` hops, with their distance
    pub fn traverse(&self, start: &str, depth: usize, direction: TraversalDirection) -> Vec<(PaperId, usize)> {
        let Some(start) = self.index_of(start) else {
            return Vec::new();
        };

        let mut visited = HashSet::from([start]);
        let mut result = Vec::new();
        let mut queue = VecDeque::from([(start, 0usize)]);

        while let Some((current, current_depth)) = queue.pop_front() {
            if current != start {
                result.push((self.ids[current].clone(), current_depth));
            }
            if current_depth == depth {
                continue;
            }

            let forward = matches!(direction, TraversalDirection::Forward | TraversalDirection::Both);
            let backward = matches!(direction, TraversalDirection::Backward | TraversalDirection::Both);
            let neighbors = forward
                .then(|| self.outgoing[current].iter())
                .into_iter()
                .flatten()
                .chain(backward.then(|| self.incoming[current].iter()).into_iter().flatten());

            for &neighbor in neighbors {
                if visited.insert(neighbor) {
                    queue.push_back((neighbor, current_depth + 1));
                }
            }
        }

        result
    }
}

/// Direction for graph traversal
#[derive(Debug, Clone, Copy)]
pub enum TraversalDirection {
    /// Follow references (papers cited by this paper)
    Forward,
    /// Follow citations (papers citing this paper)
    Backward,
    /// Both directions
    Both,
}
