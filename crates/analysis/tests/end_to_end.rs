//! Snapshot file in, analysis report out

use approx::assert_relative_eq;
use chrono::NaiveDate;
use paperlineage_analysis::{
    build_graph, compute_inheritance, AnalysisError, CorrelationMethod, GraphMetric, InheritanceFlag, Pipeline,
};
use paperlineage_common::config::{AnalysisConfig, GraphPolicy, UnknownIdPolicy, WeightingScheme};
use paperlineage_common::{CitationEdge, MemoryStore, Paper, Snapshot};

fn day(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap()
}

/// A is cited by B (same direction) and by C (orthogonal)
fn three_papers() -> Snapshot {
    Snapshot::new(
        vec![
            Paper::new("A").with_date(day(2001, 1)).with_embedding(vec![1.0, 0.0]),
            Paper::new("B").with_date(day(2002, 1)).with_embedding(vec![1.0, 0.0]),
            Paper::new("C").with_date(day(2003, 1)).with_embedding(vec![0.0, 1.0]),
        ],
        vec![CitationEdge::new("B", "A"), CitationEdge::new("C", "A")],
    )
}

/// Six papers, each citing the two before it; p3 switches topic
fn lineage() -> Snapshot {
    let embeddings = [
        vec![1.0, 0.0, 0.0],
        vec![0.9, 0.1, 0.0],
        vec![0.8, 0.2, 0.1],
        vec![0.0, 0.0, 1.0],
        vec![0.1, 0.0, 0.9],
        vec![0.2, 0.1, 0.8],
    ];
    let papers: Vec<Paper> = embeddings
        .iter()
        .enumerate()
        .map(|(i, e)| {
            Paper::new(format!("p{}", i))
                .with_date(day(2000 + i as i32, 6))
                .with_category(if i < 3 { "cs.LG" } else { "cs.CL" })
                .with_embedding(e.clone())
        })
        .collect();

    let mut citations = Vec::new();
    for i in 1..papers.len() {
        citations.push(CitationEdge::new(format!("p{}", i), format!("p{}", i - 1)));
        if i >= 2 {
            citations.push(CitationEdge::new(format!("p{}", i), format!("p{}", i - 2)));
        }
    }
    Snapshot::new(papers, citations)
}

#[tokio::test]
async fn test_snapshot_file_round_trip_through_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.json");
    three_papers().save(&path).await.unwrap();

    let snapshot = Snapshot::load(&path).await.unwrap();
    let report = Pipeline::new(AnalysisConfig::default()).run(&snapshot).unwrap();

    let a = report.inheritance.get("A").unwrap();
    assert!(a.is_root());
    assert_eq!(a.factor, 0.0);
    assert_relative_eq!(report.inheritance.factor("B").unwrap(), 1.0);
    assert_relative_eq!(report.inheritance.factor("C").unwrap(), 0.5);
    assert_eq!(report.snapshot_fingerprint, three_papers().fingerprint().unwrap());
}

#[tokio::test]
async fn test_pipeline_over_memory_store() {
    let store = MemoryStore::from(lineage());
    let report = Pipeline::new(AnalysisConfig::default()).run_store(&store).await.unwrap();

    assert_eq!(report.graph.papers, 6);
    assert_eq!(report.graph.edges, 9);
    assert!(report.graph.report.is_clean());
    assert_eq!(report.inheritance.count_flag(InheritanceFlag::Root), 1);

    // p3 changes topic, so it inherits least among non-roots
    let p3 = report.inheritance.factor("p3").unwrap();
    for id in ["p1", "p2", "p4", "p5"] {
        assert!(report.inheritance.factor(id).unwrap() > p3, "{} should exceed p3", id);
    }

    // The 2000 bucket holds only the root, so it is present but empty
    assert_eq!(report.evolution.buckets.len(), 6);
    assert_eq!(report.evolution.buckets[0].count, 0);
    assert_eq!(report.evolution.buckets.iter().filter(|b| b.count > 0).count(), 5);
    let categories: Vec<&str> = report.evolution.categories.keys().map(String::as_str).collect();
    assert_eq!(categories, vec!["cs.CL", "cs.LG"]);
    assert!(report
        .comparison
        .row(GraphMetric::InDegree, CorrelationMethod::Spearman)
        .is_some());

    let json = serde_json::to_string(&report).unwrap();
    assert!(json.contains("\"snapshot_fingerprint\""));
}

#[test]
fn test_recency_weighting_favours_recent_predecessor() {
    let snapshot = lineage();
    let uniform = Pipeline::new(AnalysisConfig::default()).run(&snapshot).unwrap();

    let mut config = AnalysisConfig::default();
    config.inheritance.weighting = WeightingScheme::Recency { half_life_days: 180.0 };
    let recency = Pipeline::new(config).run(&snapshot).unwrap();

    // p4's nearest predecessor (p3) shares its topic; the older one (p2) does not
    assert!(recency.inheritance.factor("p4").unwrap() > uniform.inheritance.factor("p4").unwrap());
}

#[test]
fn test_unknown_ids_under_each_policy() {
    let mut snapshot = three_papers();
    snapshot.citations.push(CitationEdge::new("C", "ghost"));

    let dropped = Pipeline::new(AnalysisConfig::default()).run(&snapshot).unwrap();
    assert_eq!(dropped.graph.report.unknown_edges.len(), 1);
    assert_relative_eq!(dropped.inheritance.factor("C").unwrap(), 0.5);

    let policy = GraphPolicy {
        unknown_ids: UnknownIdPolicy::FailFast,
        ..GraphPolicy::default()
    };
    let err = build_graph(&snapshot.citations, &snapshot.papers, policy).unwrap_err();
    assert!(matches!(err, AnalysisError::UnknownIdentifier { .. }));

    let policy = GraphPolicy {
        unknown_ids: UnknownIdPolicy::Sentinel,
        ..GraphPolicy::default()
    };
    let outcome = build_graph(&snapshot.citations, &snapshot.papers, policy).unwrap();
    assert!(outcome.graph.is_sentinel("ghost"));

    let embeddings = snapshot
        .papers
        .iter()
        .filter_map(|p| p.embedding.clone().map(|e| (p.id.clone(), e)))
        .collect();
    let map = compute_inheritance(&outcome.graph, &embeddings, &WeightingScheme::Uniform);
    let c = map.get("C").unwrap();
    assert!(c.has_flag(InheritanceFlag::DanglingPredecessors));
    assert_eq!(c.predecessors_used, 1);
    assert_eq!(c.predecessors_total, 2);
    assert!(map.get("ghost").is_none());
}
