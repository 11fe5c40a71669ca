//! Metrics and observability utilities
//!
//! Pipeline-stage counters and histograms with standardized naming
//! conventions. Recording is a no-op until a recorder (e.g. the Prometheus
//! exporter installed by the CLI) is set.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all PaperLineage metrics
pub const METRICS_PREFIX: &str = "paperlineage";

/// Buckets for stage latency (in seconds); full passes over large corpora are slow
pub const STAGE_BUCKETS: &[f64] = &[
    0.001,  // 1ms
    0.010,  // 10ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.500,  // 500ms
    1.000,  // 1s
    5.000,  // 5s
    30.00,  // 30s
    120.0,  // 2m
    600.0,  // 10m
];

/// Buckets for embedding latency
pub const EMBEDDING_BUCKETS: &[f64] = &[
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.000,  // 2s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_histogram!(
        format!("{}_stage_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Pipeline stage latency in seconds"
    );

    describe_gauge!(
        format!("{}_graph_papers", METRICS_PREFIX),
        Unit::Count,
        "Papers in the most recently built citation graph"
    );

    describe_gauge!(
        format!("{}_graph_edges", METRICS_PREFIX),
        Unit::Count,
        "Edges in the most recently built citation graph"
    );

    describe_counter!(
        format!("{}_edges_rejected_total", METRICS_PREFIX),
        Unit::Count,
        "Citation edges removed during graph construction, by reason"
    );

    describe_counter!(
        format!("{}_papers_scored_total", METRICS_PREFIX),
        Unit::Count,
        "Papers that received an inheritance factor"
    );

    describe_counter!(
        format!("{}_inheritance_flags_total", METRICS_PREFIX),
        Unit::Count,
        "Diagnostic flags raised by the inheritance engine, by flag"
    );

    describe_counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding API requests"
    );

    describe_histogram!(
        format!("{}_embedding_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Embedding generation latency in seconds"
    );

    describe_counter!(
        format!("{}_embedding_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding API errors"
    );

    tracing::debug!("Metrics registered");
}

/// Helper to time a pipeline stage
pub struct StageTimer {
    start: Instant,
    stage: &'static str,
}

impl StageTimer {
    /// Start timing a stage
    pub fn start(stage: &'static str) -> Self {
        Self {
            start: Instant::now(),
            stage,
        }
    }

    /// Record stage completion and return the elapsed seconds
    pub fn finish(self) -> f64 {
        let duration = self.start.elapsed().as_secs_f64();

        histogram!(
            format!("{}_stage_duration_seconds", METRICS_PREFIX),
            "stage" => self.stage
        )
        .record(duration);

        duration
    }
}

/// Record the size of a freshly built graph
pub fn record_graph(papers: usize, edges: usize) {
    gauge!(format!("{}_graph_papers", METRICS_PREFIX)).set(papers as f64);
    gauge!(format!("{}_graph_edges", METRICS_PREFIX)).set(edges as f64);
}

/// Record edges removed during graph construction
pub fn record_rejected_edges(reason: &'static str, count: usize) {
    if count == 0 {
        return;
    }
    counter!(
        format!("{}_edges_rejected_total", METRICS_PREFIX),
        "reason" => reason
    )
    .increment(count as u64);
}

/// Record inheritance scoring results
pub fn record_scored(papers: usize) {
    counter!(format!("{}_papers_scored_total", METRICS_PREFIX)).increment(papers as u64);
}

/// Record one diagnostic flag kind
pub fn record_flag(flag: &'static str, count: usize) {
    if count == 0 {
        return;
    }
    counter!(
        format!("{}_inheritance_flags_total", METRICS_PREFIX),
        "flag" => flag
    )
    .increment(count as u64);
}

/// Helper to record embedding metrics
pub fn record_embedding(duration_secs: f64, model: &str, batch_size: usize, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_embedding_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .record(duration_secs);
        tracing::trace!(batch_size, duration_secs, "Embedding batch recorded");
    } else {
        counter!(
            format!("{}_embedding_errors_total", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets_sorted() {
        for buckets in [STAGE_BUCKETS, EMBEDDING_BUCKETS] {
            let mut prev = 0.0;
            for &bucket in buckets {
                assert!(bucket > prev);
                prev = bucket;
            }
        }
    }

    #[test]
    fn test_stage_timer() {
        let timer = StageTimer::start("graph");
        std::thread::sleep(std::time::Duration::from_millis(5));
        let elapsed = timer.finish();
        assert!(elapsed >= 0.005);
    }

    #[test]
    fn test_recording_without_recorder() {
        // No recorder installed; these must not panic
        record_graph(3, 2);
        record_rejected_edges("cycle", 1);
        record_flag("root", 0);
        record_scored(3);
    }
}
