//! Analysis error types
//!
//! Only the fail-fast graph policies and bad inputs surface here. Data-quality
//! problems inside a run (degenerate vectors, constant series) become
//! per-record flags instead.

use paperlineage_common::errors::AppError;
use paperlineage_common::PaperId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnalysisError>;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Citation {citing} -> {cited} references unknown paper {missing}")]
    UnknownIdentifier {
        citing: PaperId,
        cited: PaperId,
        missing: PaperId,
    },

    #[error("Citation cycle detected: {}", format_cycle(.cycle))]
    Cycle {
        /// Papers on the cycle, in citation order; the last one cites the first
        cycle: Vec<PaperId>,
        /// The edge that closed the cycle during traversal
        offending_edge: (PaperId, PaperId),
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Store error: {0}")]
    Store(#[from] AppError),
}

fn format_cycle(cycle: &[PaperId]) -> String {
    let mut parts: Vec<&str> = cycle.iter().map(PaperId::as_str).collect();
    if let Some(first) = cycle.first() {
        parts.push(first.as_str());
    }
    parts.join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message() {
        let err = AnalysisError::Cycle {
            cycle: vec![PaperId::from("a"), PaperId::from("b")],
            offending_edge: (PaperId::from("b"), PaperId::from("a")),
        };
        assert_eq!(err.to_string(), "Citation cycle detected: a -> b -> a");
    }

    #[test]
    fn test_unknown_identifier_message() {
        let err = AnalysisError::UnknownIdentifier {
            citing: PaperId::from("a"),
            cited: PaperId::from("x"),
            missing: PaperId::from("x"),
        };
        assert!(err.to_string().contains("unknown paper x"));
    }
}
