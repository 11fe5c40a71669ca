//! Cosine similarity over the embedding space

use crate::errors::{AnalysisError, Result};
use crate::vector;
use paperlineage_common::PaperId;
use serde::Serialize;

fn check_dimensions(vectors: &[Vec<f32>]) -> Result<()> {
    if let Some(first) = vectors.first() {
        if let Some(bad) = vectors.iter().find(|v| v.len() != first.len()) {
            return Err(AnalysisError::InvalidInput(format!(
                "embedding dimensions differ: {} vs {}",
                first.len(),
                bad.len()
            )));
        }
    }
    Ok(())
}

/// Pairwise cosine similarities. Zero-norm rows are similar to nothing,
/// including themselves.
pub fn similarity_matrix(vectors: &[Vec<f32>]) -> Result<Vec<Vec<f64>>> {
    check_dimensions(vectors)?;

    let n = vectors.len();
    let mut matrix = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in i..n {
            let s = vector::cosine(&vectors[i], &vectors[j]).unwrap_or(0.0);
            matrix[i][j] = s;
            matrix[j][i] = s;
        }
    }
    Ok(matrix)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Neighbor {
    pub id: PaperId,
    pub similarity: f64,
}

/// The `k` most similar other papers for each paper, most similar first;
/// ties go to the smaller id
pub fn nearest_neighbors(ids: &[PaperId], vectors: &[Vec<f32>], k: usize) -> Result<Vec<(PaperId, Vec<Neighbor>)>> {
    if ids.len() != vectors.len() {
        return Err(AnalysisError::InvalidInput(format!(
            "{} ids for {} vectors",
            ids.len(),
            vectors.len()
        )));
    }
    let matrix = similarity_matrix(vectors)?;

    Ok(ids
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let mut others: Vec<Neighbor> = ids
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(j, other)| Neighbor {
                    id: other.clone(),
                    similarity: matrix[i][j],
                })
                .collect();
            others.sort_by(|a, b| b.similarity.total_cmp(&a.similarity).then_with(|| a.id.cmp(&b.id)));
            others.truncate(k);
            (id.clone(), others)
        })
        .collect())
}
