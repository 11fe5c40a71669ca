//! K-means over embeddings
//!
//! Used to check that the embedding space groups papers by field before
//! trusting inheritance scores computed in it.

use crate::errors::{AnalysisError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KMeansResult {
    /// Cluster index per input vector
    pub labels: Vec<usize>,
    pub centroids: Vec<Vec<f64>>,
    /// Sum of squared distances to the assigned centroid
    pub inertia: f64,
    pub iterations: usize,
}

impl KMeansResult {
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.centroids.len()];
        for &label in &self.labels {
            sizes[label] += 1;
        }
        sizes
    }
}

fn squared_distance(a: &[f32], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&x, &c)| {
            let d = x as f64 - c;
            d * d
        })
        .sum()
}

fn nearest(vector: &[f32], centroids: &[Vec<f64>]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (i, centroid) in centroids.iter().enumerate() {
        let d = squared_distance(vector, centroid);
        if d < best.1 {
            best = (i, d);
        }
    }
    best
}

/// k-means++ seeding: each new centre drawn with probability proportional to
/// the squared distance from the closest centre so far
fn kmeans_plus_plus(vectors: &[Vec<f32>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let to_f64 = |v: &[f32]| v.iter().map(|&x| x as f64).collect::<Vec<_>>();

    let mut centroids = Vec::with_capacity(k);
    centroids.push(to_f64(vectors[rng.gen_range(0..vectors.len())].as_slice()));

    while centroids.len() < k {
        let distances: Vec<f64> = vectors.iter().map(|v| nearest(v, &centroids).1).collect();
        let total: f64 = distances.iter().sum();

        let selected = if total > 0.0 {
            let target = rng.gen_range(0.0..total);
            let mut cumulative = 0.0;
            distances
                .iter()
                .position(|d| {
                    cumulative += d;
                    cumulative > target
                })
                .unwrap_or(vectors.len() - 1)
        } else {
            // Every point sits on a centre already
            rng.gen_range(0..vectors.len())
        };
        centroids.push(to_f64(vectors[selected].as_slice()));
    }

    centroids
}

/// Lloyd's algorithm with k-means++ initialisation
pub fn kmeans(vectors: &[Vec<f32>], k: usize, max_iter: usize, seed: u64) -> Result<KMeansResult> {
    if k == 0 || k > vectors.len() {
        return Err(AnalysisError::InvalidInput(format!(
            "k must be between 1 and {}, got {}",
            vectors.len(),
            k
        )));
    }
    let dimension = vectors[0].len();
    if vectors.iter().any(|v| v.len() != dimension) {
        return Err(AnalysisError::InvalidInput("embedding dimensions differ".into()));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut centroids = kmeans_plus_plus(vectors, k, &mut rng);
    let mut labels = vec![usize::MAX; vectors.len()];
    let mut iterations = 0;

    for _ in 0..max_iter.max(1) {
        iterations += 1;

        let mut changed = false;
        for (label, vector) in labels.iter_mut().zip(vectors) {
            let (cluster, _) = nearest(vector, &centroids);
            if *label != cluster {
                *label = cluster;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        let mut sums = vec![vec![0.0f64; dimension]; k];
        let mut counts = vec![0usize; k];
        for (&label, vector) in labels.iter().zip(vectors) {
            for (acc, &x) in sums[label].iter_mut().zip(vector) {
                *acc += x as f64;
            }
            counts[label] += 1;
        }
        // Empty clusters keep their previous centre
        for ((centroid, sum), count) in centroids.iter_mut().zip(sums).zip(counts) {
            if count > 0 {
                *centroid = sum.into_iter().map(|s| s / count as f64).collect();
            }
        }
    }

    let inertia = vectors
        .iter()
        .zip(&labels)
        .map(|(v, &label)| squared_distance(v, &centroids[label]))
        .sum();

    debug!(k, iterations, inertia, "k-means converged");

    Ok(KMeansResult {
        labels,
        centroids,
        inertia,
        iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn blobs() -> Vec<Vec<f32>> {
        let mut vectors = Vec::new();
        for i in 0..5 {
            let jitter = i as f32 * 0.01;
            vectors.push(vec![0.0 + jitter, 0.0 - jitter]);
            vectors.push(vec![10.0 - jitter, 10.0 + jitter]);
        }
        vectors
    }

    #[test]
    fn test_separates_blobs() {
        let vectors = blobs();
        let result = kmeans(&vectors, 2, 50, 7).unwrap();

        assert_eq!(result.cluster_sizes(), vec![5, 5]);
        for pair in result.labels.chunks(2) {
            assert_ne!(pair[0], pair[1]);
        }
        assert!(result.inertia < 0.01);
    }

    #[test]
    fn test_deterministic_for_seed() {
        let vectors = blobs();
        let a = kmeans(&vectors, 3, 50, 42).unwrap();
        let b = kmeans(&vectors, 3, 50, 42).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_k() {
        let vectors = blobs();
        assert!(kmeans(&vectors, 0, 10, 1).is_err());
        assert!(kmeans(&vectors, 11, 10, 1).is_err());
    }

    #[test]
    fn test_k_equals_n() {
        let vectors = vec![vec![0.0], vec![1.0], vec![5.0]];
        let result = kmeans(&vectors, 3, 10, 3).unwrap();
        assert_relative_eq!(result.inertia, 0.0);
        assert_eq!(result.cluster_sizes(), vec![1, 1, 1]);
    }

    #[test]
    fn test_identical_points() {
        let vectors = vec![vec![1.0, 1.0]; 4];
        let result = kmeans(&vectors, 2, 10, 0).unwrap();
        assert_eq!(result.labels.len(), 4);
        assert_relative_eq!(result.inertia, 0.0);
    }
}
