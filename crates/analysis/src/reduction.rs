//! Dimension reduction for visual sanity checks
//!
//! [`Reducer`] projects embeddings to a few dimensions with PCA, t-SNE or UMAP; [`stress`] and
//! [`trustworthiness`] score how much structure survived.

use crate::errors::{AnalysisError, Result};
use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Reduction method and its parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Reducer {
    /// Principal component analysis via SVD of the centred data
    Pca { components: usize },
    /// Exact t-SNE (quadratic in the number of points)
    Tsne {
        components: usize,
        perplexity: f64,
        iterations: usize,
        learning_rate: f64,
        seed: u64,
    },
    /// UMAP: fuzzy k-neighbour graph laid out by negative-sampling SGD
    Umap {
        components: usize,
        neighbors: usize,
        epochs: usize,
        seed: u64,
    },
}

impl Reducer {
    pub fn pca(components: usize) -> Self {
        Reducer::Pca { components }
    }

    /// t-SNE with the usual defaults
    pub fn tsne(components: usize, seed: u64) -> Self {
        Reducer::Tsne {
            components,
            perplexity: 30.0,
            iterations: 1000,
            learning_rate: 200.0,
            seed,
        }
    }

    /// UMAP with 15 neighbours and 200 epochs
    pub fn umap(components: usize, seed: u64) -> Self {
        Reducer::Umap {
            components,
            neighbors: 15,
            epochs: 200,
            seed,
        }
    }

    pub fn components(&self) -> usize {
        match *self {
            Reducer::Pca { components } | Reducer::Tsne { components, .. } | Reducer::Umap { components, .. } => {
                components
            }
        }
    }

    pub fn reduce(&self, vectors: &[Vec<f32>]) -> Result<Vec<Vec<f32>>> {
        let data = to_matrix(vectors)?;
        let components = self.components();
        if components == 0 {
            return Err(AnalysisError::InvalidInput("components must be positive".into()));
        }

        let reduced = match *self {
            Reducer::Pca { components } => pca(&data, components)?,
            Reducer::Tsne {
                components,
                perplexity,
                iterations,
                learning_rate,
                seed,
            } => tsne(&data, components, perplexity, iterations, learning_rate, seed)?,
            Reducer::Umap {
                components,
                neighbors,
                epochs,
                seed,
            } => umap(&data, components, neighbors, epochs, seed)?,
        };

        Ok(reduced
            .into_iter()
            .map(|row| row.into_iter().map(|x| x as f32).collect())
            .collect())
    }
}

fn to_matrix(vectors: &[Vec<f32>]) -> Result<Vec<Vec<f64>>> {
    let Some(first) = vectors.first() else {
        return Err(AnalysisError::InvalidInput("no vectors to reduce".into()));
    };
    if vectors.iter().any(|v| v.len() != first.len()) {
        return Err(AnalysisError::InvalidInput("embedding dimensions differ".into()));
    }
    if vectors.iter().flatten().any(|x| !x.is_finite()) {
        return Err(AnalysisError::InvalidInput("embedding contains non-finite values".into()));
    }
    Ok(vectors
        .iter()
        .map(|v| v.iter().map(|&x| x as f64).collect())
        .collect())
}

/// Projection onto the leading right singular vectors of the centred data
fn pca(data: &[Vec<f64>], components: usize) -> Result<Vec<Vec<f64>>> {
    let n = data.len();
    let d = data[0].len();
    if components > d {
        return Err(AnalysisError::InvalidInput(format!(
            "cannot keep {} components of {}-dimensional data",
            components, d
        )));
    }

    let mean: Vec<f64> = (0..d)
        .map(|j| data.iter().map(|row| row[j]).sum::<f64>() / n as f64)
        .collect();
    let centered = DMatrix::from_fn(n, d, |i, j| data[i][j] - mean[j]);

    let svd = centered.clone().svd(false, true);
    let singular_values = svd.singular_values;
    let Some(v_t) = svd.v_t else {
        return Err(AnalysisError::InvalidInput("SVD produced no right singular vectors".into()));
    };

    let mut order: Vec<usize> = (0..singular_values.len()).collect();
    order.sort_by(|&a, &b| singular_values[b].total_cmp(&singular_values[a]));

    // Components past the rank of the data stay at zero
    let mut projected = DMatrix::<f64>::zeros(n, components);
    for (c, &k) in order.iter().take(components).enumerate() {
        let mut axis = v_t.row(k).transpose();
        // Deterministic sign: largest loading positive
        let largest = axis
            .iter()
            .copied()
            .max_by(|a, b| a.abs().total_cmp(&b.abs()))
            .unwrap_or(0.0);
        if largest < 0.0 {
            axis.neg_mut();
        }
        projected.set_column(c, &(&centered * &axis));
    }

    debug!(
        components,
        leading = ?order.iter().take(components).map(|&k| singular_values[k]).collect::<Vec<_>>(),
        "PCA finished"
    );

    Ok(projected
        .row_iter()
        .map(|row| row.iter().copied().collect())
        .collect())
}

fn squared_distances(data: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = data.len();
    let mut distances = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d: f64 = data[i].iter().zip(&data[j]).map(|(a, b)| (a - b).powi(2)).sum();
            distances[i][j] = d;
            distances[j][i] = d;
        }
    }
    distances
}

/// Conditional probabilities p(j|i) whose entropy matches log(perplexity)
fn conditional_probabilities(distances: &[f64], i: usize, perplexity: f64) -> Vec<f64> {
    const MAX_STEPS: usize = 64;
    const TOLERANCE: f64 = 1e-5;

    let target = perplexity.ln();
    let mut beta = 1.0;
    let (mut low, mut high) = (0.0f64, f64::INFINITY);
    let mut p = vec![0.0; distances.len()];

    for _ in 0..MAX_STEPS {
        // Shift by the smallest distance so the exponentials do not all underflow
        let min = distances
            .iter()
            .enumerate()
            .filter(|&(j, _)| j != i)
            .map(|(_, &d)| d)
            .fold(f64::INFINITY, f64::min);

        let mut sum = 0.0;
        for (j, &d) in distances.iter().enumerate() {
            p[j] = if j == i { 0.0 } else { (-(d - min) * beta).exp() };
            sum += p[j];
        }
        let entropy: f64 = if sum > 0.0 {
            p.iter_mut().for_each(|x| *x /= sum);
            -p.iter().filter(|&&x| x > 0.0).map(|x| x * x.ln()).sum::<f64>()
        } else {
            0.0
        };

        let diff = entropy - target;
        if diff.abs() < TOLERANCE {
            break;
        }
        if diff > 0.0 {
            // Too flat: sharpen
            low = beta;
            beta = if high.is_finite() { (beta + high) / 2.0 } else { beta * 2.0 };
        } else {
            high = beta;
            beta = (beta + low) / 2.0;
        }
    }
    p
}

fn tsne(
    data: &[Vec<f64>],
    components: usize,
    perplexity: f64,
    iterations: usize,
    learning_rate: f64,
    seed: u64,
) -> Result<Vec<Vec<f64>>> {
    const EXAGGERATION: f64 = 12.0;
    const EXAGGERATION_ITERS: usize = 250;
    const MIN_GAIN: f64 = 0.01;

    let n = data.len();
    if n < 2 {
        return Ok(vec![vec![0.0; components]; n]);
    }
    if !(perplexity > 0.0) || perplexity >= n as f64 {
        return Err(AnalysisError::InvalidInput(format!(
            "perplexity must be in (0, {}), got {}",
            n, perplexity
        )));
    }
    if !(learning_rate > 0.0) {
        return Err(AnalysisError::InvalidInput("learning rate must be positive".into()));
    }

    let distances = squared_distances(data);
    let mut p = vec![vec![0.0; n]; n];
    for i in 0..n {
        let row = conditional_probabilities(&distances[i], i, perplexity);
        p[i] = row;
    }
    // Symmetrise
    for i in 0..n {
        for j in (i + 1)..n {
            let v = ((p[i][j] + p[j][i]) / (2.0 * n as f64)).max(1e-12);
            p[i][j] = v;
            p[j][i] = v;
        }
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut y: Vec<Vec<f64>> = (0..n)
        .map(|_| (0..components).map(|_| rng.gen_range(-1e-4..1e-4)).collect())
        .collect();
    let mut velocity = vec![vec![0.0f64; components]; n];
    let mut gains = vec![vec![1.0f64; components]; n];

    for iteration in 0..iterations {
        let exaggeration = if iteration < EXAGGERATION_ITERS { EXAGGERATION } else { 1.0 };
        let momentum = if iteration < EXAGGERATION_ITERS { 0.5 } else { 0.8 };

        // Student-t affinities in the embedding
        let mut num = vec![vec![0.0; n]; n];
        let mut total = 0.0;
        for i in 0..n {
            for j in (i + 1)..n {
                let d: f64 = y[i].iter().zip(&y[j]).map(|(a, b)| (a - b).powi(2)).sum();
                let v = 1.0 / (1.0 + d);
                num[i][j] = v;
                num[j][i] = v;
                total += 2.0 * v;
            }
        }

        for i in 0..n {
            let mut gradient = vec![0.0; components];
            for j in 0..n {
                if i == j {
                    continue;
                }
                let q = (num[i][j] / total).max(1e-12);
                let coefficient = 4.0 * (exaggeration * p[i][j] - q) * num[i][j];
                for (g, (a, b)) in gradient.iter_mut().zip(y[i].iter().zip(&y[j])) {
                    *g += coefficient * (a - b);
                }
            }

            for c in 0..components {
                let same_sign = (gradient[c] > 0.0) == (velocity[i][c] > 0.0);
                gains[i][c] = if same_sign { gains[i][c] * 0.8 } else { gains[i][c] + 0.2 };
                gains[i][c] = gains[i][c].max(MIN_GAIN);
                velocity[i][c] = momentum * velocity[i][c] - learning_rate * gains[i][c] * gradient[c];
            }
        }

        for (point, step) in y.iter_mut().zip(&velocity) {
            for (coordinate, s) in point.iter_mut().zip(step) {
                *coordinate += s;
            }
        }

        // Keep the embedding centred
        for c in 0..components {
            let mean = y.iter().map(|p| p[c]).sum::<f64>() / n as f64;
            y.iter_mut().for_each(|p| p[c] -= mean);
        }
    }

    debug!(points = n, iterations, "t-SNE finished");
    Ok(y)
}

/// Low-dimensional curve `1 / (1 + a d^2b)` fitted for min_dist 0.1, spread 1
const UMAP_A: f64 = 1.577;
const UMAP_B: f64 = 0.8951;

/// Membership strengths of each point's k nearest neighbours, with the
/// bandwidth chosen so the strengths sum to log2(k)
fn fuzzy_memberships(distances: &[f64], i: usize, k: usize) -> Vec<(usize, f64)> {
    const MAX_STEPS: usize = 64;
    const TOLERANCE: f64 = 1e-5;

    let knn: Vec<usize> = neighbour_order(distances, i).into_iter().take(k).collect();
    let rho = knn.first().map_or(0.0, |&j| distances[j]);
    let target = (k as f64).log2();
    let mean = distances.iter().sum::<f64>() / (distances.len() - 1).max(1) as f64;
    let floor = 1e-3 * mean.max(f64::MIN_POSITIVE);

    let strengths = |sigma: f64| -> Vec<f64> {
        knn.iter()
            .map(|&j| (-(distances[j] - rho).max(0.0) / sigma).exp())
            .collect()
    };

    let (mut low, mut high) = (0.0f64, f64::INFINITY);
    let mut sigma = 1.0f64;
    for _ in 0..MAX_STEPS {
        let total: f64 = strengths(sigma).iter().sum();
        if (total - target).abs() < TOLERANCE {
            break;
        }
        if total > target {
            high = sigma;
            sigma = (low + high) / 2.0;
        } else {
            low = sigma;
            sigma = if high.is_finite() { (low + high) / 2.0 } else { sigma * 2.0 };
        }
    }

    knn.iter().copied().zip(strengths(sigma.max(floor))).collect()
}

fn umap(data: &[Vec<f64>], components: usize, neighbors: usize, epochs: usize, seed: u64) -> Result<Vec<Vec<f64>>> {
    const NEGATIVE_SAMPLES: usize = 5;
    const CLIP: f64 = 4.0;
    const INIT_SCALE: f64 = 10.0;

    let n = data.len();
    if neighbors < 2 {
        return Err(AnalysisError::InvalidInput(format!(
            "UMAP needs at least 2 neighbours, got {}",
            neighbors
        )));
    }
    if n < 2 {
        return Ok(vec![vec![0.0; components]; n]);
    }
    let k = neighbors.min(n - 1);

    let distances: Vec<Vec<f64>> = squared_distances(data)
        .into_iter()
        .map(|row| row.into_iter().map(f64::sqrt).collect())
        .collect();

    // Directed memberships, then the fuzzy union w_ij + w_ji - w_ij * w_ji
    let mut directed = vec![vec![0.0; n]; n];
    for (i, row) in distances.iter().enumerate() {
        for (j, w) in fuzzy_memberships(row, i, k) {
            directed[i][j] = w;
        }
    }
    let mut edges: Vec<(usize, usize, f64)> = Vec::new();
    for i in 0..n {
        for j in (i + 1)..n {
            let (a, b) = (directed[i][j], directed[j][i]);
            let w = a + b - a * b;
            if w > 0.0 {
                edges.push((i, j, w));
            }
        }
    }
    let max_weight = edges.iter().map(|e| e.2).fold(0.0, f64::max);

    // Start from the principal components, scaled to a fixed box
    let mut rng = StdRng::seed_from_u64(seed);
    let mut y = pca(data, components.min(data[0].len()))?;
    for row in &mut y {
        row.resize(components, 0.0);
    }
    let extent = y.iter().flatten().fold(0.0f64, |m, x| m.max(x.abs()));
    for row in &mut y {
        for x in row.iter_mut() {
            let scaled = if extent > 0.0 { *x / extent * INIT_SCALE } else { 0.0 };
            *x = scaled + rng.gen_range(-1e-4..1e-4);
        }
    }

    let clip = |g: f64| g.clamp(-CLIP, CLIP);
    for epoch in 0..epochs {
        let alpha = 1.0 - epoch as f64 / epochs as f64;

        for &(i, j, w) in &edges {
            if rng.gen::<f64>() > w / max_weight {
                continue;
            }

            let diff: Vec<f64> = y[i].iter().zip(&y[j]).map(|(a, b)| a - b).collect();
            let d2: f64 = diff.iter().map(|d| d * d).sum();
            if d2 > 0.0 {
                let coefficient = -2.0 * UMAP_A * UMAP_B * d2.powf(UMAP_B - 1.0) / (1.0 + UMAP_A * d2.powf(UMAP_B));
                for c in 0..components {
                    let g = clip(coefficient * diff[c]) * alpha;
                    y[i][c] += g;
                    y[j][c] -= g;
                }
            }

            for _ in 0..NEGATIVE_SAMPLES {
                let other = rng.gen_range(0..n);
                if other == i {
                    continue;
                }
                let diff: Vec<f64> = y[i].iter().zip(&y[other]).map(|(a, b)| a - b).collect();
                let d2: f64 = diff.iter().map(|d| d * d).sum();
                let coefficient = 2.0 * UMAP_B / ((0.001 + d2) * (1.0 + UMAP_A * d2.powf(UMAP_B)));
                for c in 0..components {
                    y[i][c] += clip(coefficient * diff[c]) * alpha;
                }
            }
        }
    }

    debug!(points = n, neighbors = k, edges = edges.len(), epochs, "UMAP finished");
    Ok(y)
}

fn pairwise_distances(vectors: &[Vec<f32>]) -> Vec<Vec<f64>> {
    let data: Vec<Vec<f64>> = vectors
        .iter()
        .map(|v| v.iter().map(|&x| x as f64).collect())
        .collect();
    squared_distances(&data)
        .into_iter()
        .map(|row| row.into_iter().map(f64::sqrt).collect())
        .collect()
}

fn check_pair(original: &[Vec<f32>], reduced: &[Vec<f32>]) -> Result<()> {
    if original.len() != reduced.len() {
        return Err(AnalysisError::InvalidInput(format!(
            "{} original points but {} reduced points",
            original.len(),
            reduced.len()
        )));
    }
    to_matrix(original)?;
    to_matrix(reduced)?;
    Ok(())
}

/// Kruskal's stress-1 between original and reduced pairwise distances
pub fn stress(original: &[Vec<f32>], reduced: &[Vec<f32>]) -> Result<f64> {
    check_pair(original, reduced)?;
    let high = pairwise_distances(original);
    let low = pairwise_distances(reduced);

    let mut residual = 0.0;
    let mut scale = 0.0;
    for i in 0..high.len() {
        for j in (i + 1)..high.len() {
            residual += (high[i][j] - low[i][j]).powi(2);
            scale += high[i][j].powi(2);
        }
    }
    Ok(if scale > 0.0 { (residual / scale).sqrt() } else { 0.0 })
}

/// Neighbours of `i` ordered by distance, ties by index
fn neighbour_order(distances: &[f64], i: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..distances.len()).filter(|&j| j != i).collect();
    order.sort_by(|&a, &b| distances[a].total_cmp(&distances[b]).then(a.cmp(&b)));
    order
}

/// How far the reduced space invents neighbours: 1 when every reduced
/// k-neighbourhood was already a neighbourhood in the original space
pub fn trustworthiness(original: &[Vec<f32>], reduced: &[Vec<f32>], k: usize) -> Result<f64> {
    check_pair(original, reduced)?;
    let n = original.len();
    if k == 0 || 2 * k >= n {
        return Err(AnalysisError::InvalidInput(format!(
            "k must be between 1 and {}, got {}",
            (n.saturating_sub(1)) / 2,
            k
        )));
    }

    let high = pairwise_distances(original);
    let low = pairwise_distances(reduced);

    let mut penalty = 0.0;
    for i in 0..n {
        // rank[j] = position of j among i's original-space neighbours, from 1
        let mut rank = vec![0usize; n];
        for (position, j) in neighbour_order(&high[i], i).into_iter().enumerate() {
            rank[j] = position + 1;
        }
        for j in neighbour_order(&low[i], i).into_iter().take(k) {
            if rank[j] > k {
                penalty += (rank[j] - k) as f64;
            }
        }
    }

    let (n, k) = (n as f64, k as f64);
    Ok(1.0 - 2.0 / (n * k * (2.0 * n - 3.0 * k - 1.0)) * penalty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Points along a line in 3-D with a little noise in the other axes
    fn line() -> Vec<Vec<f32>> {
        (0..12)
            .map(|i| {
                let t = i as f32;
                vec![t, 2.0 * t + 0.01 * (t % 3.0), -t + 0.01 * (t % 2.0)]
            })
            .collect()
    }

    #[test]
    fn test_pca_recovers_line() {
        let data = line();
        let reduced = Reducer::pca(1).reduce(&data).unwrap();
        assert_eq!(reduced.len(), 12);
        assert_eq!(reduced[0].len(), 1);

        // Monotone along the line and centred
        for pair in reduced.windows(2) {
            assert!(pair[1][0] > pair[0][0]);
        }
        let mean: f32 = reduced.iter().map(|r| r[0]).sum::<f32>() / 12.0;
        assert!(mean.abs() < 1e-3);
        assert!(stress(&data, &reduced).unwrap() < 0.01);
    }

    #[test]
    fn test_pca_components_orthogonal() {
        let data: Vec<Vec<f32>> = (0..20)
            .map(|i| {
                let t = i as f32;
                vec![t.sin() * 3.0, t.cos(), (t * 0.7).sin() * 0.1, 1.0]
            })
            .collect();
        let reduced = Reducer::pca(2).reduce(&data).unwrap();
        let covariance: f64 = reduced.iter().map(|r| r[0] as f64 * r[1] as f64).sum();
        assert_relative_eq!(covariance, 0.0, epsilon = 1e-3);

        // First component carries more variance than the second
        let var = |c: usize| reduced.iter().map(|r| (r[c] as f64).powi(2)).sum::<f64>();
        assert!(var(0) > var(1));
    }

    #[test]
    fn test_pca_matches_singular_values() {
        // Axis-aligned spread: x varies most, then y, z not at all
        let data: Vec<Vec<f32>> = vec![
            vec![-3.0, 0.0, 5.0],
            vec![3.0, 0.0, 5.0],
            vec![0.0, -1.0, 5.0],
            vec![0.0, 1.0, 5.0],
        ];
        let reduced = Reducer::pca(3).reduce(&data).unwrap();

        let first = [-3.0f32, 3.0, 0.0, 0.0];
        let second = [0.0f32, 0.0, -1.0, 1.0];
        for (row, (a, b)) in reduced.iter().zip(first.iter().zip(&second)) {
            assert_relative_eq!(row[0], *a, epsilon = 1e-5);
            assert_relative_eq!(row[1], *b, epsilon = 1e-5);
        }
        assert!(reduced.iter().all(|r| r[2].abs() < 1e-6));
    }

    #[test]
    fn test_pca_beyond_rank_is_zero() {
        let data = vec![vec![0.0, 1.0, 2.0], vec![2.0, 1.0, 0.0]];
        let reduced = Reducer::pca(3).reduce(&data).unwrap();
        assert_relative_eq!(reduced[0][0].abs(), 2.0f32.sqrt(), epsilon = 1e-5);
        assert!(reduced.iter().all(|r| r[1].abs() < 1e-6 && r[2].abs() < 1e-6));
    }

    #[test]
    fn test_pca_rejects_bad_input() {
        assert!(Reducer::pca(4).reduce(&line()).is_err());
        assert!(Reducer::pca(0).reduce(&line()).is_err());
        assert!(Reducer::pca(1).reduce(&[]).is_err());
        assert!(Reducer::pca(1).reduce(&[vec![1.0, 2.0], vec![1.0]]).is_err());
    }

    #[test]
    fn test_tsne_separates_clusters() {
        let mut data = Vec::new();
        for i in 0..8 {
            let jitter = i as f32 * 0.05;
            data.push(vec![0.0 + jitter, 0.0, 0.0]);
            data.push(vec![20.0, 20.0 + jitter, 20.0]);
        }

        let reducer = Reducer::Tsne {
            components: 2,
            perplexity: 4.0,
            iterations: 400,
            learning_rate: 100.0,
            seed: 11,
        };
        let reduced = reducer.reduce(&data).unwrap();
        assert_eq!(reduced.len(), 16);
        assert!(reduced.iter().flatten().all(|x| x.is_finite()));

        // Each point's nearest reduced neighbour comes from its own cluster
        let distances = pairwise_distances(&reduced);
        for i in 0..16 {
            let nearest = neighbour_order(&distances[i], i)[0];
            assert_eq!(nearest % 2, i % 2, "point {} pulled into the other cluster", i);
        }
    }

    #[test]
    fn test_tsne_is_seeded() {
        let data = line();
        let reducer = Reducer::Tsne {
            components: 2,
            perplexity: 3.0,
            iterations: 50,
            learning_rate: 50.0,
            seed: 5,
        };
        assert_eq!(reducer.reduce(&data).unwrap(), reducer.reduce(&data).unwrap());
    }

    #[test]
    fn test_umap_separates_clusters() {
        let mut data = Vec::new();
        for i in 0..10 {
            let jitter = i as f32 * 0.05;
            data.push(vec![0.0 + jitter, 0.0, 0.0]);
            data.push(vec![20.0, 20.0 + jitter, 20.0]);
        }

        let reducer = Reducer::Umap {
            components: 2,
            neighbors: 5,
            epochs: 200,
            seed: 3,
        };
        let reduced = reducer.reduce(&data).unwrap();
        assert_eq!(reduced.len(), 20);
        assert!(reduced.iter().flatten().all(|x| x.is_finite()));

        let distances = pairwise_distances(&reduced);
        for i in 0..20 {
            let nearest = neighbour_order(&distances[i], i)[0];
            assert_eq!(nearest % 2, i % 2, "point {} pulled into the other cluster", i);
        }
    }

    #[test]
    fn test_umap_is_seeded_and_validated() {
        let data = line();
        let reducer = Reducer::umap(2, 9);
        assert_eq!(reducer.reduce(&data).unwrap(), reducer.reduce(&data).unwrap());

        let bad = Reducer::Umap {
            components: 2,
            neighbors: 1,
            epochs: 10,
            seed: 0,
        };
        assert!(bad.reduce(&data).is_err());
    }

    #[test]
    fn test_memberships_sum_to_log_k() {
        let distances = vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let memberships = fuzzy_memberships(&distances, 0, 4);
        let ids: Vec<usize> = memberships.iter().map(|&(j, _)| j).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert_relative_eq!(memberships[0].1, 1.0);
        let total: f64 = memberships.iter().map(|&(_, w)| w).sum();
        assert_relative_eq!(total, 2.0, epsilon = 1e-4);
    }

    #[test]
    fn test_tsne_rejects_large_perplexity() {
        let reducer = Reducer::tsne(2, 0);
        assert!(reducer.reduce(&line()).is_err());
    }

    #[test]
    fn test_stress() {
        let original = vec![vec![0.0, 0.0], vec![3.0, 4.0], vec![6.0, 8.0]];
        assert_relative_eq!(stress(&original, &original).unwrap(), 0.0);

        let collapsed = vec![vec![0.0], vec![0.0], vec![0.0]];
        assert_relative_eq!(stress(&original, &collapsed).unwrap(), 1.0);

        assert!(stress(&original, &collapsed[..2]).is_err());
    }

    #[test]
    fn test_trustworthiness() {
        let original: Vec<Vec<f32>> = (0..10).map(|i| vec![i as f32, 0.0]).collect();
        assert_relative_eq!(trustworthiness(&original, &original, 2).unwrap(), 1.0);

        // Scrambled order invents neighbourhoods
        let scrambled: Vec<Vec<f32>> = (0..10).map(|i| vec![((i * 7) % 10) as f32]).collect();
        assert!(trustworthiness(&original, &scrambled, 2).unwrap() < 1.0);

        assert!(trustworthiness(&original, &original, 5).is_err());
        assert!(trustworthiness(&original, &original, 0).is_err());
    }
}
