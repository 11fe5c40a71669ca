//! Dense vector helpers
//!
//! Embeddings are stored as `f32`; all arithmetic here accumulates in `f64`.

/// Norms at or below this are treated as zero
pub const NORM_EPSILON: f64 = 1e-12;

pub fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter().zip(b).map(|(&x, &y)| x as f64 * y as f64).sum()
}

pub fn l2_norm(v: &[f32]) -> f64 {
    dot(v, v).sqrt()
}

/// All components finite and the norm non-negligible
pub fn is_well_formed(v: &[f32]) -> bool {
    !v.is_empty() && v.iter().all(|x| x.is_finite()) && l2_norm(v) > NORM_EPSILON
}

/// Cosine similarity, or `None` when either vector has (near) zero norm
/// or the lengths differ
pub fn cosine(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() {
        return None;
    }
    let na = l2_norm(a);
    let nb = l2_norm(b);
    if !(na > NORM_EPSILON && nb > NORM_EPSILON) {
        return None;
    }
    Some((dot(a, b) / (na * nb)).clamp(-1.0, 1.0))
}

/// Cosine similarity against a precomputed `f64` vector
pub fn cosine_f64(a: &[f32], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() {
        return None;
    }
    let na = l2_norm(a);
    let nb = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if !(na > NORM_EPSILON && nb > NORM_EPSILON) {
        return None;
    }
    let d: f64 = a.iter().zip(b).map(|(&x, &y)| x as f64 * y).sum();
    Some((d / (na * nb)).clamp(-1.0, 1.0))
}

pub fn squared_euclidean(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = x as f64 - y as f64;
            d * d
        })
        .sum()
}
