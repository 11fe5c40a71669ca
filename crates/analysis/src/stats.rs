//! Descriptive statistics and correlation
//!
//! Degenerate samples never raise: they come back as a [`CorrelationFlag`]
//! alongside a `NaN` value.

use serde::{Deserialize, Serialize};

/// Why a correlation could not be computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationFlag {
    /// Fewer than two paired observations
    InsufficientSample,
    /// One of the series is constant
    ZeroVariance,
}

/// Mean, sample variance and size of one series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub mean: f64,
    pub variance: f64,
    pub n: usize,
}

impl Summary {
    pub fn of(values: &[f64]) -> Self {
        Self {
            mean: mean(values),
            variance: sample_variance(values),
            n: values.len(),
        }
    }
}

/// Arithmetic mean; `NaN` for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Unbiased sample variance; 0 for a single value, `NaN` for none
pub fn sample_variance(values: &[f64]) -> f64 {
    match values.len() {
        0 => f64::NAN,
        1 => 0.0,
        n => {
            let m = mean(values);
            values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1) as f64
        }
    }
}

/// 1-based ranks with ties sharing the average of their positions
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // Positions start..end share ranks start+1..=end
        let rank = (start + end + 1) as f64 / 2.0;
        for &i in &order[start..end] {
            ranks[i] = rank;
        }
        start = end;
    }
    ranks
}

fn is_constant(values: &[f64]) -> bool {
    values.iter().all(|v| *v == values[0])
}

/// Pearson product-moment correlation
pub fn pearson(x: &[f64], y: &[f64]) -> Result<f64, CorrelationFlag> {
    debug_assert_eq!(x.len(), y.len());
    let n = x.len().min(y.len());
    if n < 2 {
        return Err(CorrelationFlag::InsufficientSample);
    }
    let (x, y) = (&x[..n], &y[..n]);
    if is_constant(x) || is_constant(y) {
        return Err(CorrelationFlag::ZeroVariance);
    }

    let (mx, my) = (mean(x), mean(y));
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in x.iter().zip(y) {
        let (dx, dy) = (a - mx, b - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    let denom = (sxx * syy).sqrt();
    if !(denom > 0.0) {
        return Err(CorrelationFlag::ZeroVariance);
    }
    Ok((sxy / denom).clamp(-1.0, 1.0))
}

/// Spearman rank correlation (Pearson over average ranks)
pub fn spearman(x: &[f64], y: &[f64]) -> Result<f64, CorrelationFlag> {
    let n = x.len().min(y.len());
    if n < 2 {
        return Err(CorrelationFlag::InsufficientSample);
    }
    if is_constant(&x[..n]) || is_constant(&y[..n]) {
        return Err(CorrelationFlag::ZeroVariance);
    }
    pearson(&average_ranks(&x[..n]), &average_ranks(&y[..n]))
}

/// Two-sided p-value of a correlation coefficient under the null of no
/// correlation, using a Student-t distribution with `n - 2` degrees of freedom
pub fn correlation_p_value(r: f64, n: usize) -> f64 {
    if !r.is_finite() || n <= 2 {
        return f64::NAN;
    }
    let r2 = r * r;
    if r2 >= 1.0 {
        return 0.0;
    }
    // P(|T| > t) = I_{df / (df + t^2)}(df / 2, 1 / 2), and df / (df + t^2) = 1 - r^2
    let df = (n - 2) as f64;
    regularized_incomplete_beta(df / 2.0, 0.5, 1.0 - r2).clamp(0.0, 1.0)
}

/// Natural log of the gamma function (Lanczos approximation, g = 7)
pub fn ln_gamma(x: f64) -> f64 {
    const COEFFS: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];

    if x < 0.5 {
        // Reflection formula
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin()).ln() - ln_gamma(1.0 - x);
    }

    let x = x - 1.0;
    let mut sum = COEFFS[0];
    for (i, &c) in COEFFS.iter().enumerate().skip(1) {
        sum += c / (x + i as f64);
    }
    let t = x + 7.5;
    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + sum.ln()
}

/// Regularized incomplete beta function I_x(a, b)
pub fn regularized_incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }

    let ln_front = ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln();
    let front = ln_front.exp();

    // The continued fraction converges fastest below the mean
    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_continued_fraction(a, b, x) / a
    } else {
        1.0 - front * beta_continued_fraction(b, a, 1.0 - x) / b
    }
}

/// Continued fraction for the incomplete beta, modified Lentz method
fn beta_continued_fraction(a: f64, b: f64, x: f64) -> f64 {
    const MAX_ITER: usize = 300;
    const EPS: f64 = 1e-14;
    const TINY: f64 = 1e-300;

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;

    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < TINY {
        d = TINY;
    }
    d = 1.0 / d;
    let mut h = d;

    for m in 1..=MAX_ITER {
        let m = m as f64;
        let m2 = 2.0 * m;

        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        h *= d * c;

        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        let delta = d * c;
        h *= delta;

        if (delta - 1.0).abs() < EPS {
            break;
        }
    }
    h
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_mean_and_variance() {
        assert_relative_eq!(mean(&[1.0, 2.0, 3.0]), 2.0);
        assert_relative_eq!(sample_variance(&[1.0, 2.0, 3.0]), 1.0);
        assert_eq!(sample_variance(&[4.0]), 0.0);
        assert!(mean(&[]).is_nan());
        assert!(sample_variance(&[]).is_nan());
    }

    #[test]
    fn test_average_ranks_with_ties() {
        assert_eq!(average_ranks(&[10.0, 20.0, 20.0, 5.0]), vec![2.0, 3.5, 3.5, 1.0]);
        assert_eq!(average_ranks(&[1.0, 1.0, 1.0]), vec![2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_pearson_known_value() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [2.0, 4.0, 5.0, 4.0, 5.0];
        assert_relative_eq!(pearson(&x, &y).unwrap(), 0.774_596_669_241_483_4, epsilon = 1e-12);
        assert_relative_eq!(spearman(&x, &y).unwrap(), 7.0 / 90f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_perfect_correlation() {
        let x = [1.0, 2.0, 3.0];
        assert_relative_eq!(pearson(&x, &[2.0, 4.0, 6.0]).unwrap(), 1.0);
        assert_relative_eq!(pearson(&x, &[3.0, 2.0, 1.0]).unwrap(), -1.0);
        // Monotone but non-linear
        assert_relative_eq!(spearman(&x, &[1.0, 8.0, 27.0]).unwrap(), 1.0);
        assert_eq!(correlation_p_value(1.0, 3), 0.0);
    }

    #[test]
    fn test_degenerate_samples() {
        assert_eq!(pearson(&[1.0], &[2.0]), Err(CorrelationFlag::InsufficientSample));
        assert_eq!(pearson(&[], &[]), Err(CorrelationFlag::InsufficientSample));
        assert_eq!(pearson(&[0.1, 0.1, 0.1], &[1.0, 2.0, 3.0]), Err(CorrelationFlag::ZeroVariance));
        assert_eq!(spearman(&[1.0, 2.0], &[5.0, 5.0]), Err(CorrelationFlag::ZeroVariance));
    }

    #[test]
    fn test_incomplete_beta_closed_forms() {
        // I_x(1, 1) = x
        assert_relative_eq!(regularized_incomplete_beta(1.0, 1.0, 0.3), 0.3, epsilon = 1e-12);
        // I_x(1/2, 1/2) = (2 / pi) asin(sqrt(x))
        let expected = 2.0 / std::f64::consts::PI * 0.25f64.sqrt().asin();
        assert_relative_eq!(regularized_incomplete_beta(0.5, 0.5, 0.25), expected, epsilon = 1e-10);
        assert_eq!(regularized_incomplete_beta(2.0, 3.0, 0.0), 0.0);
        assert_eq!(regularized_incomplete_beta(2.0, 3.0, 1.0), 1.0);
    }

    #[test]
    fn test_ln_gamma() {
        assert_relative_eq!(ln_gamma(1.0), 0.0, epsilon = 1e-12);
        assert_relative_eq!(ln_gamma(5.0), 24f64.ln(), epsilon = 1e-12);
        assert_relative_eq!(ln_gamma(0.5), std::f64::consts::PI.sqrt().ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_p_value() {
        // r = 0.7746, n = 5: t = 2.1213 on 3 degrees of freedom
        let p = correlation_p_value(0.774_596_669_241_483_4, 5);
        assert_relative_eq!(p, 0.124_027, epsilon = 1e-5);

        assert_relative_eq!(correlation_p_value(0.0, 10), 1.0, epsilon = 1e-12);
        assert!(correlation_p_value(0.5, 2).is_nan());
        assert!(correlation_p_value(f64::NAN, 10).is_nan());
    }

    proptest! {
        #[test]
        fn prop_correlation_bounded(
            pairs in proptest::collection::vec((-100.0f64..100.0, -100.0f64..100.0), 3..40)
        ) {
            let (x, y): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();
            for r in [pearson(&x, &y), spearman(&x, &y)].into_iter().flatten() {
                prop_assert!((-1.0..=1.0).contains(&r));
                let p = correlation_p_value(r, x.len());
                prop_assert!((0.0..=1.0).contains(&p));
            }
        }

        #[test]
        fn prop_ranks_sum(values in proptest::collection::vec(0u8..5, 1..30)) {
            let values: Vec<f64> = values.into_iter().map(f64::from).collect();
            let n = values.len() as f64;
            let total: f64 = average_ranks(&values).iter().sum();
            prop_assert!((total - n * (n + 1.0) / 2.0).abs() < 1e-9);
        }
    }
}
