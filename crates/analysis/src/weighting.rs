//! Predecessor weighting
//!
//! The inheritance engine asks a [`WeightingPolicy`] for the weight of every
//! citing -> cited pair. The built-in schemes from configuration implement it,
//! and so does any closure taking a [`WeightContext`].

use chrono::NaiveDate;
use paperlineage_common::config::WeightingScheme;
use paperlineage_common::PaperId;

/// Everything a weighting policy may look at for one citation
#[derive(Debug, Clone, Copy)]
pub struct WeightContext<'a> {
    pub citing: &'a PaperId,
    pub cited: &'a PaperId,
    pub citing_date: Option<NaiveDate>,
    pub cited_date: Option<NaiveDate>,
    /// Citations the predecessor receives within the graph
    pub cited_in_degree: usize,
    /// References the predecessor makes within the graph
    pub cited_out_degree: usize,
    pub confidence: Option<f64>,
}

impl WeightContext<'_> {
    /// Days between the two publications, if both are dated
    pub fn age_days(&self) -> Option<i64> {
        match (self.citing_date, self.cited_date) {
            (Some(citing), Some(cited)) => Some((citing - cited).num_days().abs()),
            _ => None,
        }
    }
}

/// Weight of a predecessor in the citing paper's weighted average
pub trait WeightingPolicy: Send + Sync {
    fn weight(&self, ctx: &WeightContext<'_>) -> f64;
}

impl<F> WeightingPolicy for F
where
    F: Fn(&WeightContext<'_>) -> f64 + Send + Sync,
{
    fn weight(&self, ctx: &WeightContext<'_>) -> f64 {
        self(ctx)
    }
}

impl WeightingPolicy for WeightingScheme {
    fn weight(&self, ctx: &WeightContext<'_>) -> f64 {
        match *self {
            WeightingScheme::Uniform => 1.0,
            WeightingScheme::Recency { half_life_days } => match ctx.age_days() {
                Some(age) if half_life_days > 0.0 && half_life_days.is_finite() => {
                    0.5f64.powf(age as f64 / half_life_days)
                }
                _ => 1.0,
            },
            WeightingScheme::OutDegree => 1.0 / (1.0 + ctx.cited_out_degree as f64),
            WeightingScheme::InDegree => 1.0 + (ctx.cited_in_degree as f64).ln_1p(),
            WeightingScheme::EdgeConfidence => ctx.confidence.unwrap_or(1.0),
        }
    }
}

/// Clamp a raw weight to something usable in a weighted sum
pub(crate) fn sanitize(weight: f64) -> f64 {
    if weight.is_finite() && weight > 0.0 {
        weight
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn context<'a>(citing: &'a PaperId, cited: &'a PaperId) -> WeightContext<'a> {
        WeightContext {
            citing,
            cited,
            citing_date: NaiveDate::from_ymd_opt(2021, 1, 1),
            cited_date: NaiveDate::from_ymd_opt(2020, 1, 1),
            cited_in_degree: 3,
            cited_out_degree: 4,
            confidence: Some(0.25),
        }
    }

    #[test]
    fn test_builtin_schemes() {
        let (a, b) = (PaperId::from("a"), PaperId::from("b"));
        let ctx = context(&a, &b);

        assert_relative_eq!(WeightingScheme::Uniform.weight(&ctx), 1.0);
        assert_relative_eq!(WeightingScheme::OutDegree.weight(&ctx), 0.2);
        assert_relative_eq!(WeightingScheme::InDegree.weight(&ctx), 1.0 + 4f64.ln());
        assert_relative_eq!(WeightingScheme::EdgeConfidence.weight(&ctx), 0.25);

        // 366 days between the two dates (2020 is a leap year)
        let recency = WeightingScheme::Recency { half_life_days: 366.0 };
        assert_relative_eq!(recency.weight(&ctx), 0.5);
    }

    #[test]
    fn test_recency_undated_is_neutral() {
        let (a, b) = (PaperId::from("a"), PaperId::from("b"));
        let ctx = WeightContext {
            cited_date: None,
            ..context(&a, &b)
        };
        let recency = WeightingScheme::Recency { half_life_days: 30.0 };
        assert_relative_eq!(recency.weight(&ctx), 1.0);
    }

    #[test]
    fn test_missing_confidence_is_neutral() {
        let (a, b) = (PaperId::from("a"), PaperId::from("b"));
        let ctx = WeightContext {
            confidence: None,
            ..context(&a, &b)
        };
        assert_relative_eq!(WeightingScheme::EdgeConfidence.weight(&ctx), 1.0);
    }

    #[test]
    fn test_closure_policy() {
        let (a, b) = (PaperId::from("a"), PaperId::from("b"));
        let policy = |ctx: &WeightContext<'_>| ctx.cited_in_degree as f64 * 2.0;
        assert_relative_eq!(policy.weight(&context(&a, &b)), 6.0);
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize(-1.0), 0.0);
        assert_eq!(sanitize(f64::NAN), 0.0);
        assert_eq!(sanitize(f64::INFINITY), 0.0);
        assert_eq!(sanitize(0.5), 0.5);
    }
}
