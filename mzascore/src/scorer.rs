//! Binomial probability scores for matched fragment ion counts
use probability::distribution::{Binomial, Discrete};

use crate::error::InvalidInput;

pub type ScoreType = f64;

/// The smallest probability a score is computed from. Anything smaller would
/// produce an infinite score.
pub const MIN_PROBABILITY: f64 = f64::MIN_POSITIVE;

/// The largest score [`binomial_score`] can produce, from [`MIN_PROBABILITY`]
pub fn max_score() -> ScoreType {
    -10.0 * MIN_PROBABILITY.log10()
}

/// The probability of matching at least `n` of `total` ions by chance when each
/// matches independently with probability `p`.
///
/// $$ P(X \ge n) = \sum_{k=n}^{N} \binom{N}{k} p^k (1 - p)^{N - k} $$
///
/// `n == 0` is exactly `1.0`, and `n > total` is `0.0`.
pub fn cumulative_binomial(total: usize, n: usize, p: f64) -> f64 {
    if n == 0 {
        return 1.0;
    }
    if n > total {
        return 0.0;
    }
    let distribution = Binomial::new(total, p);
    // summing from the tail up makes the result non-increasing in `n`
    let mut acc = 0.0;
    for k in (n..=total).rev() {
        acc += distribution.mass(k);
    }
    acc.clamp(0.0, 1.0)
}

/// Convert a matched/possible ion count pair into `-10 log10 P(X >= n)`.
///
/// The result is always finite and non-negative: underflowing probabilities are
/// clamped to [`MIN_PROBABILITY`].
pub fn binomial_score(total: usize, n: usize, p: f64) -> ScoreType {
    let probability = cumulative_binomial(total, n, p);
    if probability >= 1.0 {
        return 0.0;
    }
    -10.0 * probability.max(MIN_PROBABILITY).log10()
}

/// The chance that a theoretical ion coincides with one of the `depth` most intense
/// peaks of a `window_width` m/z window.
pub fn match_probability(depth: usize, window_width: f64) -> f64 {
    depth as f64 / window_width
}

/// Weights for combining per-depth scores into a single peptide score.
///
/// The default is the weighting from Beausoleil et al.[^1], which favors the
/// middle depths.
///
/// # References
/// [^1]: Beausoleil SA, Villén J, Gerber SA, Rush J, Gygi SP: A probability-based
///       approach for high-throughput protein phosphorylation analysis and site
///       localization. Nature Biotechnology 2006, 24:1285-1292
///       <https://doi.org/10.1038/nbt1240>
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DepthWeights(pub Vec<f64>);

impl Default for DepthWeights {
    fn default() -> Self {
        Self(vec![0.5, 0.75, 1.0, 1.0, 1.0, 1.0, 0.75, 0.5, 0.25, 0.25])
    }
}

impl DepthWeights {
    pub fn new(weights: Vec<f64>) -> Result<Self, InvalidInput> {
        let weights = Self(weights);
        weights.validate()?;
        Ok(weights)
    }

    /// Equal weight at every depth in `1..=depths`
    pub fn uniform(depths: usize) -> Self {
        Self(vec![1.0; depths])
    }

    pub fn validate(&self) -> Result<(), InvalidInput> {
        let all_valid = self.0.iter().all(|w| w.is_finite() && *w >= 0.0);
        let any_positive = self.0.iter().any(|w| *w > 0.0);
        if all_valid && any_positive {
            Ok(())
        } else {
            Err(InvalidInput::InvalidDepthWeights)
        }
    }

    /// The number of depths these weights cover
    pub fn depths(&self) -> usize {
        self.0.len()
    }

    /// Combine the per-depth `scores` of a permutation, `scores[d - 1]` being the
    /// score at depth `d`, into the ranking key for that permutation.
    pub fn peptide_score(&self, scores: &[ScoreType]) -> ScoreType {
        let total: ScoreType = self
            .0
            .iter()
            .zip(scores.iter())
            .map(|(w, s)| w * s)
            .sum();
        total / self.depths() as ScoreType
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_compute_cumulative_score() {
        assert!((cumulative_binomial(1, 1, 0.1) - 0.1).abs() < 1e-9);
        assert!((cumulative_binomial(3, 1, 0.1) - 0.271).abs() < 1e-9);
        assert!((cumulative_binomial(3, 3, 0.1) - 0.001).abs() < 1e-12);
        assert_eq!(cumulative_binomial(3, 4, 0.1), 0.0);
    }

    #[test]
    fn test_cumulative_edges() {
        for total in [0, 1, 5, 40] {
            for p in [0.01, 0.05, 0.1] {
                assert_eq!(cumulative_binomial(total, 0, p), 1.0);
                let all = cumulative_binomial(total, total, p);
                if total > 0 {
                    let expected = p.powi(total as i32);
                    assert!((all - expected).abs() <= expected * 1e-6);
                }
            }
        }
    }

    #[test]
    fn test_score_values() {
        assert_eq!(binomial_score(10, 0, 0.05), 0.0);
        assert!((binomial_score(1, 1, 0.1) - 10.0).abs() < 1e-6);
        assert!((binomial_score(2, 2, 0.01) - 40.0).abs() < 1e-6);
    }

    #[test]
    fn test_score_is_finite() {
        let score = binomial_score(2000, 2000, 0.01);
        assert!(score.is_finite());
        assert!((score - max_score()).abs() < 1e-6);
        assert!(binomial_score(5, 6, 0.1).is_finite());
    }

    #[test]
    fn test_score_monotonicity() {
        for total in [1usize, 7, 20] {
            for depth in 1..=10 {
                let p = match_probability(depth, 100.0);
                let mut last = -1.0;
                for n in 0..=total {
                    let score = binomial_score(total, n, p);
                    assert!(score >= last, "score fell at N={total} n={n} p={p}");
                    last = score;
                }
            }
            for n in 0..=total {
                let mut last = f64::INFINITY;
                for depth in 1..=10 {
                    let score = binomial_score(total, n, match_probability(depth, 100.0));
                    assert!(score <= last + 1e-9, "score rose at N={total} n={n} d={depth}");
                    last = score;
                }
            }
        }
    }

    #[test]
    fn test_peptide_score() {
        let weights = DepthWeights::default();
        assert_eq!(weights.depths(), 10);
        let scores = [55.0, 60.0, 75.0, 100.0, 90.0, 120.0, 125.0, 120.0, 100.0, 90.0];
        let expected = (55.0 * 0.5
            + 60.0 * 0.75
            + 75.0
            + 100.0
            + 90.0
            + 120.0
            + 125.0 * 0.75
            + 120.0 * 0.5
            + 100.0 * 0.25
            + 90.0 * 0.25)
            / 10.0;
        assert!((weights.peptide_score(&scores) - expected).abs() < 1e-9);
        assert!((DepthWeights::uniform(2).peptide_score(&[1.0, 3.0]) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_weight_validation() {
        assert!(DepthWeights::new(vec![1.0, 0.5]).is_ok());
        assert_eq!(
            DepthWeights::new(vec![]),
            Err(InvalidInput::InvalidDepthWeights)
        );
        assert_eq!(
            DepthWeights::new(vec![0.0, -1.0]),
            Err(InvalidInput::InvalidDepthWeights)
        );
        assert_eq!(
            DepthWeights::new(vec![f64::NAN]),
            Err(InvalidInput::InvalidDepthWeights)
        );
    }
}
