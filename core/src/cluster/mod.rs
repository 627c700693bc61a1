//! Clustering action library
//!
//! Five interchangeable clustering strategies behind one capability
//! contract: standardize the given feature subset, cluster it, and report a
//! silhouette quality score together with the per-row labelling. Registry
//! order is significant — the index of a strategy is the stable action
//! identifier the search engine learns over.
//!
//! Every strategy is resilient to near-singular or otherwise hostile input:
//! any internal numerical failure, and any labelling with fewer than two
//! clusters, is converted into the sentinel quality score rather than
//! propagated. The sentinel is the worst possible value, so a failed
//! evaluation can never win the search.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

pub mod dbscan;
pub mod kmeans;
pub mod kmedoids;
pub mod mean_shift;
pub mod mixture;
pub mod silhouette;

pub use self::dbscan::DbscanStrategy;
pub use self::kmeans::KMeansStrategy;
pub use self::kmedoids::KMedoidsStrategy;
pub use self::mean_shift::MeanShiftStrategy;
pub use self::mixture::MixtureStrategy;
pub use self::silhouette::silhouette;

use nalgebra::DMatrix;
use rand::RngCore;

/// Quality score substituted for any failed or degenerate evaluation.
/// True silhouette lies in [-1, 1], so this is the floor of the scale.
pub const SENTINEL_SCORE: f64 = -1.0;

/// Outcome of one clustering evaluation.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Silhouette coefficient of the labelling, or [`SENTINEL_SCORE`].
    pub score: f64,

    /// Cluster id per input row. A sentinel evaluation carries the
    /// single-cluster labelling (all zeros) so the row count is preserved.
    pub labels: Vec<usize>,
}

impl Evaluation {
    /// The sentinel evaluation for `n` rows.
    pub fn sentinel(n: usize) -> Self {
        Self {
            score: SENTINEL_SCORE,
            labels: vec![0; n],
        }
    }
}

/// One clustering capability: standardize, cluster, score.
///
/// Implementations must never panic or return an error for hostile input —
/// degenerate matrices, duplicated rows, single rows — and instead yield
/// [`Evaluation::sentinel`].
pub trait ClusteringStrategy: Send + Sync {
    /// Human-readable strategy name for logs and summaries.
    fn name(&self) -> &'static str;

    /// Clusters the (unscaled) feature-subset matrix and reports quality
    /// and labels. The strategy standardizes internally.
    fn evaluate(&self, matrix: &DMatrix<f64>, rng: &mut dyn RngCore) -> Evaluation;
}

/// Fixed, index-stable registry of clustering strategies.
///
/// The standard registry holds the five production strategies in their
/// canonical order. Tests substitute stubs through [`from_strategies`] to
/// drive the search engine without numerical work.
///
/// [`from_strategies`]: StrategyRegistry::from_strategies
pub struct StrategyRegistry {
    strategies: Vec<Box<dyn ClusteringStrategy>>,
}

impl StrategyRegistry {
    /// The production registry. Index order is a compatibility contract:
    /// 0 density, 1 mode-seeking, 2 medoid, 3 mixture, 4 centroid.
    pub fn standard() -> Self {
        Self {
            strategies: vec![
                Box::new(DbscanStrategy::default()),
                Box::new(MeanShiftStrategy::default()),
                Box::new(KMedoidsStrategy::default()),
                Box::new(MixtureStrategy::default()),
                Box::new(KMeansStrategy::default()),
            ],
        }
    }

    /// A registry over arbitrary strategies, in the given order.
    pub fn from_strategies(strategies: Vec<Box<dyn ClusteringStrategy>>) -> Self {
        Self { strategies }
    }

    /// Number of registered strategies (the action-space size).
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// True when no strategy is registered.
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// The strategy registered under `action`.
    pub fn get(&self, action: usize) -> &dyn ClusteringStrategy {
        self.strategies[action].as_ref()
    }

    /// Registered names in action order.
    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("strategies", &self.names())
            .finish()
    }
}

/// Silhouette of `labels` over `scaled`, or the sentinel when scoring is
/// impossible.
pub(crate) fn score_or_sentinel(scaled: &DMatrix<f64>, labels: &[usize]) -> f64 {
    silhouette(scaled, labels).unwrap_or(SENTINEL_SCORE)
}

/// Draws an index with probability proportional to `weights`. Falls back to
/// uniform when the weights carry no mass (all zero, or non-finite).
pub(crate) fn weighted_choice(weights: &[f64], rng: &mut dyn RngCore) -> usize {
    use rand::Rng;
    let total: f64 = weights.iter().filter(|w| w.is_finite()).sum();
    if total <= 0.0 {
        return rng.gen_range(0..weights.len());
    }
    let mut draw = rng.gen_range(0.0..total);
    for (i, w) in weights.iter().enumerate() {
        if !w.is_finite() {
            continue;
        }
        draw -= w;
        if draw <= 0.0 {
            return i;
        }
    }
    weights.len() - 1
}

/// Squared Euclidean distance between rows `a` and `b` of `m`.
pub(crate) fn row_distance_sq(m: &DMatrix<f64>, a: usize, b: usize) -> f64 {
    let mut sum = 0.0;
    for c in 0..m.ncols() {
        let d = m[(a, c)] - m[(b, c)];
        sum += d * d;
    }
    sum
}

/// Euclidean distance between rows `a` and `b` of `m`.
pub(crate) fn row_distance(m: &DMatrix<f64>, a: usize, b: usize) -> f64 {
    row_distance_sq(m, a, b).sqrt()
}

/// Full pairwise Euclidean distance matrix over the rows of `m`.
pub(crate) fn distance_matrix(m: &DMatrix<f64>) -> DMatrix<f64> {
    let n = m.nrows();
    let mut distances = DMatrix::zeros(n, n);
    for a in 0..n {
        for b in (a + 1)..n {
            let d = row_distance(m, a, b);
            distances[(a, b)] = d;
            distances[(b, a)] = d;
        }
    }
    distances
}


#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn standard_registry_has_five_actions_in_canonical_order() {
        let registry = StrategyRegistry::standard();
        assert_eq!(registry.len(), 5);
        assert_eq!(
            registry.names(),
            vec![
                "density clustering",
                "mode-seeking clustering",
                "medoid clustering",
                "mixture-model clustering",
                "centroid clustering",
            ]
        );
    }

    #[test]
    fn every_strategy_survives_a_single_row() {
        // A strategy invoked on a single-row subset must yield the sentinel
        // and must not panic.
        let registry = StrategyRegistry::standard();
        let single = DMatrix::from_row_slice(1, 3, &[1.0, 2.0, 3.0]);
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        for action in 0..registry.len() {
            let eval = registry.get(action).evaluate(&single, &mut rng);
            assert_eq!(eval.score, SENTINEL_SCORE, "action {action}");
            assert_eq!(eval.labels.len(), 1);
        }
    }

    #[test]
    fn every_strategy_separates_planted_blobs() {
        let mut rng = ChaCha20Rng::seed_from_u64(23);
        let matrix = testing::two_blobs(30, 30, 2, &mut rng);
        let registry = StrategyRegistry::standard();
        for action in 0..registry.len() {
            let eval = registry.get(action).evaluate(&matrix, &mut rng);
            assert!(
                eval.score > 0.5,
                "action {action} scored {} on trivially separable data",
                eval.score
            );
            assert_eq!(eval.labels.len(), 60);
        }
    }

    #[test]
    fn weighted_choice_respects_mass() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let weights = [0.0, 0.0, 5.0, 0.0];
        for _ in 0..50 {
            assert_eq!(weighted_choice(&weights, &mut rng), 2);
        }
    }

    #[test]
    fn weighted_choice_with_no_mass_still_returns_an_index() {
        let mut rng = ChaCha20Rng::seed_from_u64(4);
        let weights = [0.0, 0.0];
        let i = weighted_choice(&weights, &mut rng);
        assert!(i < 2);
    }
}
