//! Mode-seeking clustering (action 1).
//!
//! Flat-kernel mean shift over the standardized subset. The bandwidth is
//! estimated from a random sample of the data — the mean distance to the
//! quantile-th nearest neighbor — and falls back to a fixed value when the
//! estimate degenerates to zero (duplicated rows collapse every sampled
//! neighborhood). Seeds come from a coarse grid binning of the input, and
//! converged modes closer than one bandwidth are merged, larger support
//! winning.

use std::collections::BTreeMap;

use nalgebra::DMatrix;
use rand::RngCore;

use crate::data::standardize;

use super::{row_distance, score_or_sentinel, ClusteringStrategy, Evaluation};

/// Bandwidth used when estimation degenerates to zero.
const FALLBACK_BANDWIDTH: f64 = 1.0;

/// Iteration cap for one seed's shift trajectory.
const MAX_SHIFT_ITERATIONS: usize = 300;

/// Mode-seeking clustering with sampled bandwidth estimation.
#[derive(Debug, Clone)]
pub struct MeanShiftStrategy {
    /// Quantile of pairwise neighbor ranks used for bandwidth estimation.
    pub quantile: f64,

    /// Upper bound on the number of rows sampled for estimation.
    pub sample_cap: usize,
}

impl Default for MeanShiftStrategy {
    fn default() -> Self {
        Self {
            quantile: 0.3,
            sample_cap: 500,
        }
    }
}

impl ClusteringStrategy for MeanShiftStrategy {
    fn name(&self) -> &'static str {
        "mode-seeking clustering"
    }

    fn evaluate(&self, matrix: &DMatrix<f64>, rng: &mut dyn RngCore) -> Evaluation {
        let n = matrix.nrows();
        if n < 2 || matrix.ncols() == 0 {
            return Evaluation::sentinel(n);
        }
        let scaled = standardize(matrix);

        let mut bandwidth = self.estimate_bandwidth(&scaled, rng);
        if !(bandwidth > 0.0) || !bandwidth.is_finite() {
            bandwidth = FALLBACK_BANDWIDTH;
        }

        let labels = match self.cluster(&scaled, bandwidth) {
            Some(labels) => labels,
            None => return Evaluation::sentinel(n),
        };
        let score = score_or_sentinel(&scaled, &labels);
        Evaluation { score, labels }
    }
}

impl MeanShiftStrategy {
    /// Mean, over a random sample of rows, of the distance to the
    /// `⌊n·quantile⌋`-th nearest neighbor (self counts as neighbor zero).
    fn estimate_bandwidth(&self, scaled: &DMatrix<f64>, rng: &mut dyn RngCore) -> f64 {
        let n = scaled.nrows();
        let sample_size = self.sample_cap.min(n);
        let sampled = rand::seq::index::sample(&mut *rng, n, sample_size);
        let k = ((n as f64 * self.quantile) as usize).max(1);

        let mut total = 0.0;
        for i in sampled.iter() {
            let mut distances: Vec<f64> = (0..n).map(|j| row_distance(scaled, i, j)).collect();
            distances.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            total += distances[k.min(n - 1)];
        }
        total / sample_size as f64
    }

    /// Runs the shift from grid-binned seeds; `None` when no seed survives.
    fn cluster(&self, scaled: &DMatrix<f64>, bandwidth: f64) -> Option<Vec<usize>> {
        let n = scaled.nrows();
        let d = scaled.ncols();
        let stop_threshold = 1e-3 * bandwidth;

        // Grid seeds: one per occupied bandwidth-sized bin. Ordered keys
        // keep seeded runs reproducible.
        let mut bins: BTreeMap<Vec<i64>, Vec<f64>> = BTreeMap::new();
        for r in 0..n {
            let key: Vec<i64> = (0..d)
                .map(|c| (scaled[(r, c)] / bandwidth).round() as i64)
                .collect();
            bins.entry(key.clone())
                .or_insert_with(|| key.iter().map(|k| *k as f64 * bandwidth).collect());
        }

        // Shift every seed to its mode.
        let mut modes: Vec<(Vec<f64>, usize)> = Vec::new();
        for (_, mut seed) in bins {
            let mut support = 0usize;
            for _ in 0..MAX_SHIFT_ITERATIONS {
                let mut mean = vec![0.0; d];
                support = 0;
                for r in 0..n {
                    let dist: f64 = (0..d)
                        .map(|c| (scaled[(r, c)] - seed[c]).powi(2))
                        .sum::<f64>()
                        .sqrt();
                    if dist <= bandwidth {
                        support += 1;
                        for c in 0..d {
                            mean[c] += scaled[(r, c)];
                        }
                    }
                }
                if support == 0 {
                    break;
                }
                for v in mean.iter_mut() {
                    *v /= support as f64;
                }
                let shift: f64 = (0..d)
                    .map(|c| (mean[c] - seed[c]).powi(2))
                    .sum::<f64>()
                    .sqrt();
                seed = mean;
                if shift < stop_threshold {
                    break;
                }
            }
            if support > 0 {
                modes.push((seed, support));
            }
        }
        if modes.is_empty() {
            return None;
        }

        // Merge modes within one bandwidth of a better-supported mode.
        modes.sort_by(|a, b| b.1.cmp(&a.1));
        let mut centers: Vec<Vec<f64>> = Vec::new();
        for (mode, _) in modes {
            let merged = centers.iter().any(|kept| {
                let dist: f64 = kept
                    .iter()
                    .zip(&mode)
                    .map(|(a, b)| (a - b).powi(2))
                    .sum::<f64>()
                    .sqrt();
                dist < bandwidth
            });
            if !merged {
                centers.push(mode);
            }
        }

        // Label each row by its nearest surviving center.
        let labels = (0..n)
            .map(|r| {
                let mut best = 0usize;
                let mut best_dist = f64::INFINITY;
                for (i, center) in centers.iter().enumerate() {
                    let dist: f64 = (0..d)
                        .map(|c| (scaled[(r, c)] - center[c]).powi(2))
                        .sum::<f64>()
                        .sqrt();
                    if dist < best_dist {
                        best_dist = dist;
                        best = i;
                    }
                }
                best
            })
            .collect();
        Some(labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::testing::two_blobs;
    use crate::cluster::SENTINEL_SCORE;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn separated_blobs_yield_two_modes() {
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let matrix = two_blobs(50, 50, 2, &mut rng);
        let eval = MeanShiftStrategy::default().evaluate(&matrix, &mut rng);
        let mut distinct = eval.labels.clone();
        distinct.sort_unstable();
        distinct.dedup();
        assert_eq!(distinct.len(), 2);
        assert!(eval.score > 0.5, "got {}", eval.score);
    }

    #[test]
    fn identical_rows_fall_back_to_fixed_bandwidth_and_sentinel() {
        // Every pairwise distance is zero, so estimation degenerates and a
        // single mode swallows everything: unscorable, hence sentinel.
        let mut rng = ChaCha20Rng::seed_from_u64(6);
        let matrix = DMatrix::from_element(10, 2, 3.0);
        let eval = MeanShiftStrategy::default().evaluate(&matrix, &mut rng);
        assert_eq!(eval.score, SENTINEL_SCORE);
        assert_eq!(eval.labels.len(), 10);
    }
}
