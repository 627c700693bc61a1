//! Density-based clustering (action 0).
//!
//! Classic DBSCAN with a fixed neighborhood radius and minimum-neighbor
//! count over the standardized subset. Noise points are not discarded:
//! they are reassigned to one fresh synthetic cluster id past the largest
//! core cluster, so every row keeps a label and a large noise fringe can
//! itself surface as an anomalous cluster downstream.

use nalgebra::DMatrix;
use rand::RngCore;

use crate::data::standardize;

use super::{row_distance_sq, score_or_sentinel, ClusteringStrategy, Evaluation};

/// Density clustering with fixed radius and neighbor threshold.
#[derive(Debug, Clone)]
pub struct DbscanStrategy {
    /// Neighborhood radius in standardized units.
    pub eps: f64,

    /// Neighbors (self included) required for a core point.
    pub min_samples: usize,
}

impl Default for DbscanStrategy {
    fn default() -> Self {
        Self {
            eps: 0.5,
            min_samples: 5,
        }
    }
}

impl ClusteringStrategy for DbscanStrategy {
    fn name(&self) -> &'static str {
        "density clustering"
    }

    fn evaluate(&self, matrix: &DMatrix<f64>, _rng: &mut dyn RngCore) -> Evaluation {
        let n = matrix.nrows();
        if n < 2 || matrix.ncols() == 0 {
            return Evaluation::sentinel(n);
        }
        let scaled = standardize(matrix);
        let labels = self.cluster(&scaled);
        let score = score_or_sentinel(&scaled, &labels);
        Evaluation { score, labels }
    }
}

impl DbscanStrategy {
    fn cluster(&self, scaled: &DMatrix<f64>) -> Vec<usize> {
        let n = scaled.nrows();
        let eps_sq = self.eps * self.eps;
        let neighborhoods: Vec<Vec<usize>> = (0..n)
            .map(|i| {
                (0..n)
                    .filter(|j| row_distance_sq(scaled, i, *j) <= eps_sq)
                    .collect()
            })
            .collect();

        let mut labels: Vec<Option<usize>> = vec![None; n];
        let mut next_cluster = 0usize;
        for seed in 0..n {
            if labels[seed].is_some() || neighborhoods[seed].len() < self.min_samples {
                continue;
            }
            // Grow a new cluster from this core point.
            let cluster = next_cluster;
            next_cluster += 1;
            labels[seed] = Some(cluster);
            let mut frontier = neighborhoods[seed].clone();
            while let Some(point) = frontier.pop() {
                if labels[point].is_some() {
                    continue;
                }
                labels[point] = Some(cluster);
                if neighborhoods[point].len() >= self.min_samples {
                    frontier.extend(neighborhoods[point].iter().copied());
                }
            }
        }

        // Noise joins one synthetic cluster after the last core cluster.
        let noise_id = next_cluster;
        labels.into_iter().map(|l| l.unwrap_or(noise_id)).collect()
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
    fn dense_blobs_form_two_clusters() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let matrix = two_blobs(40, 40, 2, &mut rng);
        let eval = DbscanStrategy::default().evaluate(&matrix, &mut rng);
        let mut distinct = eval.labels.clone();
        distinct.sort_unstable();
        distinct.dedup();
        assert_eq!(distinct.len(), 2);
        assert!(eval.score > 0.5);
    }

    #[test]
    fn noise_points_receive_a_synthetic_cluster() {
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        // Two tight blobs plus one far outlier that can never be core.
        let mut cells = Vec::new();
        for r in 0..12 {
            let c = if r < 6 { 0.0 } else { 4.0 };
            cells.push(c + (r % 6) as f64 * 0.01);
        }
        cells.push(100.0);
        let matrix = DMatrix::from_column_slice(13, 1, &cells);
        let eval = DbscanStrategy {
            eps: 0.5,
            min_samples: 3,
        }
        .evaluate(&matrix, &mut rng);
        let outlier_label = eval.labels[12];
        assert!(eval.labels[..12].iter().all(|l| *l != outlier_label));
    }

    #[test]
    fn uniform_sparse_points_yield_sentinel() {
        // Every point isolated at min_samples=5: all noise collapses into
        // one cluster, which is unscorable.
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let matrix = DMatrix::from_fn(8, 1, |r, _| r as f64 * 100.0);
        let eval = DbscanStrategy::default().evaluate(&matrix, &mut rng);
        assert_eq!(eval.score, SENTINEL_SCORE);
        assert_eq!(eval.labels.len(), 8);
    }
}
