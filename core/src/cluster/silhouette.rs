//! Silhouette coefficient of a labelling.
//!
//! For each row i with intra-cluster mean distance a(i) and smallest
//! other-cluster mean distance b(i), the silhouette is
//! `(b(i) − a(i)) / max(a(i), b(i))`; the coefficient is the mean over all
//! rows, in [-1, 1]. Singleton clusters contribute 0 for their row.

use std::collections::HashMap;

use nalgebra::DMatrix;

use super::row_distance;

/// Silhouette coefficient of `labels` over the rows of `matrix`.
///
/// Returns `None` when the labelling cannot be scored: fewer than two
/// distinct clusters, more clusters than `rows − 1`, a label/row mismatch,
/// or a non-finite result.
pub fn silhouette(matrix: &DMatrix<f64>, labels: &[usize]) -> Option<f64> {
    let n = matrix.nrows();
    if labels.len() != n || n < 2 {
        return None;
    }

    // Map arbitrary cluster ids to contiguous indices and count members.
    let mut index_of: HashMap<usize, usize> = HashMap::new();
    for label in labels {
        let next = index_of.len();
        index_of.entry(*label).or_insert(next);
    }
    let k = index_of.len();
    if k < 2 || k > n - 1 {
        return None;
    }
    let compact: Vec<usize> = labels.iter().map(|l| index_of[l]).collect();
    let mut counts = vec![0usize; k];
    for c in &compact {
        counts[*c] += 1;
    }

    let mut total = 0.0;
    let mut sums = vec![0.0; k];
    for i in 0..n {
        for s in sums.iter_mut() {
            *s = 0.0;
        }
        for j in 0..n {
            if i != j {
                sums[compact[j]] += row_distance(matrix, i, j);
            }
        }
        let own = compact[i];
        if counts[own] <= 1 {
            // Singleton: defined as zero contribution.
            continue;
        }
        let a = sums[own] / (counts[own] - 1) as f64;
        let b = (0..k)
            .filter(|c| *c != own)
            .map(|c| sums[c] / counts[c] as f64)
            .fold(f64::INFINITY, f64::min);
        let denom = a.max(b);
        if denom > 0.0 {
            total += (b - a) / denom;
        }
    }

    let coefficient = total / n as f64;
    coefficient.is_finite().then_some(coefficient)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn separated_blobs_score_high() {
        let matrix = DMatrix::from_row_slice(6, 1, &[0.0, 0.1, 0.2, 10.0, 10.1, 10.2]);
        let labels = [0, 0, 0, 1, 1, 1];
        let score = silhouette(&matrix, &labels).unwrap();
        assert!(score > 0.9, "got {score}");
    }

    #[test]
    fn inverted_labelling_scores_negative() {
        let matrix = DMatrix::from_row_slice(4, 1, &[0.0, 10.0, 0.1, 10.1]);
        let labels = [0, 0, 1, 1];
        let score = silhouette(&matrix, &labels).unwrap();
        assert!(score < 0.0, "got {score}");
    }

    #[test]
    fn single_cluster_is_unscorable() {
        let matrix = DMatrix::from_row_slice(3, 1, &[0.0, 1.0, 2.0]);
        assert_eq!(silhouette(&matrix, &[0, 0, 0]), None);
    }

    #[test]
    fn all_singletons_are_unscorable() {
        let matrix = DMatrix::from_row_slice(3, 1, &[0.0, 1.0, 2.0]);
        assert_eq!(silhouette(&matrix, &[0, 1, 2]), None);
    }

    #[test]
    fn perfect_two_point_split_is_maximal() {
        let matrix = DMatrix::from_row_slice(4, 1, &[0.0, 0.0, 5.0, 5.0]);
        let score = silhouette(&matrix, &[0, 0, 1, 1]).unwrap();
        assert_relative_eq!(score, 1.0);
    }
}
