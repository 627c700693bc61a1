//! Size-based anomalous-cluster extraction
//!
//! Anomalies are records that the winning configuration's clustering set
//! apart in under-sized clusters. The rule is purely statistical over the
//! cluster-size distribution: every cluster whose fraction of rows falls
//! strictly below the mean fraction is flagged. When no cluster does — a
//! near-balanced partition — the two smallest clusters are compared and the
//! smallest is flagged only when it is meaningfully smaller (below 80% of
//! the second-smallest). An empty anomaly set is a valid outcome and is
//! distinguishable from every failure mode.
//!
//! Extraction is idempotent: it reads the labelled dataset and writes
//! nothing back.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::data::ClusteredDataset;
use crate::features::FeatureShortlist;

/// The smallest cluster must be below this fraction of the second-smallest
/// to be flagged when nothing falls under the mean.
pub const SIZE_RATIO_THRESHOLD: f64 = 0.8;

/// The extracted anomaly table with its context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyResult {
    /// The anomaly-flagged rows: same columns as the input, plus the
    /// cluster-id column. Empty when no cluster qualified.
    pub rows: ClusteredDataset,

    /// Cluster-size distribution: cluster id → fraction of all rows.
    pub distribution: BTreeMap<usize, f64>,

    /// The feature shortlist the winning configuration used.
    pub features: FeatureShortlist,
}

impl AnomalyResult {
    /// True when the rule flagged nothing — a valid outcome.
    pub fn is_empty(&self) -> bool {
        self.rows.n_rows() == 0
    }

    /// Ids of the flagged clusters, ascending.
    pub fn flagged_clusters(&self) -> Vec<usize> {
        self.rows
            .clusters()
            .iter()
            .copied()
            .collect::<BTreeSet<usize>>()
            .into_iter()
            .collect()
    }
}

/// Applies the size rule to a labelled dataset.
pub fn extract_anomalies(
    clustered: &ClusteredDataset,
    features: &FeatureShortlist,
) -> AnomalyResult {
    let n = clustered.n_rows();
    let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
    for cluster in clustered.clusters() {
        *counts.entry(*cluster).or_insert(0) += 1;
    }
    let distribution: BTreeMap<usize, f64> = counts
        .iter()
        .map(|(id, count)| (*id, *count as f64 / n.max(1) as f64))
        .collect();

    let flagged = flag_clusters(&distribution);
    log::debug!(
        "{} of {} clusters flagged anomalous: {:?}",
        flagged.len(),
        distribution.len(),
        flagged
    );

    AnomalyResult {
        rows: clustered.filter_clusters(|c| flagged.contains(&c)),
        distribution,
        features: features.clone(),
    }
}

/// The cluster ids the size rule flags.
fn flag_clusters(distribution: &BTreeMap<usize, f64>) -> BTreeSet<usize> {
    if distribution.is_empty() {
        return BTreeSet::new();
    }
    let mean = distribution.values().sum::<f64>() / distribution.len() as f64;
    let flagged: BTreeSet<usize> = distribution
        .iter()
        .filter(|(_, fraction)| **fraction < mean)
        .map(|(id, _)| *id)
        .collect();
    if !flagged.is_empty() {
        return flagged;
    }

    // Nothing under the mean: compare the two smallest clusters. A single
    // cluster has no pair to compare and flags nothing.
    let mut sorted: Vec<(f64, usize)> = distribution.iter().map(|(id, f)| (*f, *id)).collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    if sorted.len() >= 2 && sorted[0].0 < SIZE_RATIO_THRESHOLD * sorted[1].0 {
        return BTreeSet::from([sorted[0].1]);
    }
    BTreeSet::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Dataset;
    use nalgebra::DMatrix;

    fn clustered(sizes: &[usize]) -> ClusteredDataset {
        let n: usize = sizes.iter().sum();
        let mut labels = Vec::with_capacity(n);
        for (cluster, size) in sizes.iter().enumerate() {
            labels.extend(std::iter::repeat(cluster).take(*size));
        }
        let matrix = DMatrix::from_fn(n, 2, |r, c| (r * 2 + c) as f64);
        let dataset =
            Dataset::new(vec!["uid".into(), "value".into()], matrix, "uid").unwrap();
        ClusteredDataset::new(dataset, labels).unwrap()
    }

    fn shortlist() -> FeatureShortlist {
        FeatureShortlist::new(["value".to_string()])
    }

    #[test]
    fn ninety_ten_split_flags_the_small_cluster() {
        let result = extract_anomalies(&clustered(&[90, 10]), &shortlist());
        assert_eq!(result.flagged_clusters(), vec![1]);
        assert_eq!(result.rows.n_rows(), 10);
    }

    #[test]
    fn forty_forty_twenty_flags_only_the_twenty() {
        let result = extract_anomalies(&clustered(&[40, 40, 20]), &shortlist());
        assert_eq!(result.flagged_clusters(), vec![2]);
        assert_eq!(result.rows.n_rows(), 20);
    }

    #[test]
    fn balanced_split_flags_nothing() {
        let result = extract_anomalies(&clustered(&[50, 50]), &shortlist());
        assert!(result.is_empty());
        assert_eq!(result.distribution.len(), 2);
    }

    #[test]
    fn minority_cluster_below_the_mean_is_flagged() {
        let result = extract_anomalies(&clustered(&[45, 45, 10]), &shortlist());
        assert_eq!(result.flagged_clusters(), vec![2]);
    }

    #[test]
    fn equal_smallest_pair_flags_nothing() {
        let result = extract_anomalies(&clustered(&[25, 25, 25, 25]), &shortlist());
        assert!(result.is_empty());
    }

    #[test]
    fn single_cluster_flags_nothing() {
        let result = extract_anomalies(&clustered(&[100]), &shortlist());
        assert!(result.is_empty());
    }

    #[test]
    fn extraction_is_idempotent() {
        let data = clustered(&[60, 25, 15]);
        let first = extract_anomalies(&data, &shortlist());
        let second = extract_anomalies(&data, &shortlist());
        assert_eq!(first.flagged_clusters(), second.flagged_clusters());
        assert_eq!(first.rows.n_rows(), second.rows.n_rows());
        assert_eq!(first.distribution, second.distribution);
    }

    #[test]
    fn distribution_sums_to_one() {
        let result = extract_anomalies(&clustered(&[70, 20, 10]), &shortlist());
        let total: f64 = result.distribution.values().sum();
        approx::assert_relative_eq!(total, 1.0, epsilon = 1e-12);
    }
}
