//! Variance-weighted feature importance ranking
//!
//! This module reduces an arbitrarily wide dataset to a fixed-size shortlist
//! of its most informative columns, the universe the configuration search is
//! then exhaustive over.
//!
//! # Mathematical Foundation
//!
//! A principal component decomposition of the standardized candidate matrix
//! retains the leading components whose cumulative explained-variance ratio
//! reaches 95%. Each original column j is scored
//!
//! ```text
//! importance(j) = Σ_c evr(c) · |V[c, j]|
//! ```
//!
//! over the retained components c, where V holds the component loadings and
//! evr the explained-variance ratios. The top-n columns are taken by partial
//! selection — ties are broken arbitrarily by the selection algorithm, an
//! accepted nondeterminism — and returned in ascending name order, which is
//! the bit-order contract the configuration codec builds on.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::cmp::Ordering;
use std::collections::BTreeSet;

use nalgebra::{DMatrix, SVD};
use serde::{Deserialize, Serialize};

use crate::data::{standardize, Dataset};
use crate::error::EngineError;

/// Cumulative explained-variance ratio the retained components must reach.
const VARIANCE_COVERAGE: f64 = 0.95;

/// The ranked feature shortlist: at most `top_n` column names, ascending,
/// immutable once computed for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureShortlist {
    names: Vec<String>,
}

impl FeatureShortlist {
    /// Builds a shortlist from names, sorting ascending and deduplicating.
    pub fn new(names: impl IntoIterator<Item = String>) -> Self {
        let unique: BTreeSet<String> = names.into_iter().collect();
        Self {
            names: unique.into_iter().collect(),
        }
    }

    /// Shortlisted names in ascending order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of shortlisted features (the `k` of the configuration space).
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// True when no feature survived selection.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Name at shortlist position `i`.
    pub fn name(&self, i: usize) -> &str {
        &self.names[i]
    }
}

/// Ranks candidate columns by variance-weighted importance and returns the
/// `top_n` best as a [`FeatureShortlist`].
///
/// Every column except the identifier is a candidate. `top_n` must be at
/// least 1 and no larger than the candidate count; anything else is an
/// [`EngineError::InfeasibleShortlist`] surfaced before any search begins.
pub fn rank_features(dataset: &Dataset, top_n: usize) -> Result<FeatureShortlist, EngineError> {
    let candidates = dataset.candidate_columns();
    if candidates.is_empty() {
        return Err(EngineError::EmptyDataset);
    }
    if top_n == 0 || top_n > candidates.len() {
        return Err(EngineError::InfeasibleShortlist {
            requested: top_n,
            available: candidates.len(),
        });
    }
    let rows = dataset.n_rows();
    if rows < 2 {
        return Err(EngineError::InsufficientRows { rows });
    }

    let matrix = dataset.select_named(&candidates)?;
    let scaled = standardize(&matrix);
    let importance = importance_scores(&scaled);

    let top = top_indices(&importance, top_n);
    let shortlist = FeatureShortlist::new(top.into_iter().map(|i| candidates[i].clone()));
    log::debug!(
        "feature shortlist ({} of {} candidates): {:?}",
        shortlist.len(),
        candidates.len(),
        shortlist.names()
    );
    Ok(shortlist)
}

/// Per-column importance: explained-variance-weighted absolute loadings,
/// summed over the components that cover [`VARIANCE_COVERAGE`].
fn importance_scores(scaled: &DMatrix<f64>) -> Vec<f64> {
    let n = scaled.nrows();
    let d = scaled.ncols();
    let svd = SVD::new(scaled.clone(), false, true);
    let v_t = match svd.v_t {
        Some(v_t) => v_t,
        // SVD failed to converge; fall back to uniform importance so the
        // caller still receives a usable (if arbitrary) shortlist.
        None => return vec![1.0; d],
    };

    // Explained variance per component, sorted descending. nalgebra does not
    // guarantee singular-value ordering, so sort explicitly.
    let mut components: Vec<(f64, usize)> = svd
        .singular_values
        .iter()
        .enumerate()
        .map(|(c, sigma)| (sigma * sigma / (n as f64 - 1.0), c))
        .collect();
    components.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
    let total: f64 = components.iter().map(|(ev, _)| ev).sum();
    if total <= 0.0 {
        return vec![1.0; d];
    }

    let mut importance = vec![0.0; d];
    let mut covered = 0.0;
    for (ev, c) in components {
        let ratio = ev / total;
        for j in 0..d {
            importance[j] += ratio * v_t[(c, j)].abs();
        }
        covered += ratio;
        if covered >= VARIANCE_COVERAGE {
            break;
        }
    }
    importance
}

/// Positions of the `top_n` largest scores via partial selection; ties fall
/// wherever the selection algorithm leaves them.
fn top_indices(scores: &[f64], top_n: usize) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..scores.len()).collect();
    if top_n < indices.len() {
        let pivot = indices.len() - top_n;
        indices.select_nth_unstable_by(pivot, |a, b| {
            scores[*a].partial_cmp(&scores[*b]).unwrap_or(Ordering::Equal)
        });
        indices.split_off(pivot)
    } else {
        indices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn dataset_with_informative_columns() -> Dataset {
        // Two columns carry real structure (bimodal), two are flat noise.
        let mut rng = StdRng::seed_from_u64(7);
        let n = 60;
        let mut cells = Vec::with_capacity(n * 5);
        for r in 0..n {
            let group = if r < n / 2 { 0.0 } else { 8.0 };
            cells.push(r as f64); // uid
            cells.push(group + rng.gen_range(-0.2..0.2)); // signal_a
            cells.push(-group + rng.gen_range(-0.2..0.2)); // signal_b
            cells.push(rng.gen_range(-0.05..0.05)); // noise_a
            cells.push(rng.gen_range(-0.05..0.05)); // noise_b
        }
        Dataset::new(
            vec![
                "uid".into(),
                "signal_a".into(),
                "signal_b".into(),
                "noise_a".into(),
                "noise_b".into(),
            ],
            DMatrix::from_row_slice(n, 5, &cells),
            "uid",
        )
        .unwrap()
    }

    #[test]
    fn informative_columns_outrank_noise() {
        let ds = dataset_with_informative_columns();
        let shortlist = rank_features(&ds, 2).unwrap();
        assert_eq!(shortlist.names(), &["signal_a".to_string(), "signal_b".to_string()]);
    }

    #[test]
    fn shortlist_is_ascending_and_unique() {
        let ds = dataset_with_informative_columns();
        let shortlist = rank_features(&ds, 4).unwrap();
        let mut sorted = shortlist.names().to_vec();
        sorted.sort();
        sorted.dedup();
        assert_eq!(shortlist.names(), sorted.as_slice());
    }

    #[test]
    fn oversized_request_is_rejected_before_search() {
        let ds = dataset_with_informative_columns();
        let err = rank_features(&ds, 5).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InfeasibleShortlist {
                requested: 5,
                available: 4
            }
        ));
    }

    #[test]
    fn zero_request_is_rejected() {
        let ds = dataset_with_informative_columns();
        assert!(rank_features(&ds, 0).is_err());
    }

    #[test]
    fn top_indices_returns_requested_count() {
        let scores = [0.1, 0.9, 0.4, 0.9, 0.2];
        let mut top = top_indices(&scores, 2);
        top.sort_unstable();
        assert_eq!(top.len(), 2);
        // Both winners must score 0.9; which of the tied indices is taken
        // is up to the selection algorithm.
        assert!(top.iter().all(|i| scores[*i] == 0.9));
    }
}
