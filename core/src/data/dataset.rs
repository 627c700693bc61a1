//! Immutable tabular dataset snapshot.
//!
//! A [`Dataset`] is the core's input contract: a numeric matrix with named
//! columns, one of which is the designated record identifier. The upstream
//! preparation layer guarantees the matrix is fully sanitized (no missing,
//! infinite, or NaN values); the core does not re-validate cell contents.
//!
//! A [`ClusteredDataset`] is the same snapshot augmented with one integer
//! cluster-id column, produced only for the winning configuration.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Immutable numeric dataset with named columns and a designated identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    /// Column names, in matrix column order.
    columns: Vec<String>,

    /// Row-major numeric data; one column per entry of `columns`.
    matrix: DMatrix<f64>,

    /// Name of the identifier column (always present in `columns`).
    identifier: String,
}

impl Dataset {
    /// Builds a dataset, validating the column/matrix correspondence and
    /// the presence of the identifier column.
    pub fn new(
        columns: Vec<String>,
        matrix: DMatrix<f64>,
        identifier: impl Into<String>,
    ) -> Result<Self, EngineError> {
        let identifier = identifier.into();
        if columns.len() != matrix.ncols() {
            return Err(EngineError::ShapeMismatch {
                columns: columns.len(),
                width: matrix.ncols(),
            });
        }
        if !columns.iter().any(|c| *c == identifier) {
            return Err(EngineError::UnknownColumn(identifier));
        }
        Ok(Self {
            columns,
            matrix,
            identifier,
        })
    }

    /// Number of rows (records).
    pub fn n_rows(&self) -> usize {
        self.matrix.nrows()
    }

    /// Number of columns, identifier included.
    pub fn n_cols(&self) -> usize {
        self.matrix.ncols()
    }

    /// All column names in matrix order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// The identifier column name.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// The underlying numeric matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Position of a named column, if present.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Names of every candidate feature column (everything except the
    /// identifier), in matrix order.
    pub fn candidate_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| **c != self.identifier)
            .cloned()
            .collect()
    }

    /// Extracts the submatrix holding the given column positions, in the
    /// order given.
    pub fn select_indices(&self, indices: &[usize]) -> DMatrix<f64> {
        DMatrix::from_fn(self.matrix.nrows(), indices.len(), |r, c| {
            self.matrix[(r, indices[c])]
        })
    }

    /// Extracts the submatrix holding the named columns, in the order given.
    pub fn select_named(&self, names: &[String]) -> Result<DMatrix<f64>, EngineError> {
        let indices = names
            .iter()
            .map(|n| {
                self.column_index(n)
                    .ok_or_else(|| EngineError::UnknownColumn(n.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.select_indices(&indices))
    }

    /// Identifier value of each row, in row order.
    pub fn identifier_values(&self) -> Vec<f64> {
        let idx = self
            .column_index(&self.identifier)
            .unwrap_or_default();
        (0..self.matrix.nrows())
            .map(|r| self.matrix[(r, idx)])
            .collect()
    }
}

/// A dataset joined with the per-row cluster labelling of one configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteredDataset {
    /// The labelled snapshot.
    dataset: Dataset,

    /// Cluster id per row, aligned with the dataset's row order.
    clusters: Vec<usize>,
}

impl ClusteredDataset {
    /// Joins a labelling onto a dataset. The labelling must cover the
    /// dataset row-for-row.
    pub fn new(dataset: Dataset, clusters: Vec<usize>) -> Result<Self, EngineError> {
        if clusters.len() != dataset.n_rows() {
            return Err(EngineError::LabelMismatch {
                labels: clusters.len(),
                rows: dataset.n_rows(),
            });
        }
        Ok(Self { dataset, clusters })
    }

    /// The underlying dataset snapshot.
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Cluster id per row.
    pub fn clusters(&self) -> &[usize] {
        &self.clusters
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.clusters.len()
    }

    /// New snapshot holding only the rows whose cluster id satisfies the
    /// predicate. Column order and the cluster-id column are preserved.
    pub fn filter_clusters(&self, keep: impl Fn(usize) -> bool) -> ClusteredDataset {
        let rows: Vec<usize> = self
            .clusters
            .iter()
            .enumerate()
            .filter(|(_, c)| keep(**c))
            .map(|(r, _)| r)
            .collect();
        let matrix = DMatrix::from_fn(rows.len(), self.dataset.n_cols(), |r, c| {
            self.dataset.matrix()[(rows[r], c)]
        });
        let clusters = rows.iter().map(|r| self.clusters[*r]).collect();
        ClusteredDataset {
            dataset: Dataset {
                columns: self.dataset.columns.clone(),
                matrix,
                identifier: self.dataset.identifier.clone(),
            },
            clusters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        let matrix = DMatrix::from_row_slice(3, 3, &[
            0.0, 1.0, 10.0, //
            1.0, 2.0, 20.0, //
            2.0, 3.0, 30.0,
        ]);
        Dataset::new(
            vec!["uid".into(), "bytes".into(), "duration".into()],
            matrix,
            "uid",
        )
        .unwrap()
    }

    #[test]
    fn candidate_columns_exclude_identifier() {
        let ds = sample();
        assert_eq!(ds.candidate_columns(), vec!["bytes", "duration"]);
    }

    #[test]
    fn unknown_identifier_is_rejected() {
        let matrix = DMatrix::zeros(2, 1);
        let err = Dataset::new(vec!["a".into()], matrix, "missing").unwrap_err();
        assert!(matches!(err, EngineError::UnknownColumn(_)));
    }

    #[test]
    fn select_named_preserves_request_order() {
        let ds = sample();
        let m = ds
            .select_named(&["duration".into(), "bytes".into()])
            .unwrap();
        assert_eq!(m[(0, 0)], 10.0);
        assert_eq!(m[(0, 1)], 1.0);
    }

    #[test]
    fn cluster_filter_keeps_matching_rows() {
        let ds = sample();
        let clustered = ClusteredDataset::new(ds, vec![0, 1, 0]).unwrap();
        let kept = clustered.filter_clusters(|c| c == 0);
        assert_eq!(kept.n_rows(), 2);
        assert_eq!(kept.clusters(), &[0, 0]);
        assert_eq!(kept.dataset().matrix()[(1, 2)], 30.0);
    }

    #[test]
    fn mismatched_labelling_is_rejected() {
        let ds = sample();
        let err = ClusteredDataset::new(ds, vec![0, 1]).unwrap_err();
        assert!(matches!(err, EngineError::LabelMismatch { labels: 2, rows: 3 }));
    }
}
