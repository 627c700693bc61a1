//! Error taxonomy for the discovery core.
//!
//! Only precondition violations surface to the caller. Per-evaluation
//! numerical failures (degenerate clusterings, singular covariances,
//! silhouette breakdowns) are absorbed into the sentinel quality score and
//! never appear here. An empty anomaly set is a valid outcome, not an error.

use thiserror::Error;

/// Precondition violations surfaced at the engine boundary.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The requested shortlist size exceeds the candidate column count.
    #[error("requested shortlist of {requested} features but only {available} candidate columns exist")]
    InfeasibleShortlist { requested: usize, available: usize },

    /// The dataset carries no feature columns besides the identifier.
    #[error("dataset has no candidate feature columns")]
    EmptyDataset,

    /// Clustering needs at least two rows to separate anything.
    #[error("dataset has {rows} rows; at least 2 are required")]
    InsufficientRows { rows: usize },

    /// A referenced column does not exist in the dataset.
    #[error("unknown column: {0}")]
    UnknownColumn(String),

    /// A cluster labelling does not cover the dataset row-for-row.
    #[error("cluster labelling covers {labels} rows but the dataset has {rows}")]
    LabelMismatch { labels: usize, rows: usize },

    /// Column names and matrix width disagree.
    #[error("{columns} column names for a matrix of width {width}")]
    ShapeMismatch { columns: usize, width: usize },
}
