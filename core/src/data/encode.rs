//! Categorical-to-numeric encoding of raw table columns.
//!
//! Upstream ingestion may deliver text columns (protocol names, host names,
//! verdict strings). Before ranking can run, those are label-encoded to
//! integer codes, and encoded columns that cannot carry cluster structure
//! are dropped: a column where over half the rows are unique behaves like a
//! second identifier, and a single-valued column separates nothing. The
//! identifier column itself is encoded but never dropped.
//!
//! The pass produces a new owned [`Dataset`]; the caller's table is not
//! touched.

use std::collections::{BTreeMap, BTreeSet};

use nalgebra::DMatrix;

use crate::data::Dataset;
use crate::error::EngineError;

/// One raw input column: already numeric, or text awaiting encoding.
#[derive(Debug, Clone)]
pub enum TableColumn {
    /// Numeric values, used as-is.
    Numeric(Vec<f64>),
    /// Text values, label-encoded to integer codes in sorted-value order.
    Text(Vec<String>),
}

impl TableColumn {
    fn len(&self) -> usize {
        match self {
            TableColumn::Numeric(v) => v.len(),
            TableColumn::Text(v) => v.len(),
        }
    }
}

/// Encodes a raw column table into a numeric [`Dataset`].
///
/// Text columns are label-encoded (distinct values sorted, then mapped to
/// `0..n_distinct`). Encoded non-identifier columns are dropped when
/// degenerate: more distinct values than half the row count, or exactly one
/// distinct value.
pub fn encode_table(
    columns: Vec<(String, TableColumn)>,
    identifier: &str,
) -> Result<Dataset, EngineError> {
    if columns.is_empty() {
        return Err(EngineError::EmptyDataset);
    }
    let n_rows = columns[0].1.len();
    for (_, column) in &columns {
        if column.len() != n_rows {
            return Err(EngineError::ShapeMismatch {
                columns: column.len(),
                width: n_rows,
            });
        }
    }

    let mut kept: Vec<(String, Vec<f64>)> = Vec::with_capacity(columns.len());
    for (name, column) in columns {
        let is_identifier = name == identifier;
        match column {
            TableColumn::Numeric(values) => kept.push((name, values)),
            TableColumn::Text(values) => {
                let (codes, distinct) = label_encode(&values);
                if !is_identifier && (distinct > n_rows / 2 || distinct == 1) {
                    log::debug!("dropping degenerate encoded column '{name}' ({distinct} distinct over {n_rows} rows)");
                    continue;
                }
                kept.push((name, codes));
            }
        }
    }

    let names: Vec<String> = kept.iter().map(|(n, _)| n.clone()).collect();
    let matrix = DMatrix::from_fn(n_rows, kept.len(), |r, c| kept[c].1[r]);
    Dataset::new(names, matrix, identifier)
}

/// Maps each distinct value to an integer code in sorted-value order.
/// Returns the codes and the distinct-value count.
fn label_encode(values: &[String]) -> (Vec<f64>, usize) {
    let distinct: BTreeSet<&str> = values.iter().map(|v| v.as_str()).collect();
    let codes: BTreeMap<&str, usize> = distinct.into_iter().enumerate().map(|(i, k)| (k, i)).collect();
    let encoded = values.iter().map(|v| codes[v.as_str()] as f64).collect();
    (encoded, codes.len())
}
