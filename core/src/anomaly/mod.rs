//! Anomaly extraction from the winning configuration's clusters.

pub mod extractor;

pub use self::extractor::{extract_anomalies, AnomalyResult};
