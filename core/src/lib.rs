//! ARGUS Core: Reinforcement-Guided Anomaly Discovery
//!
//! This crate implements the engine at the heart of ARGUS: given a cleaned
//! numeric dataset, it discovers which subset of features and which
//! clustering strategy together best separate normal from anomalous
//! records, then extracts the anomalous records.
//!
//! # Architecture
//!
//! The search problem is formalized over an exponential configuration
//! space: every non-empty subset of a ranked feature shortlist, paired with
//! one of five clustering strategies. A Q-learning loop explores the space
//! under a decaying exploration policy, scoring each configuration by
//! silhouette quality against a full-shortlist baseline, and halts on
//! convergence or an iteration cap. A size-based statistical rule then
//! turns the winning configuration's clusters into a binary anomaly call.
//!
//! ```text
//! Dataset ─▶ features::rank_features ─▶ FeatureShortlist
//!                                           │
//!                     search::SearchContext (immutable per run)
//!                                           │
//!        search::SearchEngine ◀──▶ cluster::StrategyRegistry
//!                    │
//!            winning labels ─▶ anomaly::extract_anomalies ─▶ AnomalyResult
//! ```
//!
//! The whole pipeline is exposed as one call through
//! [`pipeline::discover_anomalies`].
//!
//! # Guarantees
//!
//! - Per-evaluation numerical failures never propagate: they become the
//!   sentinel quality score and earn no reward.
//! - The search terminates within the configured iteration cap for any
//!   non-empty configuration space, and the empty feature subset can never
//!   win.
//! - All entities of a run are created fresh per invocation; nothing
//!   persists between runs.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

pub mod anomaly;
pub mod cluster;
pub mod data;
pub mod error;
pub mod features;
pub mod pipeline;
pub mod search;

pub use self::anomaly::{extract_anomalies, AnomalyResult};
pub use self::data::{encode_table, ClusteredDataset, Dataset, TableColumn};
pub use self::error::EngineError;
pub use self::features::{rank_features, FeatureShortlist};
pub use self::pipeline::{discover_anomalies, Discovery};
pub use self::search::{
    Configuration, ConfigurationSpace, SearchConfig, SearchContext, SearchEngine, SearchOutcome,
};
