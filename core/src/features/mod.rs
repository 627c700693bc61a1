//! Feature importance ranking.

pub mod ranker;

pub use self::ranker::{rank_features, FeatureShortlist};
