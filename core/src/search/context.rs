//! Per-run search context and tunables.
//!
//! One [`SearchContext`] is constructed per invocation and never mutated
//! afterwards. It carries everything the engine and its collaborators need
//! — shortlist, feature matrix, strategy registry, tunables — so no
//! component reads shared mutable state. The random source is injectable
//! through the optional seed: seeded runs replay exactly, unseeded runs
//! draw from entropy.

use nalgebra::DMatrix;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

use crate::cluster::StrategyRegistry;
use crate::error::EngineError;
use crate::features::FeatureShortlist;
use crate::search::space::{ConfigurationSpace, ConfigurationState};

/// Odd multiplier decorrelating per-strategy seeds from the run seed.
const SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

/// Search-engine tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Discount factor of the one-step lookahead.
    pub gamma: f64,

    /// Exploration probability at iteration zero.
    pub epsilon_start: f64,

    /// Geometric decay applied to the exploration probability per iteration.
    pub epsilon_decay: f64,

    /// Exploration probability floor.
    pub epsilon_floor: f64,

    /// Probability of exploring among unvalued actions within a state.
    pub action_epsilon: f64,

    /// Hard iteration cap.
    pub max_iterations: usize,

    /// Early-stop threshold on the summed absolute Q delta.
    pub convergence_threshold: f64,

    /// Number of top states (by summed Q row) sampled during exploitation.
    pub top_states: usize,

    /// Random seed; `None` draws from entropy.
    pub seed: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            gamma: 0.8,
            epsilon_start: 0.95,
            epsilon_decay: 0.99,
            epsilon_floor: 0.10,
            action_epsilon: 0.95,
            max_iterations: 10_000,
            convergence_threshold: 0.01,
            top_states: 10,
            seed: None,
        }
    }
}

/// Immutable per-run context shared by every search component.
#[derive(Debug)]
pub struct SearchContext {
    /// The ranked shortlist defining the state bit order.
    shortlist: FeatureShortlist,

    /// Unscaled shortlist feature matrix (rows × shortlist columns, in
    /// shortlist order). Strategies standardize their subsets themselves.
    features: DMatrix<f64>,

    /// The clustering action registry.
    registry: StrategyRegistry,

    /// Engine tunables.
    config: SearchConfig,

    /// The state/action universe.
    space: ConfigurationSpace,
}

impl SearchContext {
    /// Builds the context, validating that the feature matrix matches the
    /// shortlist column-for-column and that anything is searchable at all.
    pub fn new(
        shortlist: FeatureShortlist,
        features: DMatrix<f64>,
        registry: StrategyRegistry,
        config: SearchConfig,
    ) -> Result<Self, EngineError> {
        if shortlist.is_empty() || registry.is_empty() {
            return Err(EngineError::EmptyDataset);
        }
        if features.ncols() != shortlist.len() {
            return Err(EngineError::ShapeMismatch {
                columns: shortlist.len(),
                width: features.ncols(),
            });
        }
        let space = ConfigurationSpace::new(shortlist.len(), registry.len());
        Ok(Self {
            shortlist,
            features,
            registry,
            config,
            space,
        })
    }

    /// The run's shortlist.
    pub fn shortlist(&self) -> &FeatureShortlist {
        &self.shortlist
    }

    /// The full shortlist feature matrix.
    pub fn features(&self) -> &DMatrix<f64> {
        &self.features
    }

    /// The strategy registry.
    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    /// Engine tunables.
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// The state/action universe.
    pub fn space(&self) -> ConfigurationSpace {
        self.space
    }

    /// The submatrix holding the columns `state` selects, in shortlist
    /// order.
    pub fn subset_matrix(&self, state: ConfigurationState) -> DMatrix<f64> {
        let positions = self.space.decode(state);
        DMatrix::from_fn(self.features.nrows(), positions.len(), |r, c| {
            self.features[(r, positions[c])]
        })
    }

    /// Shortlist names selected by `state`, ascending.
    pub fn subset_names(&self, state: ConfigurationState) -> Vec<String> {
        self.space
            .decode(state)
            .into_iter()
            .map(|i| self.shortlist.name(i).to_owned())
            .collect()
    }

    /// The engine's random source: seeded when configured, entropy-backed
    /// otherwise.
    pub fn rng(&self) -> ChaCha20Rng {
        match self.config.seed {
            Some(seed) => ChaCha20Rng::seed_from_u64(seed),
            None => ChaCha20Rng::from_entropy(),
        }
    }

    /// An independent random source for the baseline evaluation of
    /// `action`, derived from the run seed so the parallel fan-out is
    /// order-independent.
    pub fn strategy_rng(&self, action: usize) -> ChaCha20Rng {
        match self.config.seed {
            Some(seed) => {
                ChaCha20Rng::seed_from_u64(seed ^ (action as u64 + 1).wrapping_mul(SEED_STRIDE))
            }
            None => ChaCha20Rng::from_entropy(),
        }
    }
}
