//! Q-learning configuration search engine
//!
//! The search problem is a finite Markov decision process over
//! (feature-subset, strategy) configurations with no real transition
//! function: the classical memoryless Q formulation, where the sampling
//! policy plays the role of the transition. The bootstrap term of the
//! update reuses the **action index as a row lookup** —
//!
//! ```text
//! Q[s, a] ← r(s, a) + γ · max Q[a, ·]
//! ```
//!
//! — an approximation carried over from the classical memoryless
//! formulation and preserved deliberately; a true transition model would
//! bootstrap from a successor state instead.
//!
//! # Exploration schedule
//!
//! The exploration probability decays geometrically from 0.95 toward a
//! floor of 0.10. While unvisited pairs remain they are sampled
//! preferentially; afterwards the engine either samples states uniformly or
//! exploits the top states ranked by summed Q row. Within a state, actions
//! whose cell is still zero are preferred, then the row argmax.
//!
//! # Termination
//!
//! A hard iteration cap bounds the run. After a warm-up of one full pass
//! over the configuration space, the run stops early once the summed
//! absolute difference between consecutive Q tables falls under the
//! convergence threshold.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::collections::HashMap;

use nalgebra::DMatrix;
use rand::Rng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::search::context::SearchContext;
use crate::search::reward::immediate_reward;
use crate::search::space::{Action, Configuration, ConfigurationState};

/// Result of one completed search run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOutcome {
    /// The winning configuration.
    pub configuration: Configuration,

    /// Decoded feature names of the winning state, ascending.
    pub features: Vec<String>,

    /// Cached per-row cluster labels of the winning configuration. The
    /// labelling is reused from the last evaluation; clustering is not
    /// re-run at selection time.
    pub labels: Vec<usize>,

    /// Winning value on the normalized 0–100 scale (raw Q when the table
    /// never rose above zero).
    pub score: f64,

    /// Iterations actually executed.
    pub iterations: usize,

    /// Whether the convergence check (rather than the cap) ended the run.
    pub converged: bool,

    /// Identifier of this run, echoed in log lines.
    pub run_id: Uuid,
}

/// The Q-learning engine. Owns all working state — Q table, visited set,
/// label cache — exclusively for the duration of one run.
pub struct SearchEngine<'a> {
    context: &'a SearchContext,

    /// Per-strategy full-shortlist baseline scores (`q_all`).
    baselines: Vec<f64>,

    /// Expected-reward table, `num_states × num_actions`, zero-initialized.
    q: DMatrix<f64>,

    /// Visited flags, same shape as the Q table. Row 0 is pre-marked so the
    /// empty subset is never sampled.
    visited: DMatrix<bool>,

    /// Labels from the most recent evaluation of each configuration.
    label_cache: HashMap<Configuration, Vec<usize>>,

    rng: ChaCha20Rng,

    run_id: Uuid,
}

impl<'a> SearchEngine<'a> {
    /// Creates an engine over `context` with the per-strategy baselines
    /// computed beforehand.
    pub fn new(context: &'a SearchContext, baselines: Vec<f64>) -> Self {
        let space = context.space();
        let q = DMatrix::zeros(space.num_states(), space.num_actions());
        let mut visited = DMatrix::from_element(space.num_states(), space.num_actions(), false);
        for action in 0..space.num_actions() {
            visited[(0, action)] = true;
        }
        let rng = context.rng();
        Self {
            context,
            baselines,
            q,
            visited,
            label_cache: HashMap::new(),
            rng,
            run_id: Uuid::new_v4(),
        }
    }

    /// This run's identifier.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Runs the search to termination and returns the winning
    /// configuration with its cached labels.
    pub fn run(mut self) -> SearchOutcome {
        let config = self.context.config();
        let warmup = self.context.space().len();
        // A zero cap would leave the table untouched and nothing selectable;
        // one iteration is the useful minimum.
        let cap = config.max_iterations.max(1);

        let mut previous_q = self.q.clone();
        let mut iterations = 0usize;
        let mut converged = false;

        for i in 0..cap {
            iterations = i + 1;
            let epsilon = (config.epsilon_start * config.epsilon_decay.powi(i as i32))
                .max(config.epsilon_floor);
            let (state, action) = self.sample_pair(epsilon);
            self.visited[(state, action)] = true;
            self.evaluate_and_update(state, action);

            if i > warmup {
                let delta: f64 = (&self.q - &previous_q).abs().sum();
                if delta < config.convergence_threshold {
                    converged = true;
                    log::debug!(
                        "run {}: converged at iteration {} (delta {:.6})",
                        self.run_id,
                        i,
                        delta
                    );
                    break;
                }
            }
            previous_q.copy_from(&self.q);
        }

        let (configuration, score) = self.select_best();
        let features = self.context.subset_names(configuration.state);
        let labels = self
            .label_cache
            .get(&configuration)
            .cloned()
            .unwrap_or_default();
        log::info!(
            "run {}: best configuration state={:#b} action={} ({}) score={:.2} after {} iterations",
            self.run_id,
            configuration.state,
            configuration.action,
            self.context.registry().get(configuration.action).name(),
            score,
            iterations
        );
        SearchOutcome {
            configuration,
            features,
            labels,
            score,
            iterations,
            converged,
            run_id: self.run_id,
        }
    }

    /// Samples the next (state, action) pair under the exploration policy.
    fn sample_pair(&mut self, epsilon: f64) -> (ConfigurationState, Action) {
        let unvisited: Vec<(usize, usize)> = (1..self.q.nrows())
            .flat_map(|s| (0..self.q.ncols()).map(move |a| (s, a)))
            .filter(|(s, a)| !self.visited[(*s, *a)])
            .collect();

        if !unvisited.is_empty() && self.rng.gen::<f64>() < epsilon {
            return unvisited[self.rng.gen_range(0..unvisited.len())];
        }

        let state = if self.rng.gen::<f64>() < epsilon {
            // Explore: any non-empty state.
            self.rng.gen_range(1..self.q.nrows())
        } else {
            // Exploit: uniform over the top states by summed Q row.
            let mut ranked: Vec<(f64, usize)> = (1..self.q.nrows())
                .map(|s| (self.q.row(s).iter().sum::<f64>(), s))
                .collect();
            ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
            let pool = ranked.len().min(self.context.config().top_states);
            ranked[self.rng.gen_range(0..pool)].1
        };
        (state, self.choose_action(state))
    }

    /// Chooses an action within `state`: prefer still-unvalued cells with
    /// probability `action_epsilon`, otherwise the row argmax; uniform when
    /// every cell already holds a value.
    fn choose_action(&mut self, state: ConfigurationState) -> Action {
        let unvalued: Vec<usize> = (0..self.q.ncols())
            .filter(|a| self.q[(state, *a)] == 0.0)
            .collect();
        if !unvalued.is_empty() {
            if self.rng.gen::<f64>() < self.context.config().action_epsilon {
                return unvalued[self.rng.gen_range(0..unvalued.len())];
            }
            return self.argmax_action(state);
        }
        self.rng.gen_range(0..self.q.ncols())
    }

    /// First-found argmax over the Q row of `state`.
    fn argmax_action(&self, state: ConfigurationState) -> Action {
        let mut best = 0usize;
        let mut best_value = f64::NEG_INFINITY;
        for a in 0..self.q.ncols() {
            let value = self.q[(state, a)];
            if value > best_value {
                best_value = value;
                best = a;
            }
        }
        best
    }

    /// Evaluates the configuration, caches its labels, and applies the
    /// action-indexed one-step update.
    fn evaluate_and_update(&mut self, state: ConfigurationState, action: Action) {
        let subset = self.context.subset_matrix(state);
        let evaluation = self
            .context
            .registry()
            .get(action)
            .evaluate(&subset, &mut self.rng);
        let reward = immediate_reward(evaluation.score, self.baselines[action]);

        // Action-indexed lookahead: the bootstrap row is the action index,
        // not a successor state. The row may not exist for tiny spaces
        // (2^k ≤ actions); a missing row contributes nothing.
        let bootstrap = if action < self.q.nrows() {
            self.q
                .row(action)
                .iter()
                .cloned()
                .fold(f64::NEG_INFINITY, f64::max)
        } else {
            0.0
        };
        self.q[(state, action)] = reward + self.context.config().gamma * bootstrap;
        self.label_cache
            .insert(Configuration { state, action }, evaluation.labels);
    }

    /// First-found maximum over visited non-empty states, on the normalized
    /// 0–100 scale when the table has positive mass.
    fn select_best(&self) -> (Configuration, f64) {
        let max_q = self
            .q
            .iter()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max);

        let mut best: Option<(Configuration, f64)> = None;
        for state in 1..self.q.nrows() {
            for action in 0..self.q.ncols() {
                if !self.visited[(state, action)] {
                    continue;
                }
                let value = self.q[(state, action)];
                if best.as_ref().map_or(true, |(_, b)| value > *b) {
                    best = Some((Configuration { state, action }, value));
                }
            }
        }
        let (configuration, value) =
            best.unwrap_or((Configuration { state: 1, action: 0 }, 0.0));
        let score = if max_q > 0.0 {
            value / max_q * 100.0
        } else {
            value
        };
        (configuration, score)
    }
}
