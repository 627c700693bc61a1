//! Reward shaping for configuration evaluations.
//!
//! The immediate reward combines the configuration's own clustering quality
//! with a penalty for underperforming the quality achievable with the full
//! shortlist under the same strategy. Scores arrive on the silhouette scale
//! [-1, 1] (or the sentinel −1); rewards leave on a bounded scale that a
//! failed clustering can never profit from.

/// Small constant guarding the baseline ratio against division by zero.
pub const BASELINE_EPSILON: f64 = 1e-6;

/// Weight of the underperformance penalty.
pub const PENALTY_WEIGHT: f64 = 0.1;

/// Immediate reward for a configuration scoring `q_sel` against the
/// per-strategy full-shortlist baseline `q_all`.
///
/// 1. `q_sel` is normalized to `[0, 1]` by `(q_sel + 1) / 2`, clamped to 0
///    when `q_sel < 0` — a failed or degenerate clustering earns nothing.
/// 2. When the subset clustered worse than the full shortlist, a penalty of
///    `0.1 × q_sel / (q_all + ε)` is subtracted.
///
/// The result may be negative. It is always finite.
pub fn immediate_reward(q_sel: f64, q_all: f64) -> f64 {
    let normalized = if q_sel < 0.0 { 0.0 } else { (q_sel + 1.0) / 2.0 };
    let penalty = if q_sel < q_all {
        let ratio = q_sel / (q_all + BASELINE_EPSILON);
        if ratio.is_finite() {
            PENALTY_WEIGHT * ratio
        } else {
            0.0
        }
    } else {
        0.0
    };
    normalized - penalty
}
