//! LinUCB contextual bandit policy.
//!
//! One ridge-regression model per deception profile. Selection scores every
//! profile with an upper-confidence bound — the reward estimate `θᵗx` plus
//! an exploration bonus proportional to the model's uncertainty about `x` —
//! and picks the arg-max, breaking ties toward the lowest arm index so runs
//! are reproducible.
//!
//! The design matrices start at the identity and grow only by outer
//! products of finite context vectors, so they stay symmetric positive
//! definite. A failed factorization means the invariant broke (a
//! programming defect, typically a dimensionality bug) and surfaces as a
//! fatal [`PolicyError::Invariant`]; this module never substitutes a
//! pseudo-inverse. The policy performs no I/O and never sees transient
//! failures.

use hp_math::{dot, scaled_add, MathError, SymMatrix};
use serde::Serialize;
use thiserror::Error;

use crate::context::{Context, CONTEXT_DIM};

/// Errors from policy operations.
///
/// All variants indicate caller bugs or corrupted state, not environmental
/// conditions; the control loop treats them as fatal.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("no profiles configured")]
    NoArms,

    #[error("exploration coefficient must be positive and finite, got {alpha}")]
    InvalidAlpha { alpha: f64 },

    #[error("arm index {arm} out of range ({arms} arms)")]
    ArmOutOfRange { arm: usize, arms: usize },

    #[error("context component {index} is not finite")]
    NonFiniteContext { index: usize },

    #[error("reward {reward} outside [0, 1]")]
    RewardOutOfBounds { reward: f64 },

    #[error("arm {arm} design matrix violates the positive-definite invariant: {source}")]
    Invariant {
        arm: usize,
        #[source]
        source: MathError,
    },
}

/// Ridge model state for one arm.
#[derive(Debug, Clone, Serialize)]
struct Arm {
    /// Design matrix `A = I + Σ x·xᵗ`.
    design: SymMatrix<CONTEXT_DIM>,
    /// Reward-weighted context accumulator `b = Σ r·x`.
    response: [f64; CONTEXT_DIM],
}

impl Arm {
    fn fresh() -> Self {
        Arm {
            design: SymMatrix::identity(),
            response: [0.0; CONTEXT_DIM],
        }
    }
}

/// Score breakdown for one arm, for explainability.
#[derive(Debug, Clone, Serialize)]
pub struct ArmScore {
    /// Arm index.
    pub arm: usize,
    /// Reward estimate `θᵗx`.
    pub estimate: f64,
    /// Exploration bonus `α·sqrt(xᵗA⁻¹x)`.
    pub exploration: f64,
    /// Total upper-confidence score.
    pub score: f64,
}

/// Outcome of one selection.
#[derive(Debug, Clone, Serialize)]
pub struct Selection {
    /// Selected arm (arg-max score, lowest index on ties).
    pub arm: usize,
    /// Per-arm score table.
    pub scores: Vec<ArmScore>,
}

/// LinUCB policy over a fixed set of arms.
#[derive(Debug, Clone)]
pub struct LinUcbPolicy {
    alpha: f64,
    arms: Vec<Arm>,
}

impl LinUcbPolicy {
    /// Fresh policy: identity design matrices, zero response vectors.
    pub fn new(n_arms: usize, alpha: f64) -> Result<Self, PolicyError> {
        if n_arms == 0 {
            return Err(PolicyError::NoArms);
        }
        if !alpha.is_finite() || alpha <= 0.0 {
            return Err(PolicyError::InvalidAlpha { alpha });
        }
        Ok(LinUcbPolicy {
            alpha,
            arms: (0..n_arms).map(|_| Arm::fresh()).collect(),
        })
    }

    /// Number of arms.
    pub fn n_arms(&self) -> usize {
        self.arms.len()
    }

    /// Score every arm for `context` and select the best.
    pub fn select(&self, context: &Context) -> Result<Selection, PolicyError> {
        check_context(context)?;

        let mut scores = Vec::with_capacity(self.arms.len());
        let mut best: Option<(usize, f64)> = None;
        for (index, arm) in self.arms.iter().enumerate() {
            let chol = arm
                .design
                .cholesky()
                .map_err(|source| PolicyError::Invariant { arm: index, source })?;
            let theta = chol.solve(&arm.response);
            let estimate = dot(&theta, context);
            let exploration = self.alpha * chol.inverse_quadratic_form(context).sqrt();
            let score = estimate + exploration;
            scores.push(ArmScore {
                arm: index,
                estimate,
                exploration,
                score,
            });
            // Strict comparison keeps the lowest index on ties.
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((index, score));
            }
        }

        // n_arms > 0 is guaranteed by the constructor.
        let (arm, _) = best.expect("at least one arm");
        Ok(Selection { arm, scores })
    }

    /// Fold the observed reward for `arm` into its model.
    ///
    /// Must be called once per round, for the arm actually selected.
    pub fn update(&mut self, arm: usize, context: &Context, reward: f64) -> Result<(), PolicyError> {
        check_context(context)?;
        if !reward.is_finite() || !(0.0..=1.0).contains(&reward) {
            return Err(PolicyError::RewardOutOfBounds { reward });
        }
        let arms = self.arms.len();
        let state = self
            .arms
            .get_mut(arm)
            .ok_or(PolicyError::ArmOutOfRange { arm, arms })?;
        state.design.rank_one_add(context);
        scaled_add(&mut state.response, context, reward);
        Ok(())
    }
}

fn check_context(context: &Context) -> Result<(), PolicyError> {
    for (index, value) in context.iter().enumerate() {
        if !value.is_finite() {
            return Err(PolicyError::NonFiniteContext { index });
        }
    }
    Ok(())
}
