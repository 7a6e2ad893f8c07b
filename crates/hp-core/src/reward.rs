//! Reward evaluation.
//!
//! Converts a session outcome into a bounded engagement score. The formula
//! is a heuristic proxy for intelligence value, not a ground-truth label:
//! longer, busier sessions score higher, saturating at 1.

use hp_common::SessionRecord;

use crate::config::RewardScales;

/// Maps session outcomes to rewards in `[0, 1]`.
#[derive(Debug, Clone)]
pub struct RewardEvaluator {
    scales: RewardScales,
}

impl RewardEvaluator {
    pub fn new(scales: RewardScales) -> Self {
        RewardEvaluator { scales }
    }

    /// Engagement reward for one observed (or simulated) session outcome.
    ///
    /// `commands_total/commands_scale + duration_s/duration_scale`, clamped
    /// at 1. Both terms are non-negative; negative or non-finite durations
    /// contribute zero.
    pub fn evaluate(&self, outcome: &SessionRecord) -> f64 {
        let commands = outcome.n_commands_total as f64 / self.scales.commands;
        let duration = non_negative(outcome.duration_s) / self.scales.duration_s;
        (commands + duration).min(1.0)
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}
