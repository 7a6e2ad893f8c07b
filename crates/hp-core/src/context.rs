//! Context vector construction.
//!
//! Folds one session record and the classifier's human probability into the
//! fixed-length normalized vector the bandit consumes. Pure computation,
//! no I/O.

use hp_common::SessionRecord;

use crate::config::NormalizationScales;

/// Dimension of the bandit context vector.
pub const CONTEXT_DIM: usize = 6;

/// Normalized per-round feature vector.
pub type Context = [f64; CONTEXT_DIM];

/// Builds context vectors with fixed normalization scales.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    scales: NormalizationScales,
}

impl ContextBuilder {
    pub fn new(scales: NormalizationScales) -> Self {
        ContextBuilder { scales }
    }

    /// Build the context for one decision round.
    ///
    /// Components, in order: scaled duration, scaled total commands, scaled
    /// unique commands, scaled username attempts, download flag,
    /// human probability. Every component is finite: non-finite or negative
    /// inputs are treated as missing (zero), and the probability is clamped
    /// to `[0, 1]`.
    pub fn build(&self, session: &SessionRecord, human_probability: f64) -> Context {
        [
            non_negative(session.duration_s) / self.scales.duration_s,
            session.n_commands_total as f64 / self.scales.commands_total,
            session.n_unique_commands as f64 / self.scales.unique_commands,
            session.username_tried_count as f64 / self.scales.usernames,
            if session.attempted_download { 1.0 } else { 0.0 },
            non_negative(human_probability).clamp(0.0, 1.0),
        ]
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> ContextBuilder {
        ContextBuilder::new(NormalizationScales::default())
    }

    #[test]
    fn normalizes_with_default_scales() {
        let session = SessionRecord {
            duration_s: 150.0,
            n_commands_total: 25,
            n_unique_commands: 10,
            username_tried_count: 2,
            attempted_download: true,
        };
        let x = builder().build(&session, 0.9);
        assert_eq!(x, [0.5, 0.5, 0.5, 0.4, 1.0, 0.9]);
    }

    #[test]
    fn empty_session_maps_to_probability_only() {
        let x = builder().build(&SessionRecord::default(), 0.25);
        assert_eq!(x, [0.0, 0.0, 0.0, 0.0, 0.0, 0.25]);
    }

    #[test]
    fn non_finite_inputs_become_zero() {
        let session = SessionRecord {
            duration_s: f64::NAN,
            ..Default::default()
        };
        let x = builder().build(&session, f64::INFINITY);
        assert!(x.iter().all(|v| v.is_finite()));
        assert_eq!(x[0], 0.0);
        assert_eq!(x[5], 0.0);
    }

    #[test]
    fn negative_duration_becomes_zero() {
        let session = SessionRecord {
            duration_s: -30.0,
            ..Default::default()
        };
        let x = builder().build(&session, 0.5);
        assert_eq!(x[0], 0.0);
    }

    #[test]
    fn probability_is_clamped() {
        let x = builder().build(&SessionRecord::default(), 3.0);
        assert_eq!(x[5], 1.0);
    }
}
