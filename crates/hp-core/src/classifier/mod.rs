//! Classifier service client.
//!
//! Asks the external scoring service how likely a session's operator is a
//! human. The client is a hard boundary for failures: transport errors,
//! timeouts, and malformed responses all collapse to a probability of 0.0
//! ("assume bot"), which steers the policy toward the safer profiles. The
//! control loop therefore always receives a usable probability and never an
//! error.

use hp_common::SessionRecord;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ClassifierSettings;

/// Probability substituted when the classifier cannot be consulted.
pub const DEFAULT_HUMAN_PROB: f64 = 0.0;

/// Internal failure modes, absorbed before they reach the caller.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("transport error: {0}")]
    Transport(#[from] Box<ureq::Error>),

    #[error("malformed response body: {0}")]
    Body(#[from] std::io::Error),

    #[error("response human_prob {0} is not finite")]
    NonFiniteProbability(f64),
}

/// Request body for the scoring endpoint.
#[derive(Debug, Serialize)]
struct ScoreRequest {
    duration_s: f64,
    n_commands_total: u64,
    n_unique_commands: u64,
    username_tried_count: u64,
    attempted_download: u8,
}

impl From<&SessionRecord> for ScoreRequest {
    fn from(session: &SessionRecord) -> Self {
        ScoreRequest {
            duration_s: session.duration_s,
            n_commands_total: session.n_commands_total,
            n_unique_commands: session.n_unique_commands,
            username_tried_count: session.username_tried_count,
            attempted_download: session.attempted_download as u8,
        }
    }
}

/// Response body from the scoring endpoint.
///
/// Absent fields deserialize to their zero values, matching the service's
/// loosely-versioned JSON contract.
#[derive(Debug, Deserialize)]
struct ScoreResponse {
    #[serde(default)]
    bot_prob: f64,
    #[serde(default)]
    human_prob: f64,
    #[serde(default)]
    prediction: String,
}

/// Blocking client for the classifier service.
pub struct ClassifierClient {
    agent: ureq::Agent,
    endpoint: String,
}

impl ClassifierClient {
    /// Build a client with the configured endpoint and timeout.
    pub fn new(settings: &ClassifierSettings) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(settings.timeout())
            .build();
        ClassifierClient {
            agent,
            endpoint: settings.endpoint.clone(),
        }
    }

    /// Human probability for `session`, in `[0, 1]`.
    ///
    /// Never fails: all errors are logged and mapped to
    /// [`DEFAULT_HUMAN_PROB`].
    pub fn predict(&self, session: &SessionRecord) -> f64 {
        match self.score(session) {
            Ok(human_prob) => human_prob,
            Err(error) => {
                warn!(
                    endpoint = %self.endpoint,
                    error = %error,
                    "classifier unavailable, assuming bot",
                );
                DEFAULT_HUMAN_PROB
            }
        }
    }

    fn score(&self, session: &SessionRecord) -> Result<f64, ClassifierError> {
        let request = ScoreRequest::from(session);
        let response: ScoreResponse = self
            .agent
            .post(&self.endpoint)
            .send_json(&request)
            .map_err(Box::new)?
            .into_json()?;

        if !response.human_prob.is_finite() {
            return Err(ClassifierError::NonFiniteProbability(response.human_prob));
        }
        debug!(
            human_prob = response.human_prob,
            bot_prob = response.bot_prob,
            prediction = %response.prediction,
            "classifier scored session",
        );
        Ok(response.human_prob.clamp(0.0, 1.0))
    }
}
