//! Round identity for log correlation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier for one decision round.
///
/// Every round gets a fresh ID that is attached to all log events emitted
/// while the round is in flight, so a session record, the profile chosen for
/// it, and the model update it produced can be tied back together.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoundId(pub String);

impl RoundId {
    /// Generate a new random round ID.
    pub fn new() -> Self {
        RoundId(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for RoundId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_ids_are_unique() {
        assert_ne!(RoundId::new(), RoundId::new());
    }

    #[test]
    fn round_id_serializes_transparently() {
        let id = RoundId("abc".to_string());
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
    }
}
