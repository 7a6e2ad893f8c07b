//! Decision log line format.
//!
//! The adaptation log is an append-only, line-oriented audit trail of every
//! applied profile. External analysis tooling recovers the decision timeline
//! by pattern-matching on `<timestamp> <level> profile applied: <name>`, so
//! the rendered format is a stable contract: widen it only by appending
//! fields after the source reference, never by reordering the prefix.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Marker phrase identifying an applied-profile line.
pub const APPLIED_MARKER: &str = "profile applied:";

/// One applied-profile record in the adaptation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionLogEntry {
    /// UTC time the profile application completed.
    pub timestamp: DateTime<Utc>,
    /// Severity tag, normally `INFO`.
    pub level: String,
    /// Name of the applied profile.
    pub profile: String,
    /// Path of the profile definition that was applied.
    pub source: String,
}

impl DecisionLogEntry {
    /// Create an INFO entry stamped with the current time.
    pub fn applied_now(profile: &str, source: &str) -> Self {
        DecisionLogEntry {
            timestamp: Utc::now(),
            level: "INFO".to_string(),
            profile: profile.to_string(),
            source: source.to_string(),
        }
    }

    /// Render the stable single-line form.
    ///
    /// Example: `2026-08-08T10:15:30Z INFO profile applied: convincing
    /// (/var/lib/honeypilot/profiles/profile_convincing.json)`
    pub fn render(&self) -> String {
        format!(
            "{} {} {} {} ({})",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.level,
            APPLIED_MARKER,
            self.profile,
            self.source,
        )
    }

    /// Parse a rendered line back into an entry.
    ///
    /// Returns `None` for lines that are not applied-profile records.
    pub fn parse(line: &str) -> Option<Self> {
        let marker_at = line.find(APPLIED_MARKER)?;
        let prefix = line[..marker_at].trim_end();
        let rest = line[marker_at + APPLIED_MARKER.len()..].trim();

        let (timestamp_str, level) = prefix.split_once(' ')?;
        let timestamp = DateTime::parse_from_rfc3339(timestamp_str)
            .ok()?
            .with_timezone(&Utc);

        let open = rest.rfind('(')?;
        let close = rest.rfind(')')?;
        if close < open {
            return None;
        }
        let profile = rest[..open].trim();
        if profile.is_empty() {
            return None;
        }
        Some(DecisionLogEntry {
            timestamp,
            level: level.to_string(),
            profile: profile.to_string(),
            source: rest[open + 1..close].to_string(),
        })
    }
}
