//! Session behavior records.
//!
//! A `SessionRecord` summarizes one closed attacker session. Records are
//! produced by the external log-ingestion collaborator (live mode) or
//! synthesized (simulation mode); this crate only defines the wire shape.
//!
//! The ingestion side is lenient by contract: absent fields are zero, and
//! the download flag may arrive as a JSON boolean or as `0`/`1`.

use serde::{Deserialize, Deserializer, Serialize};

/// Behavioral summary of one attacker session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Wall-clock session duration in seconds.
    #[serde(default)]
    pub duration_s: f64,
    /// Total shell commands issued.
    #[serde(default)]
    pub n_commands_total: u64,
    /// Distinct shell commands issued.
    #[serde(default)]
    pub n_unique_commands: u64,
    /// Distinct usernames attempted at login.
    #[serde(default)]
    pub username_tried_count: u64,
    /// Whether the session attempted to download a payload.
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub attempted_download: bool,
}

impl Default for SessionRecord {
    fn default() -> Self {
        SessionRecord {
            duration_s: 0.0,
            n_commands_total: 0,
            n_unique_commands: 0,
            username_tried_count: 0,
            attempted_download: false,
        }
    }
}

/// Accept `true`/`false`, `0`/`1`, or `0.0`/`1.0` for the download flag.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    struct FlagVisitor;

    impl serde::de::Visitor<'_> for FlagVisitor {
        type Value = bool;

        fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("a boolean or 0/1")
        }

        fn visit_bool<E: serde::de::Error>(self, v: bool) -> Result<bool, E> {
            Ok(v)
        }

        fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<bool, E> {
            match v {
                0 => Ok(false),
                1 => Ok(true),
                other => Err(E::custom(format!("flag must be 0 or 1, got {}", other))),
            }
        }

        fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<bool, E> {
            match v {
                0 => Ok(false),
                1 => Ok(true),
                other => Err(E::custom(format!("flag must be 0 or 1, got {}", other))),
            }
        }

        fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<bool, E> {
            if v == 0.0 {
                Ok(false)
            } else if v == 1.0 {
                Ok(true)
            } else {
                Err(E::custom(format!("flag must be 0 or 1, got {}", v)))
            }
        }
    }

    deserializer.deserialize_any(FlagVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_default_to_zero() {
        let record: SessionRecord = serde_json::from_str("{}").unwrap();
        assert_eq!(record, SessionRecord::default());
    }

    #[test]
    fn download_flag_accepts_integers() {
        let record: SessionRecord =
            serde_json::from_str(r#"{"attempted_download": 1}"#).unwrap();
        assert!(record.attempted_download);

        let record: SessionRecord =
            serde_json::from_str(r#"{"attempted_download": 0}"#).unwrap();
        assert!(!record.attempted_download);
    }

    #[test]
    fn download_flag_accepts_booleans() {
        let record: SessionRecord =
            serde_json::from_str(r#"{"attempted_download": true}"#).unwrap();
        assert!(record.attempted_download);
    }

    #[test]
    fn download_flag_rejects_other_integers() {
        let result: Result<SessionRecord, _> =
            serde_json::from_str(r#"{"attempted_download": 7}"#);
        assert!(result.is_err());
    }

    #[test]
    fn full_record_parses() {
        let record: SessionRecord = serde_json::from_str(
            r#"{
                "duration_s": 120.5,
                "n_commands_total": 14,
                "n_unique_commands": 9,
                "username_tried_count": 2,
                "attempted_download": 1
            }"#,
        )
        .unwrap();
        assert_eq!(record.duration_s, 120.5);
        assert_eq!(record.n_commands_total, 14);
        assert_eq!(record.n_unique_commands, 9);
        assert_eq!(record.username_tried_count, 2);
        assert!(record.attempted_download);
    }
}
