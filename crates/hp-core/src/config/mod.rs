//! Configuration loading and validation for hp-core.
//!
//! This module handles:
//! - Loading the JSON settings file
//! - Resolution order (CLI flag > `HP_CONFIG` env > default path > defaults)
//! - Schema validation (shape/type checking via serde)
//! - Semantic validation (positive scales, nonempty catalog)
//! - Content hashing for provenance logging

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming an explicit settings file.
pub const SETTINGS_ENV: &str = "HP_CONFIG";

/// Settings file name under the default config directory.
pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// Default XDG config directory name.
const CONFIG_DIR_NAME: &str = "honeypilot";

/// Errors that can occur during settings loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("settings file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("invalid JSON in settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Filesystem layout of the managed deception environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsSettings {
    /// Root of the deception host's runtime tree.
    #[serde(default = "default_deception_root")]
    pub deception_root: PathBuf,
    /// Profile definitions directory (default: `<root>/profiles`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profiles_dir: Option<PathBuf>,
    /// Backup directory (default: `<root>/backups`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<PathBuf>,
    /// Decision log file (default: `<root>/adaptation.log`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_log: Option<PathBuf>,
}

fn default_deception_root() -> PathBuf {
    PathBuf::from("/var/lib/honeypilot")
}

impl Default for PathsSettings {
    fn default() -> Self {
        PathsSettings {
            deception_root: default_deception_root(),
            profiles_dir: None,
            backup_dir: None,
            decision_log: None,
        }
    }
}

impl PathsSettings {
    /// Directory holding `profile_<name>.json` definitions.
    pub fn profiles_dir(&self) -> PathBuf {
        self.profiles_dir
            .clone()
            .unwrap_or_else(|| self.deception_root.join("profiles"))
    }

    /// Directory receiving timestamped artifact backups.
    pub fn backup_dir(&self) -> PathBuf {
        self.backup_dir
            .clone()
            .unwrap_or_else(|| self.deception_root.join("backups"))
    }

    /// Append-only adaptation log.
    pub fn decision_log(&self) -> PathBuf {
        self.decision_log
            .clone()
            .unwrap_or_else(|| self.deception_root.join("adaptation.log"))
    }

    /// Managed banner artifact.
    pub fn banner_path(&self) -> PathBuf {
        self.deception_root.join("etc").join("banner.txt")
    }

    /// Managed credential database artifact.
    pub fn userdb_path(&self) -> PathBuf {
        self.deception_root.join("etc").join("userdb.txt")
    }

    /// Emulated home directory receiving decoy files.
    pub fn honeyfs_home(&self) -> PathBuf {
        self.deception_root
            .join("honeyfs")
            .join("home")
            .join("root")
    }
}

/// Classifier service client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierSettings {
    /// Scoring endpoint URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Request timeout in seconds.
    #[serde(default = "default_classifier_timeout")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String {
    "http://127.0.0.1:8001/predict".to_string()
}

fn default_classifier_timeout() -> u64 {
    5
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        ClassifierSettings {
            endpoint: default_endpoint(),
            timeout_secs: default_classifier_timeout(),
        }
    }
}

impl ClassifierSettings {
    /// Request timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Actuator invocation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActuatorSettings {
    /// Deadline for one profile application in seconds.
    #[serde(default = "default_actuator_timeout")]
    pub timeout_secs: u64,
    /// Run the actuator as an isolated child process.
    #[serde(default = "default_isolate")]
    pub isolate: bool,
}

fn default_actuator_timeout() -> u64 {
    10
}

fn default_isolate() -> bool {
    true
}

impl Default for ActuatorSettings {
    fn default() -> Self {
        ActuatorSettings {
            timeout_secs: default_actuator_timeout(),
            isolate: default_isolate(),
        }
    }
}

impl ActuatorSettings {
    /// Application deadline as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Bandit policy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BanditSettings {
    /// Exploration coefficient (must be positive).
    #[serde(default = "default_alpha")]
    pub alpha: f64,
}

fn default_alpha() -> f64 {
    1.2
}

impl Default for BanditSettings {
    fn default() -> Self {
        BanditSettings {
            alpha: default_alpha(),
        }
    }
}

/// Context normalization scales.
///
/// Empirical constants carried over from the deployed system; tune per
/// installation rather than treating them as a fixed contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizationScales {
    /// Session duration scale in seconds.
    #[serde(default = "default_duration_scale")]
    pub duration_s: f64,
    /// Total command count scale.
    #[serde(default = "default_commands_scale")]
    pub commands_total: f64,
    /// Unique command count scale.
    #[serde(default = "default_unique_scale")]
    pub unique_commands: f64,
    /// Attempted username count scale.
    #[serde(default = "default_usernames_scale")]
    pub usernames: f64,
}

fn default_duration_scale() -> f64 {
    300.0
}

fn default_commands_scale() -> f64 {
    50.0
}

fn default_unique_scale() -> f64 {
    20.0
}

fn default_usernames_scale() -> f64 {
    5.0
}

impl Default for NormalizationScales {
    fn default() -> Self {
        NormalizationScales {
            duration_s: default_duration_scale(),
            commands_total: default_commands_scale(),
            unique_commands: default_unique_scale(),
            usernames: default_usernames_scale(),
        }
    }
}

/// Reward formula scales (same tunable status as [`NormalizationScales`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardScales {
    /// Command count scale.
    #[serde(default = "default_reward_commands_scale")]
    pub commands: f64,
    /// Session duration scale in seconds.
    #[serde(default = "default_reward_duration_scale")]
    pub duration_s: f64,
}

fn default_reward_commands_scale() -> f64 {
    10.0
}

fn default_reward_duration_scale() -> f64 {
    300.0
}

impl Default for RewardScales {
    fn default() -> Self {
        RewardScales {
            commands: default_reward_commands_scale(),
            duration_s: default_reward_duration_scale(),
        }
    }
}

/// Top-level controller settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub paths: PathsSettings,
    /// Deception profile catalog, in arm-index order.
    #[serde(default = "default_catalog")]
    pub catalog: Vec<String>,
    #[serde(default)]
    pub classifier: ClassifierSettings,
    #[serde(default)]
    pub actuator: ActuatorSettings,
    #[serde(default)]
    pub bandit: BanditSettings,
    #[serde(default)]
    pub normalization: NormalizationScales,
    #[serde(default)]
    pub reward: RewardScales,
}

fn default_catalog() -> Vec<String> {
    vec![
        "conservative".to_string(),
        "convincing".to_string(),
        "vulnerable".to_string(),
    ]
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            paths: PathsSettings::default(),
            catalog: default_catalog(),
            classifier: ClassifierSettings::default(),
            actuator: ActuatorSettings::default(),
            bandit: BanditSettings::default(),
            normalization: NormalizationScales::default(),
            reward: RewardScales::default(),
        }
    }
}

impl Settings {
    /// Semantic validation beyond what serde's shape checking provides.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.catalog.is_empty() {
            return Err(ConfigError::Invalid {
                field: "catalog",
                reason: "profile catalog must not be empty".to_string(),
            });
        }
        for name in &self.catalog {
            if name.is_empty()
                || !name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                return Err(ConfigError::Invalid {
                    field: "catalog",
                    reason: format!("profile name {:?} is not filename-safe", name),
                });
            }
        }
        for (i, name) in self.catalog.iter().enumerate() {
            if self.catalog[..i].contains(name) {
                return Err(ConfigError::Invalid {
                    field: "catalog",
                    reason: format!("duplicate profile name {:?}", name),
                });
            }
        }

        if !self.bandit.alpha.is_finite() || self.bandit.alpha <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "bandit.alpha",
                reason: format!("must be a positive number, got {}", self.bandit.alpha),
            });
        }

        let scales: [(&'static str, f64); 6] = [
            ("normalization.duration_s", self.normalization.duration_s),
            (
                "normalization.commands_total",
                self.normalization.commands_total,
            ),
            (
                "normalization.unique_commands",
                self.normalization.unique_commands,
            ),
            ("normalization.usernames", self.normalization.usernames),
            ("reward.commands", self.reward.commands),
            ("reward.duration_s", self.reward.duration_s),
        ];
        for (field, value) in scales {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("must be a positive number, got {}", value),
                });
            }
        }

        if self.classifier.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "classifier.timeout_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.actuator.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "actuator.timeout_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Loaded settings with provenance information.
#[derive(Debug, Clone)]
pub struct ResolvedSettings {
    /// The validated settings.
    pub settings: Settings,
    /// Source file (None if built-in defaults were used).
    pub path: Option<PathBuf>,
    /// SHA-256 of the source file content (None if defaults).
    pub sha256: Option<String>,
}

impl ResolvedSettings {
    /// Resolve settings: explicit path > `HP_CONFIG` env > default path >
    /// built-in defaults.
    ///
    /// An explicitly named file (flag or env) must exist; the default path
    /// is optional.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_file(path);
        }
        if let Some(path) = std::env::var_os(SETTINGS_ENV) {
            return Self::load_file(Path::new(&path));
        }
        let default = default_settings_path();
        if default.exists() {
            return Self::load_file(&default);
        }
        Ok(ResolvedSettings {
            settings: Settings::default(),
            path: None,
            sha256: None,
        })
    }

    /// Load and validate a settings file.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound {
                    path: path.to_path_buf(),
                })
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let settings: Settings =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        settings.validate()?;
        Ok(ResolvedSettings {
            settings,
            path: Some(path.to_path_buf()),
            sha256: Some(sha256_hex(content.as_bytes())),
        })
    }
}

/// Default settings file location under the user config directory.
pub fn default_settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
        .join(SETTINGS_FILE_NAME)
}

/// Hex-encoded SHA-256 digest.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
