//! Profile actuation.
//!
//! Applies a named deception profile to the live environment's managed
//! artifacts: the pre-login banner, the credential database, and the decoy
//! file set. The deception host reads these files concurrently, so every
//! overwrite goes through write-to-temp-then-rename — a reader sees either
//! the old complete content or the new complete content, never a mix.
//! Existing artifacts are backed up before each overwrite; decoy files are
//! created once and never touched again.
//!
//! Application is best-effort per artifact: one failing artifact is logged
//! and recorded in the report while the remaining artifacts are still
//! processed. Applying the same profile twice is idempotent in content.

use chrono::Utc;
use hp_common::decision_log::DecisionLogEntry;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::PathsSettings;
use crate::profiles::{load_profile, LoadedProfile, ProfileError};

/// Errors that abort a profile application outright.
///
/// Per-artifact failures do not abort; they are recorded in the
/// [`ApplyReport`] instead.
#[derive(Debug, Error)]
pub enum ActuatorError {
    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error("failed to prepare directory {path}: {source}")]
    Prepare {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Managed artifact classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Banner,
    UserDb,
    DecoyFile,
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactKind::Banner => write!(f, "banner"),
            ArtifactKind::UserDb => write!(f, "userdb"),
            ArtifactKind::DecoyFile => write!(f, "decoy_file"),
        }
    }
}

/// Outcome of one artifact within a profile application.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum ArtifactStatus {
    /// Existing artifact was backed up and atomically replaced.
    Replaced { backup: PathBuf },
    /// Artifact did not exist and was created (no backup).
    Created,
    /// Decoy already present; left untouched.
    AlreadyPresent,
    /// This artifact failed; the rest of the profile was still applied.
    Failed { reason: String },
}

/// One artifact's outcome.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactOutcome {
    pub kind: ArtifactKind,
    pub path: PathBuf,
    #[serde(flatten)]
    pub status: ArtifactStatus,
}

impl ArtifactOutcome {
    fn failed(kind: ArtifactKind, path: PathBuf, reason: String) -> Self {
        warn!(artifact = %kind, path = %path.display(), %reason, "artifact application failed");
        ArtifactOutcome {
            kind,
            path,
            status: ArtifactStatus::Failed { reason },
        }
    }

    /// Whether this artifact ended in a failed state.
    pub fn is_failed(&self) -> bool {
        matches!(self.status, ArtifactStatus::Failed { .. })
    }
}

/// Report of one profile application.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    /// Applied profile name.
    pub profile: String,
    /// Profile definition path.
    pub source: PathBuf,
    /// SHA-256 of the profile definition content.
    pub source_sha256: String,
    /// Per-artifact outcomes, in processing order.
    pub outcomes: Vec<ArtifactOutcome>,
    /// Whether the decision-log entry was appended.
    pub log_recorded: bool,
}

impl ApplyReport {
    /// Number of artifacts that failed.
    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failed()).count()
    }

    /// Whether some artifacts failed while others were applied.
    pub fn is_partial(&self) -> bool {
        self.failed_count() > 0 || !self.log_recorded
    }
}

/// Applies profiles to the managed deception environment.
pub struct Actuator {
    paths: PathsSettings,
}

impl Actuator {
    pub fn new(paths: PathsSettings) -> Self {
        Actuator { paths }
    }

    /// Apply `profile_name` from the profile store.
    ///
    /// Fails only when the profile cannot be resolved or the managed
    /// directories cannot be prepared; individual artifact failures are
    /// recorded in the returned report.
    pub fn apply(&self, profile_name: &str) -> Result<ApplyReport, ActuatorError> {
        self.ensure_dirs()?;
        let profile = load_profile(&self.paths.profiles_dir(), profile_name)?;

        let mut outcomes = Vec::new();

        if let Some(banner) = profile.definition.banner.as_deref() {
            if !banner.is_empty() {
                let content = format!("{}\n", banner);
                outcomes.push(self.replace_artifact(
                    ArtifactKind::Banner,
                    self.paths.banner_path(),
                    content.as_bytes(),
                ));
            }
        }

        if !profile.definition.users.is_empty() {
            let mut content = profile.definition.users.join("\n");
            content.push('\n');
            outcomes.push(self.replace_artifact(
                ArtifactKind::UserDb,
                self.paths.userdb_path(),
                content.as_bytes(),
            ));
        }

        for file_name in &profile.definition.fake_files {
            outcomes.push(self.ensure_decoy(file_name));
        }

        let log_recorded = self.record_decision(&profile);
        let report = ApplyReport {
            profile: profile.name.clone(),
            source: profile.path.clone(),
            source_sha256: profile.sha256.clone(),
            outcomes,
            log_recorded,
        };
        info!(
            profile = %report.profile,
            source = %report.source.display(),
            source_sha256 = %report.source_sha256,
            artifacts = report.outcomes.len(),
            failed = report.failed_count(),
            "profile application finished",
        );
        Ok(report)
    }

    fn ensure_dirs(&self) -> Result<(), ActuatorError> {
        let dirs = [
            self.paths.backup_dir(),
            self.paths.profiles_dir(),
            self.paths.honeyfs_home(),
            self.paths.deception_root.join("etc"),
        ];
        for dir in dirs {
            fs::create_dir_all(&dir).map_err(|source| ActuatorError::Prepare {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Back up (if present) and atomically replace one managed file.
    fn replace_artifact(
        &self,
        kind: ArtifactKind,
        target: PathBuf,
        content: &[u8],
    ) -> ArtifactOutcome {
        match self.try_replace(&target, content) {
            Ok(Some(backup)) => {
                info!(artifact = %kind, path = %target.display(), backup = %backup.display(), "artifact replaced");
                ArtifactOutcome {
                    kind,
                    path: target,
                    status: ArtifactStatus::Replaced { backup },
                }
            }
            Ok(None) => {
                info!(artifact = %kind, path = %target.display(), "artifact created");
                ArtifactOutcome {
                    kind,
                    path: target,
                    status: ArtifactStatus::Created,
                }
            }
            Err(err) => ArtifactOutcome::failed(kind, target, err.to_string()),
        }
    }

    fn try_replace(&self, target: &Path, content: &[u8]) -> std::io::Result<Option<PathBuf>> {
        let backup = self.backup_existing(target)?;
        atomic_write(target, content)?;
        Ok(backup)
    }

    /// Copy an existing artifact to `<backup-dir>/<name>.<UTC-ts>.bak`.
    ///
    /// Returns `None` when the target does not exist yet. `fs::copy`
    /// carries the permission bits over to the backup.
    fn backup_existing(&self, target: &Path) -> std::io::Result<Option<PathBuf>> {
        if !target.exists() {
            return Ok(None);
        }
        let file_name = target
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("artifact");
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%3fZ");
        let backup = self
            .paths
            .backup_dir()
            .join(format!("{}.{}.bak", file_name, stamp));
        fs::copy(target, &backup)?;
        Ok(Some(backup))
    }

    /// Create a decoy file if absent; never overwrite an existing one.
    fn ensure_decoy(&self, file_name: &str) -> ArtifactOutcome {
        let home = self.paths.honeyfs_home();
        if let Err(reason) = validate_decoy_name(file_name) {
            return ArtifactOutcome::failed(ArtifactKind::DecoyFile, home.join(file_name), reason);
        }
        let target = home.join(file_name);
        if target.exists() {
            return ArtifactOutcome {
                kind: ArtifactKind::DecoyFile,
                path: target,
                status: ArtifactStatus::AlreadyPresent,
            };
        }
        let content = format!(
            "# placeholder file {}\n# created by honeypilot at {}\n",
            file_name,
            Utc::now().to_rfc3339(),
        );
        if let Err(err) = atomic_write(&target, content.as_bytes()) {
            return ArtifactOutcome::failed(ArtifactKind::DecoyFile, target, err.to_string());
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(err) = fs::set_permissions(&target, fs::Permissions::from_mode(0o644)) {
                warn!(path = %target.display(), error = %err, "failed to set decoy permissions");
            }
        }
        info!(path = %target.display(), "decoy file created");
        ArtifactOutcome {
            kind: ArtifactKind::DecoyFile,
            path: target,
            status: ArtifactStatus::Created,
        }
    }

    /// Append the applied-profile line to the adaptation log.
    fn record_decision(&self, profile: &LoadedProfile) -> bool {
        let entry = DecisionLogEntry::applied_now(&profile.name, &profile.path.display().to_string());
        match self.append_decision_entry(&entry) {
            Ok(()) => true,
            Err(err) => {
                error!(
                    log = %self.paths.decision_log().display(),
                    error = %err,
                    "failed to append decision log entry",
                );
                false
            }
        }
    }

    fn append_decision_entry(&self, entry: &DecisionLogEntry) -> std::io::Result<()> {
        let path = self.paths.decision_log();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(file, "{}", entry.render())?;
        file.flush()
    }
}

/// Write `content` to a temp file next to `path`, then rename over it.
///
/// The rename is a single filesystem operation, so concurrent readers never
/// observe a partially written file.
pub fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("artifact");
    let tmp_path = path.with_file_name(format!("{}.tmp.{}", file_name, std::process::id()));
    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(content)?;
        let _ = file.sync_all();
    }
    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }
    Ok(())
}

/// Decoy names must stay inside the emulated home directory.
fn validate_decoy_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("decoy file name is empty".to_string());
    }
    if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
        return Err(format!("decoy file name {:?} escapes the decoy directory", name));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoy_names_reject_traversal() {
        assert!(validate_decoy_name("passwords.txt").is_ok());
        assert!(validate_decoy_name("backup.tar.gz").is_ok());
        assert!(validate_decoy_name("").is_err());
        assert!(validate_decoy_name("..").is_err());
        assert!(validate_decoy_name("../../etc/passwd").is_err());
        assert!(validate_decoy_name("a/b").is_err());
    }

    #[test]
    fn atomic_write_replaces_content() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("banner.txt");

        atomic_write(&path, b"first\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "first\n");

        atomic_write(&path, b"second\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second\n");

        // No temp droppings left behind.
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .filter(|n| n.to_string_lossy().contains(".tmp."))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn atomic_write_creates_parent_directories() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("etc").join("banner.txt");
        atomic_write(&path, b"hello\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello\n");
    }
}
