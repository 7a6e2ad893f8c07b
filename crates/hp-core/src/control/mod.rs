//! The per-session decision loop.
//!
//! One round per closed attacker session: consult the classifier, build the
//! context vector, select a profile, apply it, observe the reward, update
//! the selected arm's model. Rounds are strictly sequential; the bandit
//! state has a single owner and no concurrent writers.
//!
//! Failure policy follows the error taxonomy: classifier and actuator
//! failures are absorbed and the round completes (the model still learns
//! from the observed reward, so an unreachable profile is learned to
//! underperform), while policy invariant violations abort the loop because
//! they indicate a programming defect.
//!
//! The actuator can run isolated: the loop re-invokes its own binary as
//! `hp-core apply <profile>` under a deadline, so a hung or crashed
//! actuation cannot corrupt the in-memory bandit state.

use hp_common::{RoundId, SessionRecord};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::io::{BufRead, Read};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::actuator::Actuator;
use crate::classifier::ClassifierClient;
use crate::config::Settings;
use crate::context::ContextBuilder;
use crate::policy::{LinUcbPolicy, PolicyError};
use crate::reward::RewardEvaluator;

/// Poll interval while waiting on an isolated actuator child.
const CHILD_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Errors that abort the loop.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error("failed to read session stream: {0}")]
    Stream(#[from] std::io::Error),
}

/// How a round's profile application ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyOutcome {
    /// All artifacts applied.
    Applied,
    /// Some artifacts applied, some failed.
    Partial,
    /// Nothing applied; the round still completed.
    Failed { reason: String },
}

/// Summary of one completed decision round.
#[derive(Debug, Clone, Serialize)]
pub struct RoundSummary {
    pub round: RoundId,
    pub profile: String,
    pub arm: usize,
    pub human_prob: f64,
    pub reward: f64,
    pub apply: ApplyOutcome,
}

/// Summary of a live run over a session stream.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct LiveSummary {
    /// Completed rounds.
    pub rounds: u64,
    /// Malformed records skipped.
    pub skipped: u64,
}

enum ActuatorMode {
    /// Apply in this process (tests, single-binary deployments).
    InProcess(Box<Actuator>),
    /// Apply via `<binary> apply <profile>` under a deadline.
    Isolated {
        binary: PathBuf,
        config: Option<PathBuf>,
        timeout: Duration,
    },
}

/// Owns the bandit state and drives rounds.
pub struct Controller {
    catalog: Vec<String>,
    policy: LinUcbPolicy,
    context: ContextBuilder,
    classifier: ClassifierClient,
    reward: RewardEvaluator,
    mode: ActuatorMode,
}

impl Controller {
    /// Build a controller from validated settings.
    ///
    /// `config_path` is forwarded to isolated actuator invocations so the
    /// child resolves the same settings file.
    pub fn new(settings: &Settings, config_path: Option<PathBuf>) -> Result<Self, PolicyError> {
        let policy = LinUcbPolicy::new(settings.catalog.len(), settings.bandit.alpha)?;
        let mode = if settings.actuator.isolate {
            ActuatorMode::Isolated {
                binary: std::env::current_exe()
                    .unwrap_or_else(|_| PathBuf::from("hp-core")),
                config: config_path,
                timeout: settings.actuator.timeout(),
            }
        } else {
            ActuatorMode::InProcess(Box::new(Actuator::new(settings.paths.clone())))
        };
        Ok(Controller {
            catalog: settings.catalog.clone(),
            policy,
            context: ContextBuilder::new(settings.normalization.clone()),
            classifier: ClassifierClient::new(&settings.classifier),
            reward: RewardEvaluator::new(settings.reward.clone()),
            mode,
        })
    }

    /// Execute one full decision round for a closed session.
    pub fn run_round(&mut self, session: &SessionRecord) -> Result<RoundSummary, ControlError> {
        let round = RoundId::new();

        let human_prob = self.classifier.predict(session);
        let context = self.context.build(session, human_prob);
        let selection = self.policy.select(&context)?;
        let profile = self.catalog[selection.arm].clone();
        debug!(
            round = %round,
            profile = %profile,
            scores = %serde_json::to_string(&selection.scores).unwrap_or_default(),
            "profile selected",
        );

        let apply = self.apply_profile(&profile);
        if let ApplyOutcome::Failed { reason } = &apply {
            warn!(round = %round, profile = %profile, %reason, "profile application failed");
        }

        let reward = self.reward.evaluate(session);
        self.policy.update(selection.arm, &context, reward)?;

        let summary = RoundSummary {
            round,
            profile,
            arm: selection.arm,
            human_prob,
            reward,
            apply,
        };
        info!(
            round = %summary.round,
            profile = %summary.profile,
            arm = summary.arm,
            human_prob = summary.human_prob,
            reward = summary.reward,
            applied = summary.apply == ApplyOutcome::Applied,
            "round complete",
        );
        Ok(summary)
    }

    /// Drive rounds from a JSONL stream of session-closed records.
    ///
    /// Malformed lines are logged and skipped; the loop runs until the
    /// stream ends.
    pub fn run_live<R: BufRead>(&mut self, reader: R) -> Result<LiveSummary, ControlError> {
        let mut summary = LiveSummary {
            rounds: 0,
            skipped: 0,
        };
        for line in reader.lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let session: SessionRecord = match serde_json::from_str(trimmed) {
                Ok(session) => session,
                Err(error) => {
                    warn!(%error, "skipping malformed session record");
                    summary.skipped += 1;
                    continue;
                }
            };
            self.run_round(&session)?;
            summary.rounds += 1;
        }
        info!(
            rounds = summary.rounds,
            skipped = summary.skipped,
            "session stream ended",
        );
        Ok(summary)
    }

    /// Run a bounded number of rounds over synthetic sessions.
    pub fn run_simulation(
        &mut self,
        rounds: u32,
        seed: Option<u64>,
    ) -> Result<Vec<RoundSummary>, ControlError> {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let mut summaries = Vec::with_capacity(rounds as usize);
        for n in 1..=rounds {
            let session = synthetic_session(&mut rng);
            debug!(n, rounds, ?session, "simulated session");
            summaries.push(self.run_round(&session)?);
        }
        Ok(summaries)
    }

    fn apply_profile(&self, profile: &str) -> ApplyOutcome {
        match &self.mode {
            ActuatorMode::InProcess(actuator) => match actuator.apply(profile) {
                Ok(report) if report.is_partial() => ApplyOutcome::Partial,
                Ok(_) => ApplyOutcome::Applied,
                Err(err) => ApplyOutcome::Failed {
                    reason: err.to_string(),
                },
            },
            ActuatorMode::Isolated {
                binary,
                config,
                timeout,
            } => apply_isolated(binary, config.as_deref(), *timeout, profile),
        }
    }
}

/// Synthetic session with the deployed system's sampling ranges.
pub fn synthetic_session<R: Rng>(rng: &mut R) -> SessionRecord {
    SessionRecord {
        duration_s: rng.random_range(10..200) as f64,
        n_commands_total: rng.random_range(0..30),
        n_unique_commands: rng.random_range(0..10),
        username_tried_count: rng.random_range(1..3),
        attempted_download: rng.random_bool(0.5),
    }
}

/// Run `<binary> apply <profile>` and wait for it under a deadline.
///
/// A child that outlives the deadline is killed; the round treats that the
/// same as any other application failure.
fn apply_isolated(
    binary: &std::path::Path,
    config: Option<&std::path::Path>,
    timeout: Duration,
    profile: &str,
) -> ApplyOutcome {
    let mut command = Command::new(binary);
    if let Some(config) = config {
        command.arg("--config").arg(config);
    }
    command
        .arg("apply")
        .arg(profile)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(err) => {
            return ApplyOutcome::Failed {
                reason: format!("failed to spawn actuator: {}", err),
            }
        }
    };

    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                let mut stderr = String::new();
                if let Some(mut pipe) = child.stderr.take() {
                    let _ = pipe.read_to_string(&mut stderr);
                }
                return match status.code() {
                    Some(0) => ApplyOutcome::Applied,
                    Some(1) => ApplyOutcome::Partial,
                    Some(code) => ApplyOutcome::Failed {
                        reason: format!(
                            "actuator exited with code {}: {}",
                            code,
                            stderr.trim(),
                        ),
                    },
                    None => ApplyOutcome::Failed {
                        reason: "actuator killed by signal".to_string(),
                    },
                };
            }
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return ApplyOutcome::Failed {
                        reason: format!("actuator timed out after {:?}", timeout),
                    };
                }
                std::thread::sleep(CHILD_POLL_INTERVAL);
            }
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                return ApplyOutcome::Failed {
                    reason: format!("failed to wait on actuator: {}", err),
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hp_common::decision_log::DecisionLogEntry;
    use std::io::Cursor;
    use std::path::Path;
    use tempfile::TempDir;

    /// Settings rooted in a temp dir, in-process actuation, and a
    /// classifier endpoint that refuses connections immediately.
    fn test_settings(root: &Path) -> Settings {
        let mut settings = Settings::default();
        settings.paths.deception_root = root.to_path_buf();
        settings.actuator.isolate = false;
        settings.classifier.endpoint = "http://127.0.0.1:1/predict".to_string();
        settings.classifier.timeout_secs = 1;
        settings
    }

    fn write_profiles(settings: &Settings) {
        let dir = settings.paths.profiles_dir();
        std::fs::create_dir_all(&dir).unwrap();
        for name in &settings.catalog {
            std::fs::write(
                dir.join(format!("profile_{}.json", name)),
                format!(r#"{{"banner": "banner for {}"}}"#, name),
            )
            .unwrap();
        }
    }

    fn decision_log_entries(settings: &Settings) -> Vec<DecisionLogEntry> {
        let content =
            std::fs::read_to_string(settings.paths.decision_log()).unwrap_or_default();
        content.lines().filter_map(DecisionLogEntry::parse).collect()
    }

    #[test]
    fn round_completes_when_classifier_is_unreachable() {
        let dir = TempDir::new().unwrap();
        let settings = test_settings(dir.path());
        write_profiles(&settings);
        let mut controller = Controller::new(&settings, None).unwrap();

        let session = SessionRecord {
            duration_s: 60.0,
            n_commands_total: 3,
            ..Default::default()
        };
        let summary = controller.run_round(&session).unwrap();

        assert_eq!(summary.human_prob, 0.0);
        assert!((summary.reward - 0.5).abs() < 1e-12);
        assert_eq!(summary.apply, ApplyOutcome::Applied);
        // Fresh models tie on every arm; lowest index wins.
        assert_eq!(summary.arm, 0);
        assert_eq!(summary.profile, "conservative");

        // Exactly one decision-log entry for the round.
        let entries = decision_log_entries(&settings);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].profile, "conservative");
    }

    #[test]
    fn round_survives_missing_profile_definition() {
        let dir = TempDir::new().unwrap();
        let settings = test_settings(dir.path());
        // No profile files written: application must fail, the round not.
        let mut controller = Controller::new(&settings, None).unwrap();

        // A session with activity but zero engagement reward.
        let session = SessionRecord {
            username_tried_count: 2,
            attempted_download: true,
            ..Default::default()
        };
        let summary = controller.run_round(&session).unwrap();
        assert!(matches!(summary.apply, ApplyOutcome::Failed { .. }));
        assert_eq!(summary.arm, 0);
        assert_eq!(summary.reward, 0.0);

        // The model was still updated: arm 0 earned nothing, so its
        // uncertainty shrank and the next round moves to a fresh arm.
        let next = controller.run_round(&session).unwrap();
        assert_eq!(next.arm, 1);
    }

    #[test]
    fn live_mode_skips_malformed_records() {
        let dir = TempDir::new().unwrap();
        let settings = test_settings(dir.path());
        write_profiles(&settings);
        let mut controller = Controller::new(&settings, None).unwrap();

        let stream = Cursor::new(
            "{\"duration_s\": 10, \"n_commands_total\": 1}\n\
             not json at all\n\
             \n\
             {\"duration_s\": 20}\n",
        );
        let summary = controller.run_live(stream).unwrap();
        assert_eq!(summary.rounds, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(decision_log_entries(&settings).len(), 2);
    }

    #[test]
    fn simulation_is_reproducible_with_a_seed() {
        let dir_a = TempDir::new().unwrap();
        let dir_b = TempDir::new().unwrap();
        let settings_a = test_settings(dir_a.path());
        let settings_b = test_settings(dir_b.path());
        write_profiles(&settings_a);
        write_profiles(&settings_b);

        let mut controller_a = Controller::new(&settings_a, None).unwrap();
        let mut controller_b = Controller::new(&settings_b, None).unwrap();

        let rounds_a = controller_a.run_simulation(5, Some(42)).unwrap();
        let rounds_b = controller_b.run_simulation(5, Some(42)).unwrap();

        let picks_a: Vec<_> = rounds_a.iter().map(|r| r.arm).collect();
        let picks_b: Vec<_> = rounds_b.iter().map(|r| r.arm).collect();
        assert_eq!(picks_a, picks_b);

        let rewards_a: Vec<_> = rounds_a.iter().map(|r| r.reward).collect();
        let rewards_b: Vec<_> = rounds_b.iter().map(|r| r.reward).collect();
        assert_eq!(rewards_a, rewards_b);
    }

    #[test]
    fn synthetic_sessions_stay_in_sampling_ranges() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let session = synthetic_session(&mut rng);
            assert!((10.0..200.0).contains(&session.duration_s));
            assert!(session.n_commands_total < 30);
            assert!(session.n_unique_commands < 10);
            assert!((1..3).contains(&session.username_tried_count));
        }
    }
}
