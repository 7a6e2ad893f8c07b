//! Actuator integration tests: idempotence, backups, atomic replacement,
//! decoy lifecycle, and best-effort partial application.

use hp_common::decision_log::DecisionLogEntry;
use hp_core::actuator::{Actuator, ArtifactStatus};
use hp_core::config::Settings;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn settings_for(root: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.paths.deception_root = root.to_path_buf();
    settings
}

fn write_profile(settings: &Settings, name: &str, body: &str) {
    let dir = settings.paths.profiles_dir();
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(format!("profile_{}.json", name)), body).unwrap();
}

fn backups_of(settings: &Settings, artifact: &str) -> Vec<String> {
    let dir = settings.paths.backup_dir();
    if !dir.exists() {
        return Vec::new();
    }
    let mut names: Vec<String> = fs::read_dir(&dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with(&format!("{}.", artifact)) && n.ends_with(".bak"))
        .collect();
    names.sort();
    names
}

fn decision_entries(settings: &Settings) -> Vec<DecisionLogEntry> {
    fs::read_to_string(settings.paths.decision_log())
        .unwrap_or_default()
        .lines()
        .filter_map(DecisionLogEntry::parse)
        .collect()
}

#[test]
fn first_apply_creates_without_backup_second_backs_up() {
    let dir = TempDir::new().unwrap();
    let settings = settings_for(dir.path());
    write_profile(
        &settings,
        "convincing",
        r#"{"banner": "Ubuntu 18.04.2 LTS"}"#,
    );
    let actuator = Actuator::new(settings.paths.clone());

    // The banner file does not exist yet: created, no backup record.
    let report = actuator.apply("convincing").unwrap();
    assert_eq!(report.failed_count(), 0);
    assert!(matches!(
        report.outcomes[0].status,
        ArtifactStatus::Created
    ));
    assert!(backups_of(&settings, "banner.txt").is_empty());
    assert_eq!(
        fs::read_to_string(settings.paths.banner_path()).unwrap(),
        "Ubuntu 18.04.2 LTS\n"
    );

    // Second application backs up the version just written.
    thread::sleep(Duration::from_millis(5));
    let report = actuator.apply("convincing").unwrap();
    assert!(matches!(
        report.outcomes[0].status,
        ArtifactStatus::Replaced { .. }
    ));
    let backups = backups_of(&settings, "banner.txt");
    assert_eq!(backups.len(), 1);
    let backup_content = fs::read_to_string(settings.paths.backup_dir().join(&backups[0])).unwrap();
    assert_eq!(backup_content, "Ubuntu 18.04.2 LTS\n");
}

#[test]
fn reapplying_a_profile_roundtrips_content() {
    let dir = TempDir::new().unwrap();
    let settings = settings_for(dir.path());
    write_profile(
        &settings,
        "vulnerable",
        r#"{
            "banner": "SSH-2.0-OpenSSH_5.1p1 Debian-5",
            "users": ["root:x:123456", "admin:x:admin", "test:x:test"],
            "fake_files": ["passwords.txt"]
        }"#,
    );
    let actuator = Actuator::new(settings.paths.clone());

    actuator.apply("vulnerable").unwrap();
    let banner_first = fs::read_to_string(settings.paths.banner_path()).unwrap();
    let userdb_first = fs::read_to_string(settings.paths.userdb_path()).unwrap();
    assert_eq!(userdb_first, "root:x:123456\nadmin:x:admin\ntest:x:test\n");

    thread::sleep(Duration::from_millis(5));
    actuator.apply("vulnerable").unwrap();
    assert_eq!(
        fs::read_to_string(settings.paths.banner_path()).unwrap(),
        banner_first
    );
    assert_eq!(
        fs::read_to_string(settings.paths.userdb_path()).unwrap(),
        userdb_first
    );

    // A backup preceded each overwrite of each existing artifact.
    assert_eq!(backups_of(&settings, "banner.txt").len(), 1);
    assert_eq!(backups_of(&settings, "userdb.txt").len(), 1);
}

#[test]
fn decoy_files_are_created_once_and_never_overwritten() {
    let dir = TempDir::new().unwrap();
    let settings = settings_for(dir.path());
    write_profile(
        &settings,
        "conservative",
        r#"{"fake_files": ["notes.txt", "backup.tar.gz"]}"#,
    );
    let actuator = Actuator::new(settings.paths.clone());

    let report = actuator.apply("conservative").unwrap();
    assert!(report
        .outcomes
        .iter()
        .all(|o| matches!(o.status, ArtifactStatus::Created)));

    let decoy = settings.paths.honeyfs_home().join("notes.txt");
    let placeholder = fs::read_to_string(&decoy).unwrap();
    assert!(placeholder.contains("placeholder file notes.txt"));
    assert!(placeholder.contains("created by honeypilot at"));

    // Simulate attacker-modified content; a re-apply must leave it alone.
    fs::write(&decoy, "attacker wrote here").unwrap();
    let report = actuator.apply("conservative").unwrap();
    assert!(report
        .outcomes
        .iter()
        .all(|o| matches!(o.status, ArtifactStatus::AlreadyPresent)));
    assert_eq!(fs::read_to_string(&decoy).unwrap(), "attacker wrote here");

    // Creations are not overwrites: no backups involved.
    assert!(backups_of(&settings, "notes.txt").is_empty());
}

#[test]
fn traversal_decoy_names_fail_without_aborting_the_profile() {
    let dir = TempDir::new().unwrap();
    let settings = settings_for(dir.path());
    write_profile(
        &settings,
        "convincing",
        r#"{"banner": "hello", "fake_files": ["../escape.txt", "ok.txt"]}"#,
    );
    let actuator = Actuator::new(settings.paths.clone());

    let report = actuator.apply("convincing").unwrap();
    assert_eq!(report.failed_count(), 1);
    assert!(settings.paths.honeyfs_home().join("ok.txt").exists());
    assert!(!dir.path().join("honeyfs").join("home").join("escape.txt").exists());
}

#[test]
fn one_failing_artifact_does_not_block_the_rest() {
    let dir = TempDir::new().unwrap();
    let settings = settings_for(dir.path());
    write_profile(
        &settings,
        "convincing",
        r#"{"banner": "new banner", "users": ["root:x:toor"]}"#,
    );
    // Occupy the banner path with a directory so its replacement fails.
    fs::create_dir_all(settings.paths.banner_path()).unwrap();
    let actuator = Actuator::new(settings.paths.clone());

    let report = actuator.apply("convincing").unwrap();
    assert!(report.is_partial());
    assert_eq!(report.failed_count(), 1);

    // The credential database was still applied.
    assert_eq!(
        fs::read_to_string(settings.paths.userdb_path()).unwrap(),
        "root:x:toor\n"
    );
    // And the application was still recorded.
    assert_eq!(decision_entries(&settings).len(), 1);
}

#[test]
fn unknown_profile_is_an_error_not_a_report() {
    let dir = TempDir::new().unwrap();
    let settings = settings_for(dir.path());
    let actuator = Actuator::new(settings.paths.clone());
    assert!(actuator.apply("ghost").is_err());
    assert!(decision_entries(&settings).is_empty());
}

#[test]
fn decision_log_line_is_stable_and_parseable() {
    let dir = TempDir::new().unwrap();
    let settings = settings_for(dir.path());
    write_profile(&settings, "vulnerable", r#"{"banner": "b"}"#);
    let actuator = Actuator::new(settings.paths.clone());

    actuator.apply("vulnerable").unwrap();
    let raw = fs::read_to_string(settings.paths.decision_log()).unwrap();
    let line = raw.lines().next().unwrap();
    assert!(line.contains(" INFO profile applied: vulnerable ("));
    assert!(line.ends_with("profile_vulnerable.json)"));

    let entries = decision_entries(&settings);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].profile, "vulnerable");
}

#[test]
fn concurrent_readers_never_observe_partial_content() {
    let dir = TempDir::new().unwrap();
    let settings = settings_for(dir.path());
    let banner_a = "A".repeat(4096);
    let banner_b = "B".repeat(4096);
    write_profile(
        &settings,
        "conservative",
        &format!(r#"{{"banner": "{}"}}"#, banner_a),
    );
    write_profile(
        &settings,
        "vulnerable",
        &format!(r#"{{"banner": "{}"}}"#, banner_b),
    );
    let actuator = Actuator::new(settings.paths.clone());
    actuator.apply("conservative").unwrap();

    let banner_path = settings.paths.banner_path();
    let expected_a = format!("{}\n", banner_a);
    let expected_b = format!("{}\n", banner_b);
    let stop = Arc::new(AtomicBool::new(false));

    let reader = {
        let stop = Arc::clone(&stop);
        let banner_path = banner_path.clone();
        let expected_a = expected_a.clone();
        let expected_b = expected_b.clone();
        thread::spawn(move || {
            let mut torn_reads = 0u32;
            while !stop.load(Ordering::Relaxed) {
                if let Ok(content) = fs::read_to_string(&banner_path) {
                    if content != expected_a && content != expected_b {
                        torn_reads += 1;
                    }
                }
            }
            torn_reads
        })
    };

    for _ in 0..25 {
        actuator.apply("vulnerable").unwrap();
        actuator.apply("conservative").unwrap();
    }
    stop.store(true, Ordering::Relaxed);
    assert_eq!(reader.join().unwrap(), 0);
}
