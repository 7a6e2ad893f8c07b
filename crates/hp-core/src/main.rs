//! Honeypilot Core - Adaptive Deception Controller
//!
//! The main entry point for hp-core, handling:
//! - The live decision loop over session-closed events
//! - Bounded simulation runs over synthetic sessions
//! - One-shot profile application (the isolated actuator surface)
//! - Configuration and profile catalog validation

use clap::{Args, Parser, Subcommand};
use hp_core::actuator::{Actuator, ActuatorError};
use hp_core::config::{ConfigError, ResolvedSettings, Settings};
use hp_core::control::{ControlError, Controller};
use hp_core::exit_codes::ExitCode;
use hp_core::logging::{init_logging, LogConfig, LogFormat};
use hp_core::profiles::load_profile;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use tracing::{error, info};

/// Honeypilot Core - adaptive deception-profile controller
#[derive(Parser)]
#[command(name = "hp-core")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Path to the settings file
    #[arg(long, global = true, env = "HP_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Warnings and errors only
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log output format
    #[arg(long, global = true, default_value_t = LogFormat::Human)]
    log_format: LogFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the live decision loop over a session-closed event stream
    Run(RunArgs),

    /// Run a bounded number of decision rounds over synthetic sessions
    Simulate(SimulateArgs),

    /// Apply a deception profile to the managed environment
    Apply(ApplyArgs),

    /// Validate configuration and the profile catalog
    Check,

    /// Print version information
    Version,
}

#[derive(Args)]
struct RunArgs {
    /// JSONL session record stream (defaults to stdin)
    #[arg(long)]
    input: Option<PathBuf>,
}

#[derive(Args)]
struct SimulateArgs {
    /// Number of rounds to simulate
    #[arg(long, default_value_t = 10)]
    rounds: u32,

    /// RNG seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args)]
struct ApplyArgs {
    /// Profile name to apply
    profile: String,
}

fn main() {
    let cli = Cli::parse();
    init_logging(&LogConfig {
        format: cli.global.log_format,
        verbose: cli.global.verbose,
        quiet: cli.global.quiet,
    });
    std::process::exit(run(cli).as_i32());
}

fn run(cli: Cli) -> ExitCode {
    let resolved = match ResolvedSettings::resolve(cli.global.config.as_deref()) {
        Ok(resolved) => resolved,
        Err(err) => {
            error!(error = %err, "failed to load settings");
            return config_exit_code(&err);
        }
    };
    if let Some(path) = &resolved.path {
        info!(
            path = %path.display(),
            sha256 = resolved.sha256.as_deref().unwrap_or(""),
            "settings loaded",
        );
    }

    match cli.command {
        Commands::Run(args) => cmd_run(&resolved, args),
        Commands::Simulate(args) => cmd_simulate(&resolved, args),
        Commands::Apply(args) => cmd_apply(&resolved.settings, &args.profile),
        Commands::Check => cmd_check(&resolved.settings),
        Commands::Version => {
            println!("hp-core {}", env!("CARGO_PKG_VERSION"));
            ExitCode::Clean
        }
    }
}

fn cmd_run(resolved: &ResolvedSettings, args: RunArgs) -> ExitCode {
    let mut controller = match Controller::new(&resolved.settings, resolved.path.clone()) {
        Ok(controller) => controller,
        Err(err) => {
            error!(error = %err, "failed to initialize policy");
            return ExitCode::InternalError;
        }
    };

    let result = match &args.input {
        Some(path) => match File::open(path) {
            Ok(file) => controller.run_live(BufReader::new(file)),
            Err(err) => {
                error!(path = %path.display(), error = %err, "cannot open session stream");
                return ExitCode::IoError;
            }
        },
        None => controller.run_live(std::io::stdin().lock()),
    };

    match result {
        Ok(summary) => {
            println!(
                "processed {} sessions ({} malformed records skipped)",
                summary.rounds, summary.skipped
            );
            ExitCode::Clean
        }
        Err(err) => control_exit_code(err),
    }
}

fn cmd_simulate(resolved: &ResolvedSettings, args: SimulateArgs) -> ExitCode {
    let mut controller = match Controller::new(&resolved.settings, resolved.path.clone()) {
        Ok(controller) => controller,
        Err(err) => {
            error!(error = %err, "failed to initialize policy");
            return ExitCode::InternalError;
        }
    };

    match controller.run_simulation(args.rounds, args.seed) {
        Ok(rounds) => {
            let applied = rounds
                .iter()
                .filter(|r| !matches!(r.apply, hp_core::control::ApplyOutcome::Failed { .. }))
                .count();
            println!(
                "simulated {} rounds ({} profile applications succeeded)",
                rounds.len(),
                applied
            );
            ExitCode::Clean
        }
        Err(err) => control_exit_code(err),
    }
}

fn cmd_apply(settings: &Settings, profile: &str) -> ExitCode {
    let actuator = Actuator::new(settings.paths.clone());
    match actuator.apply(profile) {
        Ok(report) => {
            let applied = report.outcomes.len() - report.failed_count();
            println!(
                "applied profile '{}' ({} artifacts ok, {} failed)",
                report.profile,
                applied,
                report.failed_count()
            );
            if report.is_partial() {
                ExitCode::PartialApply
            } else {
                ExitCode::Clean
            }
        }
        Err(ActuatorError::Profile(err)) => {
            error!(error = %err, "cannot apply profile");
            ExitCode::ProfileError
        }
        Err(err) => {
            error!(error = %err, "cannot apply profile");
            ExitCode::IoError
        }
    }
}

fn cmd_check(settings: &Settings) -> ExitCode {
    let profiles_dir = settings.paths.profiles_dir();
    let mut failures = 0usize;
    for name in &settings.catalog {
        match load_profile(&profiles_dir, name) {
            Ok(profile) => {
                println!(
                    "profile '{}': ok ({} users, {} decoy files)",
                    name,
                    profile.definition.users.len(),
                    profile.definition.fake_files.len()
                );
            }
            Err(err) => {
                failures += 1;
                println!("profile '{}': {}", name, err);
            }
        }
    }
    if failures == 0 {
        println!("configuration ok ({} profiles)", settings.catalog.len());
        ExitCode::Clean
    } else {
        println!("{} of {} profiles failed validation", failures, settings.catalog.len());
        ExitCode::ProfileError
    }
}

fn config_exit_code(err: &ConfigError) -> ExitCode {
    match err {
        ConfigError::Io { .. } => ExitCode::IoError,
        _ => ExitCode::ConfigError,
    }
}

fn control_exit_code(err: ControlError) -> ExitCode {
    match err {
        ControlError::Policy(err) => {
            error!(error = %err, "policy invariant violated");
            ExitCode::InternalError
        }
        ControlError::Stream(err) => {
            error!(error = %err, "session stream failed");
            ExitCode::IoError
        }
    }
}
