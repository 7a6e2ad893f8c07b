//! Structured logging foundation for hp-core.
//!
//! Provides dual-mode logging:
//! - Human-readable console output for interactive use
//! - Machine-parseable JSONL for supervised/agent workflows
//!
//! All log output goes to stderr; stdout is reserved for command payloads.
//! The append-only decision log is a separate artifact with its own stable
//! format (see `hp_common::decision_log`) and is never routed through
//! `tracing`.
//!
//! Respects the environment variables `HP_LOG` and `RUST_LOG`.

use serde::{Deserialize, Serialize};
use std::io::IsTerminal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable for the log filter (takes precedence over RUST_LOG).
pub const LOG_ENV: &str = "HP_LOG";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable console format (default).
    #[default]
    Human,
    /// Machine-parseable JSON lines.
    Jsonl,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" | "console" | "pretty" => Ok(LogFormat::Human),
            "jsonl" | "json" | "structured" | "machine" => Ok(LogFormat::Jsonl),
            _ => Err(format!("unknown log format: {}", s)),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Human => write!(f, "human"),
            LogFormat::Jsonl => write!(f, "jsonl"),
        }
    }
}

/// Logging configuration derived from CLI flags and the environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogConfig {
    /// Output format.
    pub format: LogFormat,
    /// Verbosity bumps from `-v` occurrences.
    pub verbose: u8,
    /// Quiet mode (warnings and errors only).
    pub quiet: bool,
}

impl LogConfig {
    /// Default level directive for the filter, before env overrides.
    fn default_directive(&self) -> &'static str {
        if self.quiet {
            "hp_core=warn"
        } else {
            match self.verbose {
                0 => "hp_core=info",
                1 => "hp_core=debug",
                _ => "hp_core=trace",
            }
        }
    }
}

/// Initialize the logging subsystem.
///
/// Must be called once at startup before any logging occurs. Later calls
/// are ignored (useful under test harnesses that share a process).
pub fn init_logging(config: &LogConfig) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(config.default_directive()));

    match config.format {
        LogFormat::Human => {
            let use_ansi = std::io::stderr().is_terminal();
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(use_ansi);
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init();
        }
        LogFormat::Jsonl => {
            let fmt_layer = fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_current_span(false)
                .with_span_list(false);
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init();
        }
    }
}
