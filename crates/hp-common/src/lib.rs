//! Honeypilot common types.
//!
//! This crate provides the foundational types shared across hp-core modules:
//! - Session behavior records consumed by the decision loop
//! - Deception profile definitions read by the actuator
//! - The decision-log line format parsed by downstream analysis tooling
//! - Round identity for log correlation

pub mod decision_log;
pub mod id;
pub mod profile;
pub mod session;

pub use decision_log::{DecisionLogEntry, APPLIED_MARKER};
pub use id::RoundId;
pub use profile::ProfileDefinition;
pub use session::SessionRecord;
