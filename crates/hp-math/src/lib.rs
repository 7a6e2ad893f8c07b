//! Honeypilot math utilities.

pub mod linalg;

pub use linalg::*;
