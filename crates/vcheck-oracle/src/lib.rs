//! Scoring oracle client.
//!
//! This crate provides:
//! - The `ScoringOracle` contract
//! - A Gemini implementation with schema-constrained JSON output
//! - Raw (unvalidated) verdict types

pub mod error;
pub mod gemini;
pub mod oracle;
pub mod prompt;
pub mod types;

pub use error::{truncate_diagnostic, OracleError, OracleResult, MAX_DIAGNOSTIC_LEN};
pub use gemini::{GeminiConfig, GeminiOracle};
pub use oracle::ScoringOracle;
pub use types::{RawCriteria, RawPlatformTips, RawVerdict};
