//! Video analysis pipeline.
//!
//! This crate provides:
//! - The orchestrator state machine (fingerprint, cache, sample, score, validate)
//! - The score validator, the only place oracle output is altered
//! - Pipeline configuration, request logging and metrics
//! - An optional in-process single-flight guard

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod single_flight;
pub mod validator;

pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use logging::RequestLogger;
pub use orchestrator::{AnalysisOutcome, AnalysisState, Orchestrator, Submission, VideoInput};
pub use single_flight::SingleFlight;
pub use validator::{validate_verdict, Validation, MAX_LIST_ITEMS};
