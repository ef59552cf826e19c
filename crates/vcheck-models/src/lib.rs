//! Shared data models for the vcheck scoring service.
//!
//! This crate provides Serde-serializable types for:
//! - Video fingerprints (cache keys)
//! - Sampled frames and their encoded images
//! - Analysis requests sent to the scoring oracle
//! - Criteria scores and validated analysis results
//! - Cache entries and HTTP wire schemas

pub mod api;
pub mod cache;
pub mod error;
pub mod fingerprint;
pub mod frame;
pub mod platform;
pub mod request;
pub mod score;

// Re-export common types
pub use api::{AnalyzeRequest, AnalyzeResponse};
pub use cache::{CacheEntry, CACHE_ENTRY_VERSION};
pub use error::{ModelError, ModelResult};
pub use fingerprint::VideoFingerprint;
pub use frame::{EncodedImage, FrameSample, MAX_FRAME_COUNT};
pub use platform::Platform;
pub use request::{AnalysisRequest, VideoMeta};
pub use score::{
    analysis_result_schema, AnalysisResult, CriteriaScores, PlatformTips, CRITERIA_COUNT,
    MAX_CRITERION_SCORE, MAX_TOTAL_SCORE,
};
