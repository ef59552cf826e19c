//! HTTP wire schemas for the analyze endpoints.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::fingerprint::VideoFingerprint;
use crate::frame::FrameSample;
use crate::platform::Platform;
use crate::request::VideoMeta;
use crate::score::AnalysisResult;

/// Body of `POST /api/analyze`.
///
/// `frames` defaults to empty so that a missing field is reported as an
/// input problem rather than a deserialization failure.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, JsonSchema)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub platform: Platform,

    #[serde(default)]
    #[validate(length(max = 500))]
    pub hook: Option<String>,

    #[serde(default)]
    #[validate(length(max = 2200))]
    pub description: Option<String>,

    /// Client-computed fingerprint; computed server-side when absent
    #[serde(default)]
    #[validate(length(equal = 64))]
    pub video_hash: Option<String>,

    #[serde(default)]
    pub video_meta: Option<VideoMeta>,

    #[serde(default)]
    #[validate(length(min = 1, max = 8))]
    pub frames: Vec<FrameSample>,
}

/// Successful analyze response.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AnalyzeResponse {
    pub result: AnalysisResult,
    /// True when the result was replayed from the cache
    pub cached: bool,
    pub fingerprint: VideoFingerprint,
}
