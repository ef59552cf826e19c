//! Scored verdicts.
//!
//! An [`AnalysisResult`] is only ever produced by the score validator, which
//! guarantees `total_score == criteria.sum()`.

use schemars::schema::RootSchema;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Maximum value of a single criterion.
pub const MAX_CRITERION_SCORE: u8 = 20;
/// Number of criteria axes.
pub const CRITERIA_COUNT: usize = 5;
/// Maximum total score.
pub const MAX_TOTAL_SCORE: u8 = MAX_CRITERION_SCORE * CRITERIA_COUNT as u8;

/// The five bounded scoring axes, each in `[0, 20]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct CriteriaScores {
    #[serde(default)]
    pub hook_impact: u8,
    #[serde(default)]
    pub visual_quality: u8,
    #[serde(default)]
    pub message_clarity: u8,
    #[serde(default)]
    pub caption_legibility: u8,
    #[serde(default)]
    pub engagement_potential: u8,
}

impl CriteriaScores {
    /// Axis values in a fixed order.
    pub fn values(&self) -> [u8; CRITERIA_COUNT] {
        [
            self.hook_impact,
            self.visual_quality,
            self.message_clarity,
            self.caption_legibility,
            self.engagement_potential,
        ]
    }

    pub fn sum(&self) -> u8 {
        self.values().iter().map(|v| u16::from(*v)).sum::<u16>() as u8
    }

    /// True when every axis is within bounds.
    pub fn in_bounds(&self) -> bool {
        self.values().iter().all(|v| *v <= MAX_CRITERION_SCORE)
    }
}

/// Per-platform recommendations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PlatformTips {
    #[serde(default)]
    pub tiktok: Vec<String>,
    #[serde(default)]
    pub instagram: Vec<String>,
    #[serde(default)]
    pub youtube_shorts: Vec<String>,
    #[serde(default)]
    pub kwai: Vec<String>,
}

impl PlatformTips {
    pub fn is_empty(&self) -> bool {
        self.tiktok.is_empty()
            && self.instagram.is_empty()
            && self.youtube_shorts.is_empty()
            && self.kwai.is_empty()
    }
}

/// Validated analysis verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisResult {
    pub criteria: CriteriaScores,

    /// Always the sum of `criteria`
    pub total_score: u8,

    pub summary: String,

    #[serde(default)]
    pub strengths: Vec<String>,

    #[serde(default)]
    pub weaknesses: Vec<String>,

    #[serde(default)]
    pub improvements: Vec<String>,

    /// Suggested opening hooks
    #[serde(default)]
    pub hooks: Vec<String>,

    /// Suggested captions
    #[serde(default)]
    pub captions: Vec<String>,

    #[serde(default)]
    pub hashtags: Vec<String>,

    #[serde(default, skip_serializing_if = "PlatformTips::is_empty")]
    pub platform_tips: PlatformTips,

    /// Corrections applied while validating the oracle output
    #[serde(default)]
    pub notes: Vec<String>,
}

impl AnalysisResult {
    /// Check the total-equals-sum invariant and axis bounds.
    pub fn is_consistent(&self) -> bool {
        self.criteria.in_bounds()
            && self.total_score == self.criteria.sum()
            && self.total_score <= MAX_TOTAL_SCORE
    }
}

/// JSON Schema of [`AnalysisResult`] for API consumers.
pub fn analysis_result_schema() -> RootSchema {
    schemars::schema_for!(AnalysisResult)
}
