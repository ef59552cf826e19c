//! Score validation.
//!
//! The only place oracle output is altered. Every [`AnalysisResult`] leaving
//! [`validate_verdict`] has each axis in `[0, 20]` and `total_score` equal to
//! the sum of the axes; disagreements with the oracle's own numbers are
//! corrected and recorded in `notes`.

use vcheck_models::{AnalysisResult, CriteriaScores, PlatformTips, MAX_CRITERION_SCORE};
use vcheck_oracle::{RawPlatformTips, RawVerdict};

/// Maximum items kept per text list.
pub const MAX_LIST_ITEMS: usize = 10;

/// Wire names of the axes, in `CriteriaScores::values` order.
const AXIS_NAMES: [&str; 5] = [
    "hook_impacto",
    "qualidade_visual",
    "clareza_mensagem",
    "legibilidade_texto_legenda",
    "potencial_engajamento",
];

/// Validator output.
#[derive(Debug, Clone, PartialEq)]
pub struct Validation {
    pub result: AnalysisResult,
    /// The oracle reported a total different from the recomputed sum
    pub drift: bool,
    /// Number of axes that had to be clamped into range
    pub clamped_axes: usize,
}

/// Normalize a raw verdict into a consistent result.
pub fn validate_verdict(raw: &RawVerdict) -> Validation {
    let mut notes = Vec::new();
    let mut axes = [0u8; 5];
    let mut clamped_axes = 0;

    for (i, value) in raw.criteria.values().into_iter().enumerate() {
        let (score, clamped) = clamp_axis(value);
        if clamped {
            clamped_axes += 1;
            notes.push(format!(
                "{} reported as {}, clamped to {}",
                AXIS_NAMES[i],
                format_score(value),
                score
            ));
        }
        axes[i] = score;
    }

    let criteria = CriteriaScores {
        hook_impact: axes[0],
        visual_quality: axes[1],
        message_clarity: axes[2],
        caption_legibility: axes[3],
        engagement_potential: axes[4],
    };
    let total_score = criteria.sum();

    let drift = match raw.reported_total {
        Some(reported) if reported != f64::from(total_score) => {
            notes.push(format!(
                "score_viralizacao reported as {}, corrected to {} (sum of criteria)",
                format_score(reported),
                total_score
            ));
            true
        }
        _ => false,
    };

    let result = AnalysisResult {
        criteria,
        total_score,
        summary: raw.summary.trim().to_string(),
        strengths: clean_list(&raw.strengths),
        weaknesses: clean_list(&raw.weaknesses),
        improvements: clean_list(&raw.improvements),
        hooks: clean_list(&raw.hooks),
        captions: clean_list(&raw.captions),
        hashtags: clean_hashtags(&raw.hashtags),
        platform_tips: clean_tips(&raw.platform_tips),
        notes,
    };
    debug_assert!(result.is_consistent());

    Validation {
        result,
        drift,
        clamped_axes,
    }
}

/// Round half away from zero, then clamp into `[0, 20]`.
fn clamp_axis(value: f64) -> (u8, bool) {
    let max = f64::from(MAX_CRITERION_SCORE);
    if !value.is_finite() {
        return (0, true);
    }
    let rounded = value.round();
    let clamped = rounded.clamp(0.0, max);
    (clamped as u8, clamped != rounded)
}

fn format_score(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

fn clean_list(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .take(MAX_LIST_ITEMS)
        .map(str::to_string)
        .collect()
}

fn clean_hashtags(items: &[String]) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for item in items {
        let tag = item.trim().trim_start_matches('#').trim();
        if tag.is_empty() {
            continue;
        }
        let tag = format!("#{}", tag.replace(char::is_whitespace, ""));
        if !tags.iter().any(|t| t.eq_ignore_ascii_case(&tag)) {
            tags.push(tag);
        }
        if tags.len() == MAX_LIST_ITEMS {
            break;
        }
    }
    tags
}

fn clean_tips(tips: &RawPlatformTips) -> PlatformTips {
    PlatformTips {
        tiktok: clean_list(&tips.tiktok),
        instagram: clean_list(&tips.instagram),
        youtube_shorts: clean_list(&tips.youtube_shorts),
        kwai: clean_list(&tips.kwai),
    }
}
