//! Target publishing platform.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Platform the video is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// No specific platform
    #[default]
    #[serde(alias = "todas")]
    All,
    Tiktok,
    Instagram,
    YoutubeShorts,
    Kwai,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Tiktok => "tiktok",
            Self::Instagram => "instagram",
            Self::YoutubeShorts => "youtube_shorts",
            Self::Kwai => "kwai",
        }
    }

    /// Human-readable name used in oracle prompts.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::All => "all short-form platforms",
            Self::Tiktok => "TikTok",
            Self::Instagram => "Instagram Reels",
            Self::YoutubeShorts => "YouTube Shorts",
            Self::Kwai => "Kwai",
        }
    }

    /// Parse a query-string value. Unknown values are `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" | "todas" | "" => Some(Self::All),
            "tiktok" => Some(Self::Tiktok),
            "instagram" => Some(Self::Instagram),
            "youtube_shorts" | "youtube" | "shorts" => Some(Self::YoutubeShorts),
            "kwai" => Some(Self::Kwai),
            _ => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
