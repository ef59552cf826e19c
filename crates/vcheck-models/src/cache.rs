//! Cache entry model.

use std::time::Duration;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::fingerprint::VideoFingerprint;
use crate::score::AnalysisResult;

/// Bump when the stored `AnalysisResult` layout changes; older entries become misses.
pub const CACHE_ENTRY_VERSION: u32 = 1;

/// A stored verdict. Written once per fingerprint and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CacheEntry {
    #[serde(default)]
    pub version: u32,
    pub fingerprint: VideoFingerprint,
    pub result: AnalysisResult,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(fingerprint: VideoFingerprint, result: AnalysisResult) -> Self {
        Self {
            version: CACHE_ENTRY_VERSION,
            fingerprint,
            result,
            created_at: Utc::now(),
        }
    }

    pub fn is_current_version(&self) -> bool {
        self.version == CACHE_ENTRY_VERSION
    }

    /// Whether the entry outlived `ttl` at `now`. No TTL means never.
    pub fn is_expired_at(&self, ttl: Option<Duration>, now: DateTime<Utc>) -> bool {
        match ttl {
            Some(ttl) => match chrono::Duration::from_std(ttl) {
                Ok(ttl) => now - self.created_at >= ttl,
                Err(_) => false,
            },
            None => false,
        }
    }

    pub fn is_expired(&self, ttl: Option<Duration>) -> bool {
        self.is_expired_at(ttl, Utc::now())
    }
}
