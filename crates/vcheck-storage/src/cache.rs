//! Analysis cache contract.
//!
//! Entries are keyed by video fingerprint, written at most once and never
//! mutated. An expired entry is indistinguishable from an absent one.

use async_trait::async_trait;

use vcheck_models::{AnalysisResult, CacheEntry, VideoFingerprint};

use crate::error::StorageResult;

/// Result of a `put_if_absent` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PutOutcome {
    /// False when another writer got there first
    pub stored: bool,
}

impl PutOutcome {
    pub fn stored() -> Self {
        Self { stored: true }
    }

    pub fn already_present() -> Self {
        Self { stored: false }
    }
}

/// Content-addressed store of validated analysis results.
#[async_trait]
pub trait AnalysisCache: Send + Sync {
    /// Short backend name for logs and metrics labels.
    fn backend_name(&self) -> &'static str;

    async fn get(&self, fingerprint: &VideoFingerprint) -> StorageResult<Option<CacheEntry>>;

    /// Store `result` unless a live entry already exists for `fingerprint`.
    async fn put_if_absent(
        &self,
        fingerprint: &VideoFingerprint,
        result: &AnalysisResult,
    ) -> StorageResult<PutOutcome>;

    /// Remove an entry. Returns whether one was present.
    async fn expire(&self, fingerprint: &VideoFingerprint) -> StorageResult<bool>;

    /// Check that the backend is reachable.
    async fn ping(&self) -> StorageResult<()> {
        Ok(())
    }
}
