//! In-process cache backend.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use vcheck_models::{AnalysisResult, CacheEntry, VideoFingerprint};

use crate::cache::{AnalysisCache, PutOutcome};
use crate::error::StorageResult;

/// Map-backed cache living as long as the process.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<VideoFingerprint, CacheEntry>>,
    ttl: Option<Duration>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Option<Duration>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    #[cfg(test)]
    async fn insert_entry(&self, entry: CacheEntry) {
        self.entries
            .write()
            .await
            .insert(entry.fingerprint.clone(), entry);
    }
}

#[async_trait]
impl AnalysisCache for MemoryCache {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, fingerprint: &VideoFingerprint) -> StorageResult<Option<CacheEntry>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(fingerprint)
            .filter(|entry| !entry.is_expired(self.ttl))
            .cloned())
    }

    async fn put_if_absent(
        &self,
        fingerprint: &VideoFingerprint,
        result: &AnalysisResult,
    ) -> StorageResult<PutOutcome> {
        let mut entries = self.entries.write().await;
        let now = Utc::now();

        if self.ttl.is_some() {
            let before = entries.len();
            entries.retain(|_, entry| !entry.is_expired_at(self.ttl, now));
            let pruned = before - entries.len();
            if pruned > 0 {
                debug!(pruned = pruned, "Pruned expired memory cache entries");
            }
        }

        if entries.contains_key(fingerprint) {
            debug!(fingerprint = %fingerprint.short(), "Memory cache entry already present");
            return Ok(PutOutcome::already_present());
        }

        entries.insert(
            fingerprint.clone(),
            CacheEntry::new(fingerprint.clone(), result.clone()),
        );
        Ok(PutOutcome::stored())
    }

    async fn expire(&self, fingerprint: &VideoFingerprint) -> StorageResult<bool> {
        Ok(self.entries.write().await.remove(fingerprint).is_some())
    }
}
