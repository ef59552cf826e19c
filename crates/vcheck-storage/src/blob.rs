//! R2 blob cache backend.
//!
//! Entries are gzip-compressed JSON objects at
//! `analysis/{fp[0..2]}/{fp}.json.gz`. Writes use a conditional PUT so
//! concurrent writers cannot overwrite each other. Blob storage has no
//! native expiry here, so the TTL is checked against `created_at` on read.
//! A dead object (expired, corrupt or outdated) is replaced with an
//! `If-Match` PUT on its ETag, so only one writer can replace it.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use vcheck_models::{AnalysisResult, CacheEntry, VideoFingerprint};

use crate::cache::{AnalysisCache, PutOutcome};
use crate::client::{ConditionalPut, R2Client};
use crate::codec::{compress_entry, decompress_entry, CONTENT_TYPE_GZIP};
use crate::error::{StorageError, StorageResult};

/// Generate the R2 key for an analysis entry.
///
/// Format: `analysis/{first two hex chars}/{fingerprint}.json.gz`
pub fn blob_key(fingerprint: &VideoFingerprint) -> String {
    let fp = fingerprint.as_str();
    format!("analysis/{}/{}.json.gz", &fp[..2], fp)
}

/// R2-backed analysis cache.
#[derive(Clone)]
pub struct BlobCache {
    r2: R2Client,
    ttl: Option<Duration>,
}

impl BlobCache {
    pub fn new(r2: R2Client, ttl: Option<Duration>) -> Self {
        Self { r2, ttl }
    }
}

/// Decode a stored blob, treating corrupt, outdated or expired entries as absent.
fn live_entry(
    data: &[u8],
    fingerprint: &VideoFingerprint,
    ttl: Option<Duration>,
) -> Option<CacheEntry> {
    let entry = decompress_entry(data, fingerprint);
    if entry.is_none() {
        debug!(fingerprint = %fingerprint.short(), "Blob cache entry corrupt or outdated");
    }
    entry.filter(|entry| !entry.is_expired(ttl))
}

#[async_trait]
impl AnalysisCache for BlobCache {
    fn backend_name(&self) -> &'static str {
        "r2"
    }

    async fn get(&self, fingerprint: &VideoFingerprint) -> StorageResult<Option<CacheEntry>> {
        let key = blob_key(fingerprint);
        Ok(self
            .r2
            .download_bytes(&key)
            .await?
            .and_then(|data| live_entry(&data, fingerprint, self.ttl)))
    }

    async fn put_if_absent(
        &self,
        fingerprint: &VideoFingerprint,
        result: &AnalysisResult,
    ) -> StorageResult<PutOutcome> {
        let key = blob_key(fingerprint);
        let compressed = compress_entry(&CacheEntry::new(fingerprint.clone(), result.clone()))?;
        let compressed_size = compressed.len();

        if self
            .r2
            .upload_bytes_if_absent(compressed.clone(), &key, CONTENT_TYPE_GZIP)
            .await?
            == ConditionalPut::Created
        {
            info!(key = %key, compressed_size = compressed_size, "Blob cache stored");
            return Ok(PutOutcome::stored());
        }

        // An object exists. Replace it only if it is dead.
        let outcome = match self.r2.download_object(&key).await? {
            None => {
                self.r2
                    .upload_bytes_if_absent(compressed, &key, CONTENT_TYPE_GZIP)
                    .await?
            }
            Some(existing) => {
                if live_entry(&existing.data, fingerprint, self.ttl).is_some() {
                    debug!(key = %key, "Blob cache entry already present");
                    return Ok(PutOutcome::already_present());
                }
                let etag = existing.etag.ok_or_else(|| {
                    StorageError::upload_failed(format!("{} has no ETag to replace against", key))
                })?;
                info!(key = %key, "Replacing dead blob cache entry");
                self.r2
                    .replace_bytes_if_match(compressed, &key, CONTENT_TYPE_GZIP, &etag)
                    .await?
            }
        };

        Ok(PutOutcome {
            stored: outcome == ConditionalPut::Created,
        })
    }

    async fn expire(&self, fingerprint: &VideoFingerprint) -> StorageResult<bool> {
        let key = blob_key(fingerprint);
        let existed = self.r2.download_bytes(&key).await?.is_some();
        if existed {
            self.r2.delete_object(&key).await?;
        }
        Ok(existed)
    }

    async fn ping(&self) -> StorageResult<()> {
        self.r2.check_connectivity().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use vcheck_models::{CriteriaScores, PlatformTips};

    fn result(summary: &str) -> AnalysisResult {
        AnalysisResult {
            criteria: CriteriaScores::default(),
            total_score: 0,
            summary: summary.to_string(),
            strengths: vec![],
            weaknesses: vec![],
            improvements: vec![],
            hooks: vec![],
            captions: vec![],
            hashtags: vec![],
            platform_tips: PlatformTips::default(),
            notes: vec![],
        }
    }

    fn stale_blob(fingerprint: &VideoFingerprint) -> Vec<u8> {
        let mut entry = CacheEntry::new(fingerprint.clone(), result("stale"));
        entry.created_at = Utc::now() - chrono::Duration::seconds(120);
        compress_entry(&entry).unwrap()
    }

    #[test]
    fn test_blob_key() {
        let fp = VideoFingerprint::from_digest(&[0x9c; 32]);
        let key = blob_key(&fp);
        assert!(key.starts_with("analysis/9c/9c9c"));
        assert!(key.ends_with(".json.gz"));
        assert_eq!(key.len(), "analysis/9c/".len() + 64 + ".json.gz".len());
    }

    #[test]
    fn test_live_entry() {
        let fp = VideoFingerprint::from_digest(&[0x2e; 32]);
        let ttl = Some(Duration::from_secs(60));

        let fresh = compress_entry(&CacheEntry::new(fp.clone(), result("fresh"))).unwrap();
        assert_eq!(live_entry(&fresh, &fp, ttl).unwrap().result.summary, "fresh");

        assert!(live_entry(&stale_blob(&fp), &fp, ttl).is_none());
        assert!(live_entry(&stale_blob(&fp), &fp, None).is_some());
        assert!(live_entry(b"not gzip", &fp, ttl).is_none());
    }

    async fn r2_cache(ttl: Option<Duration>) -> (BlobCache, R2Client) {
        let r2 = R2Client::from_env().await.unwrap();
        (BlobCache::new(r2.clone(), ttl), r2)
    }

    #[tokio::test]
    #[ignore = "requires R2"]
    async fn test_first_writer_wins() {
        let (cache, _) = r2_cache(None).await;
        let fp = VideoFingerprint::from_digest(&[0x71; 32]);
        let _ = cache.expire(&fp).await;

        assert!(cache.put_if_absent(&fp, &result("first")).await.unwrap().stored);
        assert!(!cache.put_if_absent(&fp, &result("second")).await.unwrap().stored);
        assert_eq!(cache.get(&fp).await.unwrap().unwrap().result.summary, "first");
        assert!(cache.expire(&fp).await.unwrap());
    }

    #[tokio::test]
    #[ignore = "requires R2"]
    async fn test_dead_entries_are_replaced() {
        let (cache, r2) = r2_cache(Some(Duration::from_secs(60))).await;
        let fp = VideoFingerprint::from_digest(&[0x72; 32]);
        let key = blob_key(&fp);

        for dead in [stale_blob(&fp), b"not gzip".to_vec()] {
            let _ = cache.expire(&fp).await;
            r2.upload_bytes_if_absent(dead, &key, CONTENT_TYPE_GZIP)
                .await
                .unwrap();
            assert!(cache.get(&fp).await.unwrap().is_none());

            assert!(cache.put_if_absent(&fp, &result("fresh")).await.unwrap().stored);
            assert!(!cache.put_if_absent(&fp, &result("late")).await.unwrap().stored);
            assert_eq!(cache.get(&fp).await.unwrap().unwrap().result.summary, "fresh");
        }
        assert!(cache.expire(&fp).await.unwrap());
    }
}
