//! Redis key-value cache backend.
//!
//! Entries are JSON strings under `vcheck:analysis:{fingerprint}`, written with
//! `SET NX` so the first writer wins. Expiry is delegated to Redis (`EX`).
//! A value that no longer decodes (corrupt or written by an older entry
//! version) counts as absent and is replaced on the next write.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::Script;
use tracing::{debug, info};

use vcheck_models::{AnalysisResult, CacheEntry, VideoFingerprint};

use crate::cache::{AnalysisCache, PutOutcome};
use crate::codec::{decode_entry, encode_entry};
use crate::error::{StorageError, StorageResult};

/// Redis key prefix for analysis entries.
const KEY_PREFIX: &str = "vcheck:analysis";

/// Deletes `KEYS[1]` only while it still holds `ARGV[1]`.
const DELETE_IF_UNCHANGED: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
else
    return 0
end
"#;

/// Redis key for a fingerprint.
pub fn analysis_key(fingerprint: &VideoFingerprint) -> String {
    format!("{}:{}", KEY_PREFIX, fingerprint)
}

/// Redis-backed analysis cache.
#[derive(Clone)]
pub struct RedisCache {
    redis: redis::Client,
    ttl: Option<Duration>,
}

impl RedisCache {
    pub fn new(redis: redis::Client, ttl: Option<Duration>) -> Self {
        Self { redis, ttl }
    }

    pub fn from_url(redis_url: &str, ttl: Option<Duration>) -> StorageResult<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| StorageError::config_error(format!("Invalid REDIS_URL: {}", e)))?;
        Ok(Self::new(client, ttl))
    }

    async fn connection(&self) -> StorageResult<MultiplexedConnection> {
        self.redis
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StorageError::Redis(format!("Redis connection failed: {}", e)))
    }

    /// Decode a stored value, treating outdated or expired entries as absent.
    fn live_entry(&self, json: &str, fingerprint: &VideoFingerprint) -> Option<CacheEntry> {
        decode_entry(json, fingerprint).filter(|entry| !entry.is_expired(self.ttl))
    }

    /// `SET key json NX [EX ttl]`; true when the value was written.
    async fn set_if_absent(
        &self,
        conn: &mut MultiplexedConnection,
        key: &str,
        json: &str,
    ) -> StorageResult<bool> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(json).arg("NX");
        if let Some(ttl) = self.ttl {
            cmd.arg("EX").arg(ttl.as_secs().max(1));
        }
        let reply: Option<String> = cmd.query_async(conn).await?;
        Ok(reply.is_some())
    }
}

#[async_trait]
impl AnalysisCache for RedisCache {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, fingerprint: &VideoFingerprint) -> StorageResult<Option<CacheEntry>> {
        let key = analysis_key(fingerprint);
        let mut conn = self.connection().await?;

        let value: Option<String> = redis::cmd("GET").arg(&key).query_async(&mut conn).await?;

        Ok(value.and_then(|json| self.live_entry(&json, fingerprint)))
    }

    async fn put_if_absent(
        &self,
        fingerprint: &VideoFingerprint,
        result: &AnalysisResult,
    ) -> StorageResult<PutOutcome> {
        let key = analysis_key(fingerprint);
        let json = encode_entry(&CacheEntry::new(fingerprint.clone(), result.clone()))?;
        let mut conn = self.connection().await?;

        if self.set_if_absent(&mut conn, &key, &json).await? {
            debug!(key = %key, "Redis cache stored");
            return Ok(PutOutcome::stored());
        }

        // The key exists. Replace it only if it holds a dead entry.
        let existing: Option<String> = redis::cmd("GET").arg(&key).query_async(&mut conn).await?;
        if let Some(stale) = existing {
            if self.live_entry(&stale, fingerprint).is_some() {
                debug!(key = %key, "Redis cache entry already present");
                return Ok(PutOutcome::already_present());
            }
            let removed: i64 = Script::new(DELETE_IF_UNCHANGED)
                .key(&key)
                .arg(&stale)
                .invoke_async(&mut conn)
                .await?;
            info!(key = %key, removed = removed > 0, "Replacing dead Redis cache entry");
        }

        let stored = self.set_if_absent(&mut conn, &key, &json).await?;
        debug!(key = %key, stored = stored, "Redis cache write");
        Ok(PutOutcome { stored })
    }

    async fn expire(&self, fingerprint: &VideoFingerprint) -> StorageResult<bool> {
        let mut conn = self.connection().await?;
        let removed: i64 = redis::cmd("DEL")
            .arg(analysis_key(fingerprint))
            .query_async(&mut conn)
            .await?;
        Ok(removed > 0)
    }

    async fn ping(&self) -> StorageResult<()> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
