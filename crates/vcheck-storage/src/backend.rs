//! Cache backend selection.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use vcheck_models::{AnalysisResult, CacheEntry, VideoFingerprint};

use crate::blob::BlobCache;
use crate::cache::{AnalysisCache, PutOutcome};
use crate::client::{R2Client, R2Config};
use crate::error::{StorageError, StorageResult};
use crate::kv::RedisCache;
use crate::memory::MemoryCache;

/// Which backend stores analysis entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheBackendKind {
    #[default]
    Memory,
    Redis,
    R2,
}

impl FromStr for CacheBackendKind {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(Self::Memory),
            "redis" | "kv" => Ok(Self::Redis),
            "r2" | "blob" => Ok(Self::R2),
            other => Err(StorageError::config_error(format!(
                "Unknown CACHE_BACKEND '{}' (expected memory, redis or r2)",
                other
            ))),
        }
    }
}

/// How cache failures affect a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheFailurePolicy {
    /// Read errors are misses, write errors are logged
    #[default]
    Soft,
    /// Any cache error fails the request
    Hard,
}

impl FromStr for CacheFailurePolicy {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "soft" => Ok(Self::Soft),
            "hard" => Ok(Self::Hard),
            other => Err(StorageError::config_error(format!(
                "Unknown CACHE_FAILURE_POLICY '{}' (expected soft or hard)",
                other
            ))),
        }
    }
}

/// Cache configuration.
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    pub backend: CacheBackendKind,
    pub redis_url: Option<String>,
    /// Entry lifetime; `None` keeps entries for the backend's lifetime
    pub ttl: Option<Duration>,
    pub failure_policy: CacheFailurePolicy,
}

impl CacheConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        let backend = match std::env::var("CACHE_BACKEND") {
            Ok(value) => value.parse()?,
            Err(_) => CacheBackendKind::default(),
        };
        let failure_policy = match std::env::var("CACHE_FAILURE_POLICY") {
            Ok(value) => value.parse()?,
            Err(_) => CacheFailurePolicy::default(),
        };
        let ttl = std::env::var("CACHE_TTL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        Ok(Self {
            backend,
            redis_url: std::env::var("REDIS_URL").ok(),
            ttl,
            failure_policy,
        })
    }
}

/// The configured cache backend.
pub enum CacheBackend {
    Memory(MemoryCache),
    KeyValue(RedisCache),
    Blob(BlobCache),
}

impl CacheBackend {
    /// Build the backend selected by `config`.
    pub async fn from_config(config: &CacheConfig) -> StorageResult<Self> {
        let backend = match config.backend {
            CacheBackendKind::Memory => Self::Memory(MemoryCache::with_ttl(config.ttl)),
            CacheBackendKind::Redis => {
                let url = config
                    .redis_url
                    .as_deref()
                    .ok_or_else(|| StorageError::config_error("REDIS_URL not set"))?;
                Self::KeyValue(RedisCache::from_url(url, config.ttl)?)
            }
            CacheBackendKind::R2 => {
                let r2 = R2Client::new(R2Config::from_env()?).await?;
                Self::Blob(BlobCache::new(r2, config.ttl))
            }
        };

        info!(
            backend = backend.backend_name(),
            ttl_secs = config.ttl.map(|t| t.as_secs()),
            failure_policy = ?config.failure_policy,
            "Analysis cache configured"
        );
        Ok(backend)
    }

    fn inner(&self) -> &dyn AnalysisCache {
        match self {
            Self::Memory(cache) => cache,
            Self::KeyValue(cache) => cache,
            Self::Blob(cache) => cache,
        }
    }
}

#[async_trait]
impl AnalysisCache for CacheBackend {
    fn backend_name(&self) -> &'static str {
        self.inner().backend_name()
    }

    async fn get(&self, fingerprint: &VideoFingerprint) -> StorageResult<Option<CacheEntry>> {
        self.inner().get(fingerprint).await
    }

    async fn put_if_absent(
        &self,
        fingerprint: &VideoFingerprint,
        result: &AnalysisResult,
    ) -> StorageResult<PutOutcome> {
        self.inner().put_if_absent(fingerprint, result).await
    }

    async fn expire(&self, fingerprint: &VideoFingerprint) -> StorageResult<bool> {
        self.inner().expire(fingerprint).await
    }

    async fn ping(&self) -> StorageResult<()> {
        self.inner().ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in ["CACHE_BACKEND", "CACHE_FAILURE_POLICY", "CACHE_TTL_SECS", "REDIS_URL"] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!("Redis".parse::<CacheBackendKind>().unwrap(), CacheBackendKind::Redis);
        assert_eq!("blob".parse::<CacheBackendKind>().unwrap(), CacheBackendKind::R2);
        assert!("sqlite".parse::<CacheBackendKind>().is_err());
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();
        let config = CacheConfig::from_env().unwrap();
        assert_eq!(config.backend, CacheBackendKind::Memory);
        assert_eq!(config.failure_policy, CacheFailurePolicy::Soft);
        assert!(config.ttl.is_none());
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        std::env::set_var("CACHE_BACKEND", "redis");
        std::env::set_var("CACHE_FAILURE_POLICY", "hard");
        std::env::set_var("CACHE_TTL_SECS", "3600");
        let config = CacheConfig::from_env().unwrap();
        assert_eq!(config.backend, CacheBackendKind::Redis);
        assert_eq!(config.failure_policy, CacheFailurePolicy::Hard);
        assert_eq!(config.ttl, Some(Duration::from_secs(3600)));
        clear_env();
    }

    #[tokio::test]
    async fn test_redis_backend_requires_url() {
        let config = CacheConfig {
            backend: CacheBackendKind::Redis,
            ..Default::default()
        };
        assert!(matches!(
            CacheBackend::from_config(&config).await,
            Err(StorageError::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_backend_delegates() {
        let backend = CacheBackend::from_config(&CacheConfig::default()).await.unwrap();
        assert_eq!(backend.backend_name(), "memory");
        let fp = VideoFingerprint::from_digest(&[8; 32]);
        assert!(backend.get(&fp).await.unwrap().is_none());
        assert!(backend.ping().await.is_ok());
    }
}
