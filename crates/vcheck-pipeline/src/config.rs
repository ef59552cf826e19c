//! Pipeline configuration.

use tracing::warn;

use vcheck_media::{FingerprintConfig, SamplerConfig};
use vcheck_storage::CacheFailurePolicy;

/// Orchestrator configuration.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub sampler: SamplerConfig,
    pub fingerprint: FingerprintConfig,
    /// What a cache backend failure does to a request
    pub failure_policy: CacheFailurePolicy,
    /// Collapse concurrent misses for the same fingerprint into one computation
    pub single_flight: bool,
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let failure_policy = match std::env::var("CACHE_FAILURE_POLICY") {
            Ok(value) => value.parse().unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to soft cache failure policy");
                CacheFailurePolicy::Soft
            }),
            Err(_) => CacheFailurePolicy::default(),
        };

        Self {
            sampler: SamplerConfig::from_env(),
            fingerprint: FingerprintConfig::from_env(),
            failure_policy,
            single_flight: std::env::var("SINGLE_FLIGHT")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        }
    }

    pub fn with_failure_policy(mut self, policy: CacheFailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.single_flight = enabled;
        self
    }
}
