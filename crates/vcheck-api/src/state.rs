//! Application state.

use std::sync::Arc;

use tracing::{info, warn};

use vcheck_media::FfmpegDecoderFactory;
use vcheck_oracle::GeminiOracle;
use vcheck_pipeline::{Orchestrator, PipelineConfig};
use vcheck_storage::{AnalysisCache, CacheBackend, CacheConfig};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(config: ApiConfig, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            config,
            orchestrator,
        }
    }

    /// Build the cache backend, oracle and decoder from the environment.
    pub async fn from_env(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let cache_config = CacheConfig::from_env()?;
        let cache = CacheBackend::from_config(&cache_config).await?;
        let oracle = GeminiOracle::from_env()?;

        // Only raw video uploads need ffmpeg
        if let Err(e) = FfmpegDecoderFactory::check_available() {
            warn!(error = %e, "FFmpeg unavailable, /api/analyze-video will fail");
        }

        let pipeline_config =
            PipelineConfig::from_env().with_failure_policy(cache_config.failure_policy);
        info!(
            backend = cache.backend_name(),
            model = %oracle.model(),
            failure_policy = ?pipeline_config.failure_policy,
            single_flight = pipeline_config.single_flight,
            "Pipeline configured"
        );

        let orchestrator = Orchestrator::new(
            Arc::new(cache),
            Arc::new(oracle),
            Arc::new(FfmpegDecoderFactory::new()),
            pipeline_config,
        );

        Ok(Self::new(config, Arc::new(orchestrator)))
    }
}
