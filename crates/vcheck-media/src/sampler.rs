//! Frame sampler.
//!
//! Picks a small fixed set of representative timestamps, seeks the decode
//! handle to each one in order and rasterizes a downscaled JPEG per offset.

use std::time::Duration;

use tracing::{debug, instrument, warn};

use vcheck_models::{FrameSample, MAX_FRAME_COUNT};

use crate::decoder::{DecodeCapability, SeekSignal};
use crate::error::{MediaError, MediaResult};
use crate::raster;

/// Fractions of the duration sampled for up to six frames.
pub const BASE_FRACTIONS: [f64; 6] = [0.05, 0.18, 0.35, 0.55, 0.72, 0.90];

/// Duration assumed when the stream does not report a usable one.
const FALLBACK_DURATION: f64 = 1.0;

/// Sampler settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerConfig {
    pub frame_count: usize,
    pub target_width: u32,
    pub jpeg_quality: u8,
    /// Wait for a seek completion signal before rasterizing anyway
    pub seek_timeout: Duration,
    /// Hard bound on a single rasterization
    pub raster_timeout: Duration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            frame_count: BASE_FRACTIONS.len(),
            target_width: 640,
            jpeg_quality: 80,
            seek_timeout: Duration::from_secs(2),
            raster_timeout: Duration::from_secs(10),
        }
    }
}

impl SamplerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            frame_count: env_parse("MAX_FRAME_COUNT")
                .unwrap_or(defaults.frame_count)
                .clamp(1, MAX_FRAME_COUNT),
            target_width: env_parse("FRAME_TARGET_WIDTH").unwrap_or(defaults.target_width),
            jpeg_quality: env_parse::<u8>("FRAME_JPEG_QUALITY")
                .unwrap_or(defaults.jpeg_quality)
                .clamp(1, 100),
            seek_timeout: env_parse("SEEK_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.seek_timeout),
            raster_timeout: env_parse("RASTER_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.raster_timeout),
        }
    }

    pub fn validate(&self) -> MediaResult<()> {
        if self.frame_count == 0 || self.frame_count > MAX_FRAME_COUNT {
            return Err(MediaError::invalid_input(format!(
                "frame_count must be within 1..={}, got {}",
                MAX_FRAME_COUNT, self.frame_count
            )));
        }
        if self.target_width == 0 {
            return Err(MediaError::invalid_input("target_width must be positive"));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(MediaError::invalid_input("jpeg_quality must be within 1..=100"));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

/// Duration used for offset math. Unknown or degenerate durations become 1s.
pub fn effective_duration(duration: Option<f64>) -> f64 {
    match duration {
        Some(d) if d.is_finite() && d > 0.0 => d,
        _ => FALLBACK_DURATION,
    }
}

/// Sampling fractions for `count` frames, strictly increasing in `(0, 1)`.
pub fn sample_fractions(count: usize) -> Vec<f64> {
    if count <= BASE_FRACTIONS.len() {
        BASE_FRACTIONS[..count].to_vec()
    } else {
        (1..=count).map(|i| i as f64 / (count + 1) as f64).collect()
    }
}

/// Timestamps for `count` frames of a `duration`-second stream.
///
/// Each is clamped to `[eps, duration - eps]` with `eps = min(0.2, 0.05 * duration)`,
/// which keeps every offset strictly inside the stream.
pub fn sample_timestamps(duration: Option<f64>, count: usize) -> Vec<f64> {
    let duration = effective_duration(duration);
    let eps = (0.05 * duration).min(0.2);
    sample_fractions(count)
        .into_iter()
        .map(|f| (f * duration).clamp(eps, duration - eps))
        .collect()
}

/// Sequential frame sampler over a decode handle.
#[derive(Debug, Clone, Default)]
pub struct FrameSampler {
    config: SamplerConfig,
}

impl FrameSampler {
    pub fn new(config: SamplerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Sample frames from `decoder`, one offset at a time.
    #[instrument(skip_all, fields(frame_count = self.config.frame_count))]
    pub async fn sample(&self, decoder: &mut dyn DecodeCapability) -> MediaResult<Vec<FrameSample>> {
        self.config.validate()?;

        let info = decoder.stream_info();
        if info.duration.map_or(true, |d| !d.is_finite() || d <= 0.0) {
            warn!(
                duration = ?info.duration,
                "Stream reports no usable duration, sampling as a 1s clip"
            );
        }

        let timestamps = sample_timestamps(info.duration, self.config.frame_count);
        let mut frames = Vec::with_capacity(timestamps.len());

        for timestamp in timestamps {
            self.await_seek(decoder, timestamp).await?;

            let frame = tokio::time::timeout(self.config.raster_timeout, decoder.rasterize())
                .await
                .map_err(|_| MediaError::timeout(self.config.raster_timeout))??;

            let frame = raster::downscale(frame, self.config.target_width);
            let (width, height) = frame.dimensions();
            let image = raster::encode_jpeg(&frame, self.config.jpeg_quality)?;

            debug!(
                timestamp = timestamp,
                width = width,
                height = height,
                bytes = image.len(),
                "Sampled frame"
            );
            frames.push(FrameSample::new(timestamp, image, width, height));
        }

        Ok(frames)
    }

    /// Seek and wait for the completion signal, falling back to rasterizing
    /// the current position when no signal arrives in time.
    async fn await_seek(&self, decoder: &mut dyn DecodeCapability, timestamp: f64) -> MediaResult<()> {
        let signal = decoder.seek(timestamp).await?;

        match tokio::time::timeout(self.config.seek_timeout, signal).await {
            Ok(Ok(SeekSignal::Completed)) => Ok(()),
            Ok(Ok(SeekSignal::Failed(message))) => Err(MediaError::seek_failed(timestamp, message)),
            Ok(Err(_)) => {
                debug!(timestamp = timestamp, "Seek signal dropped, rasterizing current position");
                Ok(())
            }
            Err(_) => {
                debug!(
                    timestamp = timestamp,
                    timeout_ms = self.config.seek_timeout.as_millis() as u64,
                    "Seek signal timed out, rasterizing current position"
                );
                Ok(())
            }
        }
    }
}
