//! Analysis orchestrator.
//!
//! Drives one submission through
//! `Received -> Fingerprinted -> CacheChecked -> (Hit | Miss -> Sampling ->
//! OracleCall -> Validating -> CacheWrite) -> Respond`, with `Failed`
//! reachable from every non-terminal state. Failures are never cached.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn, Instrument};

use vcheck_media::{
    fingerprint_file, fingerprint_frames, image_dimensions, DecoderFactory, FrameSampler,
};
use vcheck_models::{
    AnalysisRequest, AnalysisResult, AnalyzeResponse, CacheEntry, FrameSample, ModelError,
    Platform, VideoFingerprint, VideoMeta, MAX_FRAME_COUNT,
};
use vcheck_oracle::{RawVerdict, ScoringOracle};
use vcheck_storage::{AnalysisCache, CacheFailurePolicy, StorageError};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::RequestLogger;
use crate::metrics;
use crate::single_flight::SingleFlight;
use crate::validator::validate_verdict;

/// Orchestrator states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalysisState {
    Received,
    Fingerprinted,
    CacheChecked,
    Hit,
    Miss,
    Sampling,
    OracleCall,
    Validating,
    CacheWrite,
    Respond,
    Failed,
}

impl AnalysisState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisState::Received => "received",
            AnalysisState::Fingerprinted => "fingerprinted",
            AnalysisState::CacheChecked => "cache_checked",
            AnalysisState::Hit => "hit",
            AnalysisState::Miss => "miss",
            AnalysisState::Sampling => "sampling",
            AnalysisState::OracleCall => "oracle_call",
            AnalysisState::Validating => "validating",
            AnalysisState::CacheWrite => "cache_write",
            AnalysisState::Respond => "respond",
            AnalysisState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AnalysisState::Respond | AnalysisState::Failed)
    }
}

impl std::fmt::Display for AnalysisState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where the video comes from.
#[derive(Debug, Clone)]
pub enum VideoInput {
    /// Frames sampled by the client, optionally with its own fingerprint.
    Uploaded {
        fingerprint: Option<String>,
        meta: Option<VideoMeta>,
        frames: Vec<FrameSample>,
    },
    /// A video file readable by the server. `fingerprint` is set when the
    /// caller already hashed the bytes (the file name is then not part of it).
    File {
        path: PathBuf,
        fingerprint: Option<VideoFingerprint>,
    },
}

impl VideoInput {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        VideoInput::File {
            path: path.into(),
            fingerprint: None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            VideoInput::Uploaded { .. } => "uploaded_frames",
            VideoInput::File { .. } => "file",
        }
    }
}

/// One analysis submission.
#[derive(Debug, Clone)]
pub struct Submission {
    pub platform: Platform,
    pub hook: Option<String>,
    pub description: Option<String>,
    pub video: VideoInput,
}

impl Submission {
    pub fn new(platform: Platform, video: VideoInput) -> Self {
        Self {
            platform,
            hook: None,
            description: None,
            video,
        }
    }

    pub fn with_hook(mut self, hook: Option<String>) -> Self {
        self.hook = hook;
        self
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }
}

/// Successful analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    pub result: AnalysisResult,
    /// The result was read from the cache rather than computed for this request
    pub cached: bool,
    pub fingerprint: VideoFingerprint,
}

impl AnalysisOutcome {
    fn from_cache(fingerprint: VideoFingerprint, entry: CacheEntry) -> Self {
        Self {
            result: entry.result,
            cached: true,
            fingerprint,
        }
    }

    fn computed(fingerprint: VideoFingerprint, result: AnalysisResult) -> Self {
        Self {
            result,
            cached: false,
            fingerprint,
        }
    }
}

impl From<AnalysisOutcome> for AnalyzeResponse {
    fn from(outcome: AnalysisOutcome) -> Self {
        AnalyzeResponse {
            result: outcome.result,
            cached: outcome.cached,
            fingerprint: outcome.fingerprint,
        }
    }
}

/// Per-request state and trace.
struct Flow {
    state: AnalysisState,
    path: Vec<AnalysisState>,
    logger: RequestLogger,
}

impl Flow {
    fn new(logger: RequestLogger) -> Self {
        Self {
            state: AnalysisState::Received,
            path: vec![AnalysisState::Received],
            logger,
        }
    }

    fn advance(&mut self, next: AnalysisState) {
        debug_assert!(!self.state.is_terminal());
        debug!(
            request_id = %self.logger.request_id(),
            from = self.state.as_str(),
            to = next.as_str(),
            "Analysis state transition"
        );
        self.state = next;
        self.path.push(next);
    }
}

/// Runs submissions through fingerprinting, caching, sampling, scoring and validation.
pub struct Orchestrator {
    cache: Arc<dyn AnalysisCache>,
    oracle: Arc<dyn ScoringOracle>,
    decoders: Arc<dyn DecoderFactory>,
    sampler: FrameSampler,
    flights: Option<SingleFlight>,
    config: PipelineConfig,
}

impl Orchestrator {
    pub fn new(
        cache: Arc<dyn AnalysisCache>,
        oracle: Arc<dyn ScoringOracle>,
        decoders: Arc<dyn DecoderFactory>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            cache,
            oracle,
            decoders,
            sampler: FrameSampler::new(config.sampler.clone()),
            flights: config.single_flight.then(SingleFlight::new),
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cache_backend(&self) -> &'static str {
        self.cache.backend_name()
    }

    /// Analyze a submission under a fresh request ID.
    pub async fn analyze(&self, submission: Submission) -> PipelineResult<AnalysisOutcome> {
        self.run(submission, RequestLogger::generate("analyze")).await
    }

    /// Analyze a submission under a caller-supplied request ID.
    pub async fn analyze_with_request_id(
        &self,
        request_id: &str,
        submission: Submission,
    ) -> PipelineResult<AnalysisOutcome> {
        self.run(submission, RequestLogger::new(request_id, "analyze"))
            .await
    }

    /// Read a cached result by fingerprint. Backend failures are always errors here.
    pub async fn lookup(
        &self,
        fingerprint: &VideoFingerprint,
    ) -> PipelineResult<Option<AnalysisResult>> {
        let backend = self.cache.backend_name();
        match self.cache.get(fingerprint).await {
            Ok(entry) => {
                metrics::record_cache_lookup(backend, entry.is_some());
                Ok(entry.map(|e| e.result))
            }
            Err(e) => {
                metrics::record_cache_error(backend, "get");
                Err(e.into())
            }
        }
    }

    /// Check the cache backend is reachable.
    pub async fn ping_cache(&self) -> PipelineResult<()> {
        Ok(self.cache.ping().await?)
    }

    async fn run(
        &self,
        submission: Submission,
        logger: RequestLogger,
    ) -> PipelineResult<AnalysisOutcome> {
        let span = logger.create_span();
        let mut flow = Flow::new(logger);
        self.run_flow(submission, &mut flow).instrument(span).await
    }

    async fn run_flow(
        &self,
        submission: Submission,
        flow: &mut Flow,
    ) -> PipelineResult<AnalysisOutcome> {
        let started = Instant::now();
        match self.drive(submission, flow).await {
            Ok(outcome) => {
                flow.advance(AnalysisState::Respond);
                flow.logger.log_completion(&format!(
                    "score={} cached={} elapsed_ms={}",
                    outcome.result.total_score,
                    outcome.cached,
                    started.elapsed().as_millis()
                ));
                metrics::record_analysis(if outcome.cached { "hit" } else { "computed" });
                Ok(outcome)
            }
            Err(e) => {
                let failed_in = flow.state;
                flow.advance(AnalysisState::Failed);
                flow.logger
                    .log_error(&format!("{} failed in {}: {}", e.code(), failed_in, e));
                metrics::record_analysis(e.code());
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        submission: Submission,
        flow: &mut Flow,
    ) -> PipelineResult<AnalysisOutcome> {
        let Submission {
            platform,
            hook,
            description,
            video,
        } = submission;

        // Nothing below may touch the cache or the oracle for a bad input
        admit(&video).await?;
        flow.logger.log_start(&format!(
            "platform={} source={}",
            platform,
            video.kind()
        ));

        let fingerprint = self.fingerprint(&video).await?;
        flow.logger.set_fingerprint(&fingerprint);
        flow.advance(AnalysisState::Fingerprinted);

        let cached = self.check_cache(&fingerprint, &flow.logger).await?;
        flow.advance(AnalysisState::CacheChecked);
        if let Some(entry) = cached {
            flow.advance(AnalysisState::Hit);
            info!(fingerprint = %fingerprint.short(), "Analysis cache HIT");
            return Ok(AnalysisOutcome::from_cache(fingerprint, entry));
        }

        // Held until the result is written back
        let _flight = match &self.flights {
            Some(flights) => {
                let guard = flights.acquire(&fingerprint).await;
                if let Some(entry) = self.check_cache(&fingerprint, &flow.logger).await? {
                    flow.advance(AnalysisState::Hit);
                    info!(
                        fingerprint = %fingerprint.short(),
                        "Analysis cache HIT after waiting for in-flight computation"
                    );
                    return Ok(AnalysisOutcome::from_cache(fingerprint, entry));
                }
                Some(guard)
            }
            None => None,
        };
        flow.advance(AnalysisState::Miss);
        info!(fingerprint = %fingerprint.short(), "Analysis cache MISS");

        flow.advance(AnalysisState::Sampling);
        let (frames, metadata) = self.collect_frames(video).await?;
        flow.logger
            .log_progress(&format!("collected {} frames", frames.len()));

        let request = AnalysisRequest::new(fingerprint.clone(), platform, frames, metadata)?
            .with_hook(hook)
            .with_description(description);

        flow.advance(AnalysisState::OracleCall);
        let verdict = self.call_oracle(&request).await?;

        flow.advance(AnalysisState::Validating);
        let validation = validate_verdict(&verdict);
        if validation.drift {
            metrics::record_score_drift();
            flow.logger
                .log_warning("oracle total disagreed with the criteria sum, corrected");
        }
        if validation.clamped_axes > 0 {
            metrics::record_score_clamped(validation.clamped_axes);
            flow.logger.log_warning(&format!(
                "{} criteria out of range, clamped",
                validation.clamped_axes
            ));
        }

        flow.advance(AnalysisState::CacheWrite);
        self.write_back(fingerprint, validation.result, &flow.logger)
            .await
    }

    async fn fingerprint(&self, video: &VideoInput) -> PipelineResult<VideoFingerprint> {
        match video {
            VideoInput::Uploaded {
                fingerprint: Some(hash),
                ..
            } => Ok(VideoFingerprint::parse(hash)?),
            VideoInput::Uploaded {
                fingerprint: None,
                meta,
                frames,
            } => Ok(fingerprint_frames(frames, meta.as_ref())),
            VideoInput::File {
                fingerprint: Some(fingerprint),
                ..
            } => Ok(fingerprint.clone()),
            VideoInput::File {
                path,
                fingerprint: None,
            } => Ok(fingerprint_file(path, self.config.fingerprint).await?),
        }
    }

    async fn check_cache(
        &self,
        fingerprint: &VideoFingerprint,
        logger: &RequestLogger,
    ) -> PipelineResult<Option<CacheEntry>> {
        let backend = self.cache.backend_name();
        match self.cache.get(fingerprint).await {
            Ok(entry) => {
                metrics::record_cache_lookup(backend, entry.is_some());
                Ok(entry)
            }
            Err(e) => {
                metrics::record_cache_error(backend, "get");
                self.on_cache_failure(e, "lookup", logger)?;
                metrics::record_cache_lookup(backend, false);
                Ok(None)
            }
        }
    }

    async fn write_back(
        &self,
        fingerprint: VideoFingerprint,
        result: AnalysisResult,
        logger: &RequestLogger,
    ) -> PipelineResult<AnalysisOutcome> {
        let backend = self.cache.backend_name();
        match self.cache.put_if_absent(&fingerprint, &result).await {
            Ok(outcome) if outcome.stored => {
                debug!(fingerprint = %fingerprint.short(), backend, "Analysis cached");
                Ok(AnalysisOutcome::computed(fingerprint, result))
            }
            Ok(_) => match self.cache.get(&fingerprint).await {
                // Another request stored first; everyone returns the stored entry
                Ok(Some(entry)) => {
                    info!(
                        fingerprint = %fingerprint.short(),
                        "Concurrent analysis stored first, returning stored result"
                    );
                    Ok(AnalysisOutcome::from_cache(fingerprint, entry))
                }
                Ok(None) => {
                    logger.log_warning("stored analysis vanished before it could be re-read");
                    Ok(AnalysisOutcome::computed(fingerprint, result))
                }
                Err(e) => {
                    metrics::record_cache_error(backend, "get");
                    logger.log_warning(&format!("failed to re-read stored analysis: {}", e));
                    Ok(AnalysisOutcome::computed(fingerprint, result))
                }
            },
            Err(e) => {
                metrics::record_cache_error(backend, "put");
                self.on_cache_failure(e, "write", logger)?;
                Ok(AnalysisOutcome::computed(fingerprint, result))
            }
        }
    }

    /// Apply the failure policy: soft logs and continues, hard fails the request.
    fn on_cache_failure(
        &self,
        error: StorageError,
        operation: &str,
        logger: &RequestLogger,
    ) -> PipelineResult<()> {
        match self.config.failure_policy {
            CacheFailurePolicy::Soft => {
                logger.log_warning(&format!(
                    "cache {} failed on {}, continuing: {}",
                    operation,
                    self.cache.backend_name(),
                    error
                ));
                Ok(())
            }
            CacheFailurePolicy::Hard => Err(PipelineError::Backend(error)),
        }
    }

    async fn collect_frames(
        &self,
        video: VideoInput,
    ) -> PipelineResult<(Vec<FrameSample>, VideoMeta)> {
        match video {
            VideoInput::Uploaded { meta, frames, .. } => {
                let frames = frames
                    .into_iter()
                    .map(inspect_frame)
                    .collect::<PipelineResult<Vec<_>>>()?;
                Ok((frames, meta.unwrap_or_default()))
            }
            VideoInput::File { path, .. } => {
                let mut decoder = self.decoders.open(&path).await?;
                let info = decoder.stream_info();
                let frames = self.sampler.sample(decoder.as_mut()).await?;

                let metadata = VideoMeta {
                    name: file_name(&path),
                    size: tokio::fs::metadata(&path).await.ok().map(|m| m.len()),
                    mime_type: None,
                    duration_seconds: info.duration.filter(|d| d.is_finite() && *d > 0.0),
                };
                Ok((frames, metadata))
            }
        }
    }

    async fn call_oracle(&self, request: &AnalysisRequest) -> PipelineResult<RawVerdict> {
        let started = Instant::now();
        let result = self.oracle.score(request).await;
        let elapsed = started.elapsed();

        metrics::record_oracle_call(self.oracle.name(), elapsed.as_secs_f64(), result.is_ok());
        match &result {
            Ok(_) => debug!(
                oracle = self.oracle.name(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Oracle replied"
            ),
            Err(e) => warn!(
                oracle = self.oracle.name(),
                elapsed_ms = elapsed.as_millis() as u64,
                error = %e,
                "Oracle call failed"
            ),
        }
        Ok(result?)
    }
}

/// Reject inputs that can never produce an analysis.
async fn admit(video: &VideoInput) -> PipelineResult<()> {
    match video {
        VideoInput::Uploaded { frames, .. } => {
            if frames.is_empty() {
                return Err(ModelError::NoFrames.into());
            }
            if frames.len() > MAX_FRAME_COUNT {
                return Err(ModelError::TooManyFrames {
                    count: frames.len(),
                    max: MAX_FRAME_COUNT,
                }
                .into());
            }
            for frame in frames {
                frame.validate_offset()?;
            }
            Ok(())
        }
        VideoInput::File { path, .. } => match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => Ok(()),
            _ => Err(PipelineError::input(format!(
                "video file not found: {}",
                path.display()
            ))),
        },
    }
}

/// Confirm an uploaded frame decodes, filling in its size.
fn inspect_frame(mut frame: FrameSample) -> PipelineResult<FrameSample> {
    let (width, height) = image_dimensions(&frame.image)?;
    frame.width = width;
    frame.height = height;
    Ok(frame)
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use image::RgbImage;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::oneshot;
    use vcheck_media::{DecodeCapability, MediaResult, SamplerConfig, SeekSignal, StreamInfo};
    use vcheck_models::EncodedImage;
    use vcheck_oracle::{OracleError, OracleResult, RawCriteria};
    use vcheck_storage::{MemoryCache, PutOutcome, StorageResult};

    // Oracle returning a fixed verdict and counting calls
    struct CountingOracle {
        calls: AtomicUsize,
        verdict: Option<RawVerdict>,
        delay: Option<Duration>,
    }

    impl CountingOracle {
        fn replying(verdict: RawVerdict) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                verdict: Some(verdict),
                delay: None,
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                verdict: None,
                delay: None,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ScoringOracle for CountingOracle {
        fn name(&self) -> &str {
            "counting"
        }

        async fn score(&self, request: &AnalysisRequest) -> OracleResult<RawVerdict> {
            assert!(!request.frames.is_empty());
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.verdict
                .clone()
                .ok_or_else(|| OracleError::upstream(503, "model overloaded"))
        }
    }

    // Cache whose every operation fails, counting calls
    #[derive(Default)]
    struct BrokenCache {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AnalysisCache for BrokenCache {
        fn backend_name(&self) -> &'static str {
            "broken"
        }

        async fn get(&self, _: &VideoFingerprint) -> StorageResult<Option<CacheEntry>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::Redis("connection refused".to_string()))
        }

        async fn put_if_absent(
            &self,
            _: &VideoFingerprint,
            _: &AnalysisResult,
        ) -> StorageResult<PutOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::Redis("connection refused".to_string()))
        }

        async fn expire(&self, _: &VideoFingerprint) -> StorageResult<bool> {
            Err(StorageError::Redis("connection refused".to_string()))
        }
    }

    // Cache that already holds a different result when the write happens
    struct RacingCache {
        inner: MemoryCache,
        winner: AnalysisResult,
    }

    #[async_trait]
    impl AnalysisCache for RacingCache {
        fn backend_name(&self) -> &'static str {
            "racing"
        }

        async fn get(&self, fp: &VideoFingerprint) -> StorageResult<Option<CacheEntry>> {
            self.inner.get(fp).await
        }

        async fn put_if_absent(
            &self,
            fp: &VideoFingerprint,
            _: &AnalysisResult,
        ) -> StorageResult<PutOutcome> {
            self.inner.put_if_absent(fp, &self.winner).await?;
            Ok(PutOutcome::already_present())
        }

        async fn expire(&self, fp: &VideoFingerprint) -> StorageResult<bool> {
            self.inner.expire(fp).await
        }
    }

    struct SolidDecoder {
        info: StreamInfo,
    }

    #[async_trait]
    impl DecodeCapability for SolidDecoder {
        fn stream_info(&self) -> StreamInfo {
            self.info
        }

        async fn seek(&mut self, _: f64) -> MediaResult<oneshot::Receiver<SeekSignal>> {
            let (tx, rx) = oneshot::channel();
            let _ = tx.send(SeekSignal::Completed);
            Ok(rx)
        }

        async fn rasterize(&mut self) -> MediaResult<RgbImage> {
            Ok(RgbImage::from_pixel(
                self.info.width,
                self.info.height,
                image::Rgb([200, 40, 40]),
            ))
        }
    }

    #[derive(Default)]
    struct SolidDecoderFactory {
        opened: AtomicUsize,
    }

    #[async_trait]
    impl DecoderFactory for SolidDecoderFactory {
        async fn open(&self, _: &Path) -> MediaResult<Box<dyn DecodeCapability>> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(SolidDecoder {
                info: StreamInfo::new(Some(10.0), 1280, 720),
            }))
        }
    }

    fn verdict(axes: [f64; 5], reported: f64) -> RawVerdict {
        RawVerdict {
            criteria: RawCriteria {
                hook_impact: Some(axes[0]),
                visual_quality: Some(axes[1]),
                message_clarity: Some(axes[2]),
                caption_legibility: Some(axes[3]),
                engagement_potential: Some(axes[4]),
            },
            reported_total: Some(reported),
            summary: "Gancho forte, legenda pequena.".to_string(),
            hashtags: vec!["fyp".to_string()],
            ..Default::default()
        }
    }

    fn jpeg_frame(t: f64, shade: u8) -> FrameSample {
        let image = RgbImage::from_pixel(32, 18, image::Rgb([shade, shade, shade]));
        let encoded = vcheck_media::raster::encode_jpeg(&image, 80).unwrap();
        FrameSample::new(t, encoded, 0, 0)
    }

    fn upload(frames: Vec<FrameSample>) -> Submission {
        Submission::new(
            Platform::Tiktok,
            VideoInput::Uploaded {
                fingerprint: None,
                meta: Some(VideoMeta {
                    name: Some("clip.mp4".to_string()),
                    size: Some(1_000_000),
                    mime_type: Some("video/mp4".to_string()),
                    duration_seconds: None,
                }),
                frames,
            },
        )
    }

    fn orchestrator(
        cache: Arc<dyn AnalysisCache>,
        oracle: Arc<CountingOracle>,
        config: PipelineConfig,
    ) -> Orchestrator {
        Orchestrator::new(
            cache,
            oracle,
            Arc::new(SolidDecoderFactory::default()),
            config,
        )
    }

    #[tokio::test]
    async fn test_identical_video_scored_once() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[7u8; 4096]).unwrap();

        let cache = Arc::new(MemoryCache::new());
        let oracle = Arc::new(CountingOracle::replying(verdict(
            [15.0, 12.0, 18.0, 10.0, 14.0],
            69.0,
        )));
        let pipeline = orchestrator(cache.clone(), oracle.clone(), PipelineConfig::default());

        let submission = Submission::new(
            Platform::Instagram,
            VideoInput::file(file.path()),
        );
        let first = pipeline.analyze(submission.clone()).await.unwrap();
        let second = pipeline.analyze(submission).await.unwrap();

        assert_eq!(first.fingerprint, second.fingerprint);
        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(first.result, second.result);
        assert_eq!(first.result.total_score, 69);
        assert_eq!(oracle.calls(), 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_reported_total_corrected_end_to_end() {
        let oracle = Arc::new(CountingOracle::replying(verdict([20.0; 5], 50.0)));
        let pipeline = orchestrator(
            Arc::new(MemoryCache::new()),
            oracle,
            PipelineConfig::default(),
        );

        let outcome = pipeline
            .analyze(upload(vec![jpeg_frame(0.5, 10), jpeg_frame(2.0, 90)]))
            .await
            .unwrap();

        assert_eq!(outcome.result.total_score, 100);
        assert!(outcome.result.is_consistent());
        assert!(outcome
            .result
            .notes
            .iter()
            .any(|n| n.contains("reported as 50, corrected to 100")));
    }

    #[tokio::test]
    async fn test_empty_frames_rejected_without_side_effects() {
        let cache = Arc::new(BrokenCache::default());
        let oracle = Arc::new(CountingOracle::replying(verdict([10.0; 5], 50.0)));
        let pipeline = orchestrator(cache.clone(), oracle.clone(), PipelineConfig::default());

        let err = pipeline.analyze(upload(Vec::new())).await.unwrap_err();

        assert!(matches!(err, PipelineError::Input(_)));
        assert_eq!(cache.calls.load(Ordering::SeqCst), 0);
        assert_eq!(oracle.calls(), 0);
    }

    #[tokio::test]
    async fn test_bad_client_fingerprint_rejected() {
        let oracle = Arc::new(CountingOracle::replying(verdict([10.0; 5], 50.0)));
        let pipeline = orchestrator(
            Arc::new(MemoryCache::new()),
            oracle.clone(),
            PipelineConfig::default(),
        );

        let submission = Submission::new(
            Platform::All,
            VideoInput::Uploaded {
                fingerprint: Some("not-a-hash".to_string()),
                meta: None,
                frames: vec![jpeg_frame(0.5, 10)],
            },
        );
        let err = pipeline.analyze(submission).await.unwrap_err();
        assert_eq!(err.code(), "invalid_input");
        assert_eq!(oracle.calls(), 0);
    }

    #[tokio::test]
    async fn test_client_fingerprint_is_cache_key() {
        let cache = Arc::new(MemoryCache::new());
        let oracle = Arc::new(CountingOracle::replying(verdict([10.0; 5], 50.0)));
        let pipeline = orchestrator(cache.clone(), oracle.clone(), PipelineConfig::default());

        let hash = "AB".repeat(32);
        let submit = |frame| {
            Submission::new(
                Platform::Kwai,
                VideoInput::Uploaded {
                    fingerprint: Some(hash.clone()),
                    meta: None,
                    frames: vec![frame],
                },
            )
        };

        let first = pipeline.analyze(submit(jpeg_frame(0.5, 10))).await.unwrap();
        // Different frames, same client fingerprint: served from the cache
        let second = pipeline.analyze(submit(jpeg_frame(1.5, 200))).await.unwrap();

        assert_eq!(first.fingerprint.as_str(), "ab".repeat(32));
        assert!(second.cached);
        assert_eq!(oracle.calls(), 1);
    }

    #[tokio::test]
    async fn test_undecodable_frame_is_decode_error() {
        let oracle = Arc::new(CountingOracle::replying(verdict([10.0; 5], 50.0)));
        let pipeline = orchestrator(
            Arc::new(MemoryCache::new()),
            oracle.clone(),
            PipelineConfig::default(),
        );

        let garbage = FrameSample::new(0.5, EncodedImage::jpeg(vec![1, 2, 3, 4]), 0, 0);
        let err = pipeline.analyze(upload(vec![garbage])).await.unwrap_err();

        assert!(matches!(err, PipelineError::Decode(_)));
        assert_eq!(oracle.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_file_is_input_error() {
        let oracle = Arc::new(CountingOracle::replying(verdict([10.0; 5], 50.0)));
        let pipeline = orchestrator(
            Arc::new(MemoryCache::new()),
            oracle,
            PipelineConfig::default(),
        );

        let submission = Submission::new(
            Platform::Tiktok,
            VideoInput::file("/nonexistent/clip.mp4"),
        );
        let err = pipeline.analyze(submission).await.unwrap_err();
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn test_directory_is_not_a_video_file() {
        let dir = tempfile::tempdir().unwrap();
        let oracle = Arc::new(CountingOracle::replying(verdict([10.0; 5], 50.0)));
        let pipeline = orchestrator(
            Arc::new(MemoryCache::new()),
            oracle.clone(),
            PipelineConfig::default(),
        );

        let submission = Submission::new(Platform::Tiktok, VideoInput::file(dir.path()));
        let err = pipeline.analyze(submission).await.unwrap_err();
        assert!(matches!(err, PipelineError::Input(_)));
        assert_eq!(oracle.calls(), 0);
    }

    #[tokio::test]
    async fn test_soft_policy_serves_through_broken_cache() {
        let oracle = Arc::new(CountingOracle::replying(verdict([10.0; 5], 50.0)));
        let pipeline = orchestrator(
            Arc::new(BrokenCache::default()),
            oracle.clone(),
            PipelineConfig::default().with_failure_policy(CacheFailurePolicy::Soft),
        );

        let outcome = pipeline
            .analyze(upload(vec![jpeg_frame(0.5, 10)]))
            .await
            .unwrap();
        assert!(!outcome.cached);
        assert_eq!(outcome.result.total_score, 50);
        assert_eq!(oracle.calls(), 1);
    }

    #[tokio::test]
    async fn test_hard_policy_fails_on_broken_cache() {
        let oracle = Arc::new(CountingOracle::replying(verdict([10.0; 5], 50.0)));
        let pipeline = orchestrator(
            Arc::new(BrokenCache::default()),
            oracle.clone(),
            PipelineConfig::default().with_failure_policy(CacheFailurePolicy::Hard),
        );

        let err = pipeline
            .analyze(upload(vec![jpeg_frame(0.5, 10)]))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Backend(_)));
        assert_eq!(oracle.calls(), 0);
    }

    #[tokio::test]
    async fn test_oracle_failure_is_not_cached() {
        let cache = Arc::new(MemoryCache::new());
        let oracle = Arc::new(CountingOracle::failing());
        let pipeline = orchestrator(cache.clone(), oracle.clone(), PipelineConfig::default());

        let err = pipeline
            .analyze(upload(vec![jpeg_frame(0.5, 10)]))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Oracle(_)));
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_lost_write_race_returns_stored_winner() {
        let frames = vec![jpeg_frame(0.5, 10)];
        let fingerprint = fingerprint_frames(&frames, None);
        let stored = validate_verdict(&verdict([1.0; 5], 5.0)).result;

        let cache = Arc::new(RacingCache {
            inner: MemoryCache::new(),
            winner: stored.clone(),
        });
        let oracle = Arc::new(CountingOracle::replying(verdict([10.0; 5], 50.0)));
        let pipeline = orchestrator(cache, oracle, PipelineConfig::default());

        let submission = Submission::new(
            Platform::Tiktok,
            VideoInput::Uploaded {
                fingerprint: None,
                meta: None,
                frames,
            },
        );
        let outcome = pipeline.analyze(submission).await.unwrap();

        assert_eq!(outcome.fingerprint, fingerprint);
        assert!(outcome.cached);
        assert_eq!(outcome.result, stored);
    }

    #[tokio::test]
    async fn test_single_flight_collapses_concurrent_misses() {
        let cache = Arc::new(MemoryCache::new());
        let oracle = Arc::new(CountingOracle {
            delay: Some(Duration::from_millis(50)),
            ..CountingOracle::replying(verdict([12.0; 5], 60.0))
        });
        let pipeline = Arc::new(orchestrator(
            cache,
            oracle.clone(),
            PipelineConfig::default().with_single_flight(true),
        ));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pipeline = pipeline.clone();
                tokio::spawn(async move {
                    pipeline
                        .analyze(upload(vec![jpeg_frame(0.5, 10)]))
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut outcomes = Vec::new();
        for handle in handles {
            outcomes.push(handle.await.unwrap());
        }

        assert_eq!(oracle.calls(), 1);
        assert_eq!(outcomes.iter().filter(|o| !o.cached).count(), 1);
        assert!(outcomes.iter().all(|o| o.result == outcomes[0].result));
    }

    #[tokio::test]
    async fn test_file_input_is_sampled() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not really a video").unwrap();

        let decoders = Arc::new(SolidDecoderFactory::default());
        let oracle = Arc::new(CountingOracle::replying(verdict([10.0; 5], 50.0)));
        let config = PipelineConfig {
            sampler: SamplerConfig {
                frame_count: 4,
                ..Default::default()
            },
            ..Default::default()
        };
        let pipeline = Orchestrator::new(
            Arc::new(MemoryCache::new()),
            oracle.clone(),
            decoders.clone(),
            config,
        );

        let submission = Submission::new(
            Platform::YoutubeShorts,
            VideoInput::file(file.path()),
        );
        pipeline.analyze(submission).await.unwrap();

        assert_eq!(decoders.opened.load(Ordering::SeqCst), 1);
        assert_eq!(oracle.calls(), 1);
    }

    #[tokio::test]
    async fn test_state_paths() {
        let cache = Arc::new(MemoryCache::new());
        let oracle = Arc::new(CountingOracle::replying(verdict([10.0; 5], 50.0)));
        let pipeline = orchestrator(cache, oracle, PipelineConfig::default());

        let mut miss = Flow::new(RequestLogger::new("req-1", "analyze"));
        pipeline
            .run_flow(upload(vec![jpeg_frame(0.5, 10)]), &mut miss)
            .await
            .unwrap();
        assert_eq!(
            miss.path,
            vec![
                AnalysisState::Received,
                AnalysisState::Fingerprinted,
                AnalysisState::CacheChecked,
                AnalysisState::Miss,
                AnalysisState::Sampling,
                AnalysisState::OracleCall,
                AnalysisState::Validating,
                AnalysisState::CacheWrite,
                AnalysisState::Respond,
            ]
        );

        let mut hit = Flow::new(RequestLogger::new("req-2", "analyze"));
        pipeline
            .run_flow(upload(vec![jpeg_frame(0.5, 10)]), &mut hit)
            .await
            .unwrap();
        assert_eq!(
            hit.path,
            vec![
                AnalysisState::Received,
                AnalysisState::Fingerprinted,
                AnalysisState::CacheChecked,
                AnalysisState::Hit,
                AnalysisState::Respond,
            ]
        );

        let mut failed = Flow::new(RequestLogger::new("req-3", "analyze"));
        assert!(pipeline.run_flow(upload(Vec::new()), &mut failed).await.is_err());
        assert_eq!(failed.path, vec![AnalysisState::Received, AnalysisState::Failed]);
        assert!(failed.state.is_terminal());
    }

    #[tokio::test]
    async fn test_lookup() {
        let cache = Arc::new(MemoryCache::new());
        let oracle = Arc::new(CountingOracle::replying(verdict([10.0; 5], 50.0)));
        let pipeline = orchestrator(cache, oracle, PipelineConfig::default());

        let outcome = pipeline
            .analyze(upload(vec![jpeg_frame(0.5, 10)]))
            .await
            .unwrap();

        let found = pipeline.lookup(&outcome.fingerprint).await.unwrap();
        assert_eq!(found, Some(outcome.result));

        let missing = VideoFingerprint::from_digest(&[9; 32]);
        assert_eq!(pipeline.lookup(&missing).await.unwrap(), None);
    }
}
