//! Score a local video file from the command line.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vcheck_media::FfmpegDecoderFactory;
use vcheck_models::{AnalyzeResponse, Platform};
use vcheck_oracle::GeminiOracle;
use vcheck_pipeline::{Orchestrator, PipelineConfig, Submission, VideoInput};
use vcheck_storage::{CacheBackend, CacheConfig};

fn parse_platform(value: &str) -> Result<Platform, String> {
    Platform::parse(value).ok_or_else(|| {
        format!(
            "unknown platform '{}' (expected all, tiktok, instagram, youtube_shorts or kwai)",
            value
        )
    })
}

#[derive(Parser, Debug)]
#[clap(name = "vcheck", about = "Score a short-form video for virality potential")]
struct CliArgs {
    /// Path to the video file.
    pub video: PathBuf,

    /// Target platform.
    #[clap(short, long, default_value = "all", value_parser = parse_platform)]
    pub platform: Platform,

    /// Opening line spoken or shown in the first seconds.
    #[clap(long)]
    pub hook: Option<String>,

    /// Caption or description the video will be posted with.
    #[clap(long)]
    pub description: Option<String>,
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vcheck=info,warn"));

    // Stdout carries the result JSON, logs go to stderr
    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();
    init_tracing();

    let args = CliArgs::parse();

    FfmpegDecoderFactory::check_available().context("ffmpeg/ffprobe are required")?;

    let cache_config = CacheConfig::from_env().context("invalid cache configuration")?;
    let cache = CacheBackend::from_config(&cache_config)
        .await
        .context("failed to initialize cache backend")?;
    let oracle = GeminiOracle::from_env().context("failed to configure Gemini oracle")?;

    let config = PipelineConfig::from_env().with_failure_policy(cache_config.failure_policy);
    info!(
        backend = ?cache_config.backend,
        model = %oracle.model(),
        frames = config.sampler.frame_count,
        "Starting vcheck"
    );

    let orchestrator = Orchestrator::new(
        Arc::new(cache),
        Arc::new(oracle),
        Arc::new(FfmpegDecoderFactory::new()),
        config,
    );

    let submission = Submission::new(args.platform, VideoInput::file(args.video))
        .with_hook(args.hook)
        .with_description(args.description);

    let outcome = orchestrator.analyze(submission).await?;
    let response = AnalyzeResponse::from(outcome);
    println!("{}", serde_json::to_string_pretty(&response)?);

    Ok(())
}
