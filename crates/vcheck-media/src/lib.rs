//! Video fingerprinting and frame sampling.
//!
//! This crate provides:
//! - Content fingerprints used as analysis cache keys
//! - The decode capability seam and its FFmpeg implementation
//! - A frame sampler producing downscaled JPEG frames at fixed offsets

pub mod command;
pub mod decoder;
pub mod error;
pub mod ffmpeg;
pub mod fingerprint;
pub mod probe;
pub mod raster;
pub mod sampler;

pub use decoder::{DecodeCapability, DecoderFactory, SeekSignal, StreamInfo};
pub use error::{MediaError, MediaResult};
pub use ffmpeg::{FfmpegDecoder, FfmpegDecoderFactory};
pub use fingerprint::{
    fingerprint_bytes, fingerprint_file, fingerprint_frames, fingerprint_reader,
    FingerprintConfig, SourceMeta, DEFAULT_FINGERPRINT_CHUNK_SIZE,
};
pub use probe::probe_stream;
pub use raster::image_dimensions;
pub use sampler::{FrameSampler, SamplerConfig};
