//! Decode capability abstraction.
//!
//! A decode handle exposes the stream's duration and native size, can be
//! asked to seek (answering through a one-shot completion signal) and can
//! rasterize the frame at the current position. Handles are used by one
//! sampler at a time, hence `&mut self`.

use std::path::Path;

use async_trait::async_trait;
use image::RgbImage;
use tokio::sync::oneshot;

use crate::error::MediaResult;

/// Stream properties reported by a decoder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamInfo {
    /// Duration in seconds. `None` when the container does not report it.
    pub duration: Option<f64>,
    pub width: u32,
    pub height: u32,
}

impl StreamInfo {
    pub fn new(duration: Option<f64>, width: u32, height: u32) -> Self {
        Self {
            duration,
            width,
            height,
        }
    }
}

/// Completion signal of a seek.
#[derive(Debug, Clone, PartialEq)]
pub enum SeekSignal {
    Completed,
    Failed(String),
}

/// Frame access over an open video source.
#[async_trait]
pub trait DecodeCapability: Send {
    fn stream_info(&self) -> StreamInfo;

    /// Start seeking to `timestamp` seconds.
    ///
    /// The receiver fires once the position is ready. A receiver that is
    /// dropped without firing counts as "no signal".
    async fn seek(&mut self, timestamp: f64) -> MediaResult<oneshot::Receiver<SeekSignal>>;

    /// Rasterize the frame at the current position.
    async fn rasterize(&mut self) -> MediaResult<RgbImage>;
}

/// Opens decode handles for files on disk.
#[async_trait]
pub trait DecoderFactory: Send + Sync {
    async fn open(&self, path: &Path) -> MediaResult<Box<dyn DecodeCapability>>;
}
