//! FFmpeg-backed decode capability.
//!
//! Each seek spawns a one-frame `ffmpeg` extraction in the background and
//! fires the completion signal when the process exits. `rasterize` then
//! decodes the PNG it produced.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::RgbImage;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::command::{check_ffmpeg, check_ffprobe, FfmpegCommand};
use crate::decoder::{DecodeCapability, DecoderFactory, SeekSignal, StreamInfo};
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_stream;
use crate::raster;

/// Decode handle over a single file.
pub struct FfmpegDecoder {
    path: PathBuf,
    info: StreamInfo,
    pending: Option<PendingFrame>,
}

struct PendingFrame {
    timestamp: f64,
    task: JoinHandle<MediaResult<Vec<u8>>>,
}

impl FfmpegDecoder {
    /// Probe `path` and open a decode handle for it.
    pub async fn open(path: impl AsRef<Path>) -> MediaResult<Self> {
        let path = path.as_ref().to_path_buf();
        let info = probe_stream(&path).await?;
        info!(
            path = %path.display(),
            duration = ?info.duration,
            width = info.width,
            height = info.height,
            "Opened video for sampling"
        );
        Ok(Self {
            path,
            info,
            pending: None,
        })
    }

    fn abort_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.task.abort();
        }
    }
}

impl Drop for FfmpegDecoder {
    fn drop(&mut self) {
        self.abort_pending();
    }
}

#[async_trait]
impl DecodeCapability for FfmpegDecoder {
    fn stream_info(&self) -> StreamInfo {
        self.info
    }

    async fn seek(&mut self, timestamp: f64) -> MediaResult<oneshot::Receiver<SeekSignal>> {
        self.abort_pending();

        let command = FfmpegCommand::piped(&self.path).seek(timestamp).png_frame();
        let (tx, rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let result = command.run_capture().await;
            let signal = match &result {
                Ok(bytes) if !bytes.is_empty() => SeekSignal::Completed,
                Ok(_) => SeekSignal::Failed("no frame decoded at offset".to_string()),
                Err(e) => SeekSignal::Failed(e.to_string()),
            };
            let _ = tx.send(signal);
            result
        });

        self.pending = Some(PendingFrame { timestamp, task });
        Ok(rx)
    }

    async fn rasterize(&mut self) -> MediaResult<RgbImage> {
        // The handle stays in `pending` until the task finishes, so a call
        // abandoned by a timeout is still aborted by the next seek or by drop.
        let pending = self.pending.as_mut().ok_or(MediaError::NoPendingFrame)?;
        let timestamp = pending.timestamp;
        let joined = (&mut pending.task).await;
        self.pending = None;

        let bytes = joined
            .map_err(|e| MediaError::internal(format!("frame extraction task failed: {}", e)))?
            .map_err(|e| MediaError::seek_failed(timestamp, e.to_string()))?;

        debug!(timestamp = timestamp, bytes = bytes.len(), "Decoding extracted frame");
        raster::decode_png(&bytes)
    }
}

/// Opens [`FfmpegDecoder`] handles.
#[derive(Debug, Clone, Default)]
pub struct FfmpegDecoderFactory;

impl FfmpegDecoderFactory {
    pub fn new() -> Self {
        Self
    }

    /// Verify both FFmpeg binaries are installed.
    pub fn check_available() -> MediaResult<()> {
        check_ffmpeg()?;
        check_ffprobe()?;
        Ok(())
    }
}

#[async_trait]
impl DecoderFactory for FfmpegDecoderFactory {
    async fn open(&self, path: &Path) -> MediaResult<Box<dyn DecodeCapability>> {
        Ok(Box::new(FfmpegDecoder::open(path).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_open_missing_file() {
        let result = FfmpegDecoderFactory::new()
            .open(Path::new("/nonexistent/video.mp4"))
            .await;
        assert!(matches!(result, Err(MediaError::FileNotFound(_))));
    }

    #[tokio::test]
    async fn test_rasterize_without_seek() {
        let mut decoder = FfmpegDecoder {
            path: PathBuf::from("unused.mp4"),
            info: StreamInfo::new(Some(1.0), 16, 16),
            pending: None,
        };
        assert!(matches!(
            decoder.rasterize().await,
            Err(MediaError::NoPendingFrame)
        ));
    }

    #[tokio::test]
    async fn test_abandoned_rasterize_aborts_extraction() {
        let (alive_tx, alive_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let _alive = alive_tx;
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<Vec<u8>, MediaError>(Vec::new())
        });
        let mut decoder = FfmpegDecoder {
            path: PathBuf::from("unused.mp4"),
            info: StreamInfo::new(Some(10.0), 16, 16),
            pending: Some(PendingFrame {
                timestamp: 1.0,
                task,
            }),
        };

        let timed_out = tokio::time::timeout(Duration::from_millis(50), decoder.rasterize()).await;
        assert!(timed_out.is_err());
        assert!(decoder.pending.is_some());

        drop(decoder);
        // Aborting drops the task future and the sender it owns
        let stopped = tokio::time::timeout(Duration::from_secs(1), alive_rx).await;
        assert!(matches!(stopped, Ok(Err(_))));
    }
}
