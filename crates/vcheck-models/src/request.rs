//! Analysis request sent to the scoring oracle.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::fingerprint::VideoFingerprint;
use crate::frame::{FrameSample, MAX_FRAME_COUNT};
use crate::platform::Platform;

/// Basic metadata about the submitted video.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoMeta {
    /// Original file name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Size in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    /// MIME type as reported by the client
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    /// Duration in seconds, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
}

/// A fully-formed request for the scoring oracle.
///
/// Only constructible with at least one frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub fingerprint: VideoFingerprint,
    pub platform: Platform,
    pub hook: Option<String>,
    pub description: Option<String>,
    pub frames: Vec<FrameSample>,
    pub metadata: VideoMeta,
}

impl AnalysisRequest {
    pub fn new(
        fingerprint: VideoFingerprint,
        platform: Platform,
        frames: Vec<FrameSample>,
        metadata: VideoMeta,
    ) -> ModelResult<Self> {
        if frames.is_empty() {
            return Err(ModelError::NoFrames);
        }
        if frames.len() > MAX_FRAME_COUNT {
            return Err(ModelError::TooManyFrames {
                count: frames.len(),
                max: MAX_FRAME_COUNT,
            });
        }
        for frame in &frames {
            frame.validate_offset()?;
        }

        Ok(Self {
            fingerprint,
            platform,
            hook: None,
            description: None,
            frames,
            metadata,
        })
    }

    /// Set the hook text (blank values are dropped).
    pub fn with_hook(mut self, hook: Option<String>) -> Self {
        self.hook = non_blank(hook);
        self
    }

    /// Set the description text (blank values are dropped).
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = non_blank(description);
        self
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::EncodedImage;

    fn fp() -> VideoFingerprint {
        VideoFingerprint::from_digest(&[7; 32])
    }

    fn frame(t: f64) -> FrameSample {
        FrameSample::new(t, EncodedImage::jpeg(vec![1, 2, 3]), 2, 2)
    }

    #[test]
    fn test_rejects_empty_frames() {
        let err = AnalysisRequest::new(fp(), Platform::All, vec![], VideoMeta::default())
            .unwrap_err();
        assert_eq!(err, ModelError::NoFrames);
    }

    #[test]
    fn test_rejects_too_many_frames() {
        let frames = (0..=MAX_FRAME_COUNT).map(|i| frame(i as f64)).collect();
        let err =
            AnalysisRequest::new(fp(), Platform::All, frames, VideoMeta::default()).unwrap_err();
        assert!(matches!(err, ModelError::TooManyFrames { .. }));
    }

    #[test]
    fn test_blank_text_dropped() {
        let request = AnalysisRequest::new(fp(), Platform::Kwai, vec![frame(0.5)], VideoMeta::default())
            .unwrap()
            .with_hook(Some("   ".to_string()))
            .with_description(Some(" launch day ".to_string()));
        assert!(request.hook.is_none());
        assert_eq!(request.description.as_deref(), Some("launch day"));
    }

    #[test]
    fn test_video_meta_wire_names() {
        let meta: VideoMeta =
            serde_json::from_str(r#"{"name":"a.mp4","size":10,"type":"video/mp4"}"#).unwrap();
        assert_eq!(meta.mime_type.as_deref(), Some("video/mp4"));
        assert!(meta.duration_seconds.is_none());
    }
}
