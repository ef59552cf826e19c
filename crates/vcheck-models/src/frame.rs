//! Sampled video frames.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use schemars::gen::SchemaGenerator;
use schemars::schema::Schema;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ModelError, ModelResult};

/// Upper bound on frames per request.
pub const MAX_FRAME_COUNT: usize = 8;

/// MIME type used for sampled frames.
pub const JPEG_MIME: &str = "image/jpeg";

/// An encoded bitmap (JPEG or PNG bytes).
///
/// On the wire this is a `data:<mime>;base64,<payload>` URL, which is what
/// browser canvases produce. A bare base64 payload is accepted as JPEG.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl EncodedImage {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn jpeg(bytes: Vec<u8>) -> Self {
        Self::new(JPEG_MIME, bytes)
    }

    /// Parse a data URL or bare base64 payload.
    pub fn from_data_url(value: &str) -> ModelResult<Self> {
        let value = value.trim();
        let (mime_type, payload) = match value.strip_prefix("data:") {
            Some(rest) => {
                let (header, payload) = rest
                    .split_once(',')
                    .ok_or_else(|| ModelError::invalid_image("data URL has no payload"))?;
                let mime = header
                    .strip_suffix(";base64")
                    .ok_or_else(|| ModelError::invalid_image("data URL must be base64"))?;
                if !mime.starts_with("image/") {
                    return Err(ModelError::invalid_image(format!(
                        "unsupported media type '{}'",
                        mime
                    )));
                }
                (mime.to_string(), payload)
            }
            None => (JPEG_MIME.to_string(), value),
        };

        let bytes = STANDARD
            .decode(payload)
            .map_err(|e| ModelError::invalid_image(format!("bad base64: {}", e)))?;
        if bytes.is_empty() {
            return Err(ModelError::invalid_image("empty image"));
        }

        Ok(Self { mime_type, bytes })
    }

    /// Render as a data URL.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }

    /// Bare base64 payload.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedImage")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl Serialize for EncodedImage {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_data_url())
    }
}

impl<'de> Deserialize<'de> for EncodedImage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::from_data_url(&raw).map_err(serde::de::Error::custom)
    }
}

impl JsonSchema for EncodedImage {
    fn schema_name() -> String {
        "EncodedImage".to_string()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        String::json_schema(gen)
    }
}

/// One still image captured from the video timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FrameSample {
    /// Offset into the video, in seconds
    #[serde(rename = "t", alias = "offset_seconds")]
    pub offset_seconds: f64,

    /// Encoded bitmap
    pub image: EncodedImage,

    /// Pixel width (0 when the client did not report it)
    #[serde(default)]
    pub width: u32,

    /// Pixel height (0 when the client did not report it)
    #[serde(default)]
    pub height: u32,
}

impl FrameSample {
    pub fn new(offset_seconds: f64, image: EncodedImage, width: u32, height: u32) -> Self {
        Self {
            offset_seconds,
            image,
            width,
            height,
        }
    }

    /// Check the offset is a usable timestamp.
    pub fn validate_offset(&self) -> ModelResult<()> {
        if !self.offset_seconds.is_finite() || self.offset_seconds < 0.0 {
            return Err(ModelError::InvalidOffset(format!(
                "{} is not a valid offset",
                self.offset_seconds
            )));
        }
        Ok(())
    }
}
