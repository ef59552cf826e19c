//! Frame scaling and encoding.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, ImageFormat, RgbImage};

use vcheck_models::EncodedImage;

use crate::error::{MediaError, MediaResult};

/// Output size for a frame of `width x height` scaled to at most `target_width`.
///
/// Frames are never upscaled. Height keeps the aspect ratio, rounded, minimum 1.
pub fn output_dimensions(width: u32, height: u32, target_width: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (width.max(1), height.max(1));
    }
    let out_width = target_width.max(1).min(width);
    if out_width == width {
        return (width, height);
    }
    let scaled = (f64::from(height) * f64::from(out_width) / f64::from(width)).round() as u32;
    (out_width, scaled.max(1))
}

/// Downscale a frame to `target_width`, preserving aspect ratio.
pub fn downscale(frame: RgbImage, target_width: u32) -> RgbImage {
    let (width, height) = output_dimensions(frame.width(), frame.height(), target_width);
    if (width, height) == frame.dimensions() {
        return frame;
    }
    image::imageops::resize(&frame, width, height, FilterType::Triangle)
}

/// Encode an RGB frame as JPEG at `quality` (1-100).
pub fn encode_jpeg(frame: &RgbImage, quality: u8) -> MediaResult<EncodedImage> {
    let mut bytes = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100));
    encoder.encode(frame.as_raw(), frame.width(), frame.height(), ColorType::Rgb8)?;
    Ok(EncodedImage::jpeg(bytes))
}

/// Decode a PNG produced by the FFmpeg image pipe.
pub fn decode_png(bytes: &[u8]) -> MediaResult<RgbImage> {
    if bytes.is_empty() {
        return Err(MediaError::image("empty frame"));
    }
    Ok(image::load_from_memory_with_format(bytes, ImageFormat::Png)?.to_rgb8())
}

/// Read the pixel size of an encoded image without decoding it fully.
pub fn image_dimensions(image: &EncodedImage) -> MediaResult<(u32, u32)> {
    let reader = image::io::Reader::new(Cursor::new(&image.bytes)).with_guessed_format()?;
    if reader.format().is_none() {
        return Err(MediaError::image(format!(
            "unrecognized image data ({})",
            image.mime_type
        )));
    }
    Ok(reader.into_dimensions()?)
}
