//! Page image preparation: optional enhancement, PNG encoding with a size
//! ceiling, and base64 wrapping for the OCR request body.
//!
//! PNG is used throughout because it is lossless: JPEG ringing around glyph
//! edges measurably hurts vision-model OCR at 150–200 DPI.

use crate::error::OptimizerError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::DynamicImage;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::{debug, warn};

/// Contrast boost applied by [`enhance`], in `image`'s percent units.
pub const ENHANCE_CONTRAST: f32 = 30.0;

/// How pages are turned into images.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterSettings {
    pub dpi: u32,
    pub enhance: bool,
    pub scale_factor: f32,
    pub max_image_bytes: u64,
}

/// Pixel size for a page of `points` at `dpi` (1 pt = 1/72 in).
pub fn pixels_for(points: f32, dpi: u32) -> u32 {
    ((points * dpi as f32) / 72.0).round().max(1.0) as u32
}

/// Upscale by `scale` (Lanczos3), convert to grayscale and raise contrast.
pub fn enhance(img: &DynamicImage, scale: f32) -> DynamicImage {
    let w = ((img.width() as f32) * scale).round().max(1.0) as u32;
    let h = ((img.height() as f32) * scale).round().max(1.0) as u32;
    let scaled = if (scale - 1.0).abs() > f32::EPSILON {
        img.resize_exact(w, h, FilterType::Lanczos3)
    } else {
        img.clone()
    };
    scaled.grayscale().adjust_contrast(ENHANCE_CONTRAST)
}

/// Apply enhancement if enabled; otherwise return the image untouched.
pub fn prepare(img: DynamicImage, settings: &RasterSettings) -> DynamicImage {
    if settings.enhance {
        enhance(&img, settings.scale_factor)
    } else {
        img
    }
}

fn write_png(
    img: &DynamicImage,
    path: &Path,
    compression: CompressionType,
) -> Result<u64, OptimizerError> {
    let file = File::create(path).map_err(|e| OptimizerError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    })?;
    let encoder = PngEncoder::new_with_quality(BufWriter::new(file), compression, PngFilter::Adaptive);
    img.write_with_encoder(encoder)
        .map_err(|e| OptimizerError::Internal(format!("PNG encode {}: {e}", path.display())))?;

    std::fs::metadata(path)
        .map(|m| m.len())
        .map_err(|e| OptimizerError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Save `img` as PNG, re-encoding with best compression when the fast
/// encoding exceeds `max_bytes`. Returns the final size on disk.
///
/// Still oversized after re-encoding is logged, not an error: the backend
/// gets to decide whether it accepts the payload.
pub fn save_png(img: &DynamicImage, path: &Path, max_bytes: u64) -> Result<u64, OptimizerError> {
    let size = write_png(img, path, CompressionType::Fast)?;
    if size <= max_bytes {
        debug!("Saved {} ({} bytes)", path.display(), size);
        return Ok(size);
    }

    debug!(
        "{} is {} bytes (limit {}); re-encoding with best compression",
        path.display(),
        size,
        max_bytes
    );
    let size = write_png(img, path, CompressionType::Best)?;
    if size > max_bytes {
        warn!(
            "{} still {} bytes after re-encoding (limit {})",
            path.display(),
            size,
            max_bytes
        );
    }
    Ok(size)
}

/// Base64 (standard alphabet) of raw image bytes.
pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// `data:image/png;base64,...` URI for chat-completions image parts.
pub fn png_data_uri(bytes: &[u8]) -> String {
    format!("data:image/png;base64,{}", to_base64(bytes))
}
