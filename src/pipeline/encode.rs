//! Image encoding: `DynamicImage` → JPEG bytes for the page archive.
//!
//! Rendered bitmaps come back from PDFium as RGBA. JPEG has no alpha
//! channel, so pages are flattened to RGB before encoding.

use crate::error::EngineError;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use tracing::debug;

/// Encode a rasterised page as JPEG at `quality` (1–100).
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, EngineError> {
    let mut buf = Vec::new();
    let rgb = img.to_rgb8();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode_image(&rgb)
        .map_err(|e| EngineError::Encode(format!("jpeg: {e}")))?;

    debug!(
        "Encoded {}x{} page → {} bytes JPEG (q={})",
        rgb.width(),
        rgb.height(),
        buf.len(),
        quality
    );
    Ok(buf)
}
