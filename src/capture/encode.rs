//! In-memory image encoding: camera frames to JPEG, files to sniffed bytes.

use super::{CaptureError, CapturedImage};
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;

/// JPEG quality used for camera frames (0-100).
pub const JPEG_QUALITY: u8 = 80;

/// Encode a frame as JPEG. Alpha is dropped since JPEG has none.
pub fn encode_jpeg(frame: &DynamicImage, quality: u8) -> Result<CapturedImage, CaptureError> {
    let start = std::time::Instant::now();
    let rgb = DynamicImage::ImageRgb8(frame.to_rgb8());
    let mut bytes = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100));
    rgb.write_with_encoder(encoder)
        .map_err(|e| CaptureError::Encode(e.to_string()))?;
    log::info!(
        "[CAPTURE] JPEG encode: {}ms ({}x{}, {} bytes)",
        start.elapsed().as_millis(),
        frame.width(),
        frame.height(),
        bytes.len()
    );
    Ok(CapturedImage::new(bytes, "image/jpeg"))
}

/// Keep file bytes as-is, tagged with the MIME type of their sniffed format.
pub fn sniff_image(bytes: Vec<u8>) -> Result<CapturedImage, CaptureError> {
    let format = image::guess_format(&bytes).map_err(|_| CaptureError::UnsupportedFormat)?;
    Ok(CapturedImage::new(bytes, format.to_mime_type()))
}

pub fn base64_encode(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Split `data:<mime>;base64,<payload>` and decode the payload.
pub fn decode_data_url(data_url: &str) -> Result<CapturedImage, CaptureError> {
    let (header, payload) = data_url
        .split_once(',')
        .ok_or(CaptureError::InvalidDataUrl("missing ',' separator"))?;
    let mime = header
        .strip_prefix("data:")
        .and_then(|h| h.strip_suffix(";base64"))
        .ok_or(CaptureError::InvalidDataUrl("expected data:<mime>;base64 header"))?;
    if !mime.starts_with("image/") {
        return Err(CaptureError::InvalidDataUrl("not an image"));
    }
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|_| CaptureError::InvalidDataUrl("payload is not base64"))?;
    if bytes.is_empty() {
        return Err(CaptureError::InvalidDataUrl("empty payload"));
    }
    Ok(CapturedImage::new(bytes, mime))
}
