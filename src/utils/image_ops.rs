use image::{DynamicImage, GenericImageView, ImageFormat, RgbaImage};
use std::io::Cursor;
use std::sync::Arc;

use crate::core::errors::{PipelineError, RecognitionError};
use crate::core::types::{CaptureSource, CapturedImage, ImageSize, VideoFrame};

/// Decode image bytes off the async runtime and report their native size.
///
/// Decoding is CPU-bound and large camera frames would otherwise stall the executor.
pub async fn decode_dimensions_async(bytes: Arc<Vec<u8>>) -> Result<ImageSize, RecognitionError> {
    tokio::task::spawn_blocking(move || decode_dimensions(&bytes))
        .await
        .map_err(|e| RecognitionError::UnreadableImage(format!("decode task failed: {}", e)))?
}

/// Synchronous version for callers that are already off the runtime
pub fn decode_dimensions(bytes: &[u8]) -> Result<ImageSize, RecognitionError> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| RecognitionError::UnreadableImage(e.to_string()))?;
    let (width, height) = img.dimensions();
    Ok(ImageSize { width, height })
}

/// Copy one video frame into a PNG still at the frame's native resolution
pub fn capture_frame(frame: &VideoFrame) -> Result<CapturedImage, PipelineError> {
    let expected = frame.width as usize * frame.height as usize * 4;
    if frame.width == 0 || frame.height == 0 || frame.rgba.len() != expected {
        return Err(PipelineError::InvalidFrame(format!(
            "{}x{} frame needs {} bytes, got {}",
            frame.width,
            frame.height,
            expected,
            frame.rgba.len()
        )));
    }

    let buffer = RgbaImage::from_raw(frame.width, frame.height, frame.rgba.clone())
        .ok_or_else(|| PipelineError::InvalidFrame("buffer does not match dimensions".into()))?;

    let mut png_bytes = Vec::new();
    DynamicImage::ImageRgba8(buffer)
        .write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)
        .map_err(|e| PipelineError::InvalidFrame(format!("PNG encoding failed: {}", e)))?;

    Ok(CapturedImage::new(png_bytes, CaptureSource::Camera))
}

/// File extensions accepted as images by the upload endpoint
pub fn is_image_filename(filename: &str) -> bool {
    const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif", "webp"];

    std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
