//! Upload decoding and image preparation
//!
//! Validates the base64 payloads posted by the client and prepares downscaled
//! copies for the layout analyzer.

use base64::Engine;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use thiserror::Error;

/// Maximum dimension (width or height) sent to the layout analyzer
const MAX_ANALYZER_DIMENSION: u32 = 1600;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImageError {
    #[error("image payload is empty")]
    Empty,
    #[error("image payload is not valid base64")]
    InvalidBase64,
    #[error("image is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },
    #[error("unsupported image format")]
    UnsupportedFormat,
    #[error("failed to process image: {0}")]
    Processing(String),
}

/// A decoded upload whose format has been sniffed from its magic bytes
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
}

impl DecodedImage {
    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }

    /// Re-encode as a `data:` URL for APIs that take inline images
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type(),
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

/// Decode a base64 upload, with or without a `data:` URL prefix
pub fn decode_upload(encoded: &str, max_bytes: usize) -> Result<DecodedImage, ImageError> {
    let payload = match encoded.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => encoded,
    };
    let payload = payload.trim();
    if payload.is_empty() {
        return Err(ImageError::Empty);
    }

    // Reject before decoding anything absurdly large
    if payload.len() / 4 * 3 > max_bytes + 3 {
        return Err(ImageError::TooLarge {
            size: payload.len() / 4 * 3,
            limit: max_bytes,
        });
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|_| ImageError::InvalidBase64)?;
    if bytes.is_empty() {
        return Err(ImageError::Empty);
    }
    if bytes.len() > max_bytes {
        return Err(ImageError::TooLarge {
            size: bytes.len(),
            limit: max_bytes,
        });
    }

    let format = image::guess_format(&bytes).map_err(|_| ImageError::UnsupportedFormat)?;
    if !matches!(
        format,
        ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::WebP
    ) {
        return Err(ImageError::UnsupportedFormat);
    }

    Ok(DecodedImage { bytes, format })
}

/// Prepare an upload for the layout analyzer
///
/// - Resizes if too large
/// - Converts to JPEG for optimal size
pub fn prepare_image_for_analysis(image: &DecodedImage) -> Result<DecodedImage, ImageError> {
    let img = image::load_from_memory_with_format(&image.bytes, image.format)
        .map_err(|e| ImageError::Processing(e.to_string()))?;

    let img = resize_if_needed(img);

    let mut buffer = Vec::new();
    // JPEG has no alpha channel
    DynamicImage::ImageRgb8(img.to_rgb8())
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Jpeg)
        .map_err(|e| ImageError::Processing(e.to_string()))?;

    Ok(DecodedImage {
        bytes: buffer,
        format: ImageFormat::Jpeg,
    })
}

fn resize_if_needed(img: DynamicImage) -> DynamicImage {
    let (width, height) = (img.width(), img.height());

    if width <= MAX_ANALYZER_DIMENSION && height <= MAX_ANALYZER_DIMENSION {
        return img;
    }

    let scale = MAX_ANALYZER_DIMENSION as f32 / width.max(height) as f32;
    let new_width = ((width as f32 * scale) as u32).max(1);
    let new_height = ((height as f32 * scale) as u32).max(1);

    img.resize(new_width, new_height, image::imageops::FilterType::Lanczos3)
}
