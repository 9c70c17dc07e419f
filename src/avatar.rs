use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};

use crate::error::AppError;

pub const MAX_AVATAR_BYTES: usize = 10 * 1024 * 1024;
const AVATAR_MAX_DIM: u32 = 512;

pub const ALLOWED_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/png"];

/// Scale an image so it fits in a `max_dim` square, keeping aspect ratio.
/// Smaller images are left as they are.
fn fit_within(img: DynamicImage, max_dim: u32) -> DynamicImage {
    if img.width().max(img.height()) <= max_dim {
        return img;
    }
    img.resize(max_dim, max_dim, FilterType::Lanczos3)
}

fn encode_webp(img: &DynamicImage) -> Result<Vec<u8>, AppError> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::WebP)
        .map_err(|e| AppError::Internal(format!("Failed to encode WebP: {e}")))?;
    Ok(buf.into_inner())
}

/// Decode an uploaded JPEG/PNG and re-encode it as a bounded WebP avatar.
pub fn process(bytes: &[u8], content_type: &str) -> Result<Vec<u8>, AppError> {
    if !ALLOWED_CONTENT_TYPES.contains(&content_type) {
        return Err(AppError::InvalidArgument(format!(
            "Unsupported avatar type: {content_type}"
        )));
    }
    if bytes.len() > MAX_AVATAR_BYTES {
        return Err(AppError::InvalidArgument("Avatar must be at most 10 MB".into()));
    }

    let img = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| AppError::InvalidArgument(format!("Failed to detect image format: {e}")))?
        .decode()
        .map_err(|e| AppError::InvalidArgument(format!("Failed to decode image: {e}")))?;

    // WebP encoder only takes 8-bit RGB(A)
    let img = DynamicImage::ImageRgba8(fit_within(img, AVATAR_MAX_DIM).to_rgba8());
    encode_webp(&img)
}

pub fn avatar_key(id: uuid::Uuid) -> String {
    format!("avatars/{id}.webp")
}
