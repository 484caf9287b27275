// ============================
// crates/backend-lib/src/photo.rs
// ============================
//! Upload photo normalization.
//!
//! Uploaded images are shrunk until width + height fits the dimension budget,
//! then re-encoded as JPEG with decreasing quality until the byte budget is
//! met or the quality floor is reached.
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ExtendedColorType, RgbImage};
use metrics::{counter, histogram};
use tracing::debug;

use crate::config::PhotoSettings;
use crate::error::AppError;
use crate::metrics::{PHOTO_BYTES, PHOTO_NORMALIZED, PHOTO_QUALITY};

/// JPEG produced from an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPhoto {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Quality the returned bytes were encoded at
    pub quality: u8,
}

/// Dimensions after applying the width + height budget.
///
/// Both sides are scaled by `max_sum / (width + height)` and rounded down.
pub fn target_dimensions(width: u32, height: u32, max_sum: u32) -> (u32, u32) {
    let sum = u64::from(width) + u64::from(height);
    if sum <= u64::from(max_sum) {
        return (width, height);
    }

    let scale = |side: u32| {
        let scaled = u64::from(side) * u64::from(max_sum) / sum;
        u32::try_from(scaled).unwrap_or(u32::MAX).max(1)
    };
    (scale(width), scale(height))
}

/// Decode, resize and recompress an uploaded image.
///
/// CPU bound; callers on the runtime should wrap it in `spawn_blocking`.
pub fn normalize_photo(input: &[u8], settings: &PhotoSettings) -> Result<NormalizedPhoto, AppError> {
    let decoded = image::load_from_memory(input)?;
    let (width, height) =
        target_dimensions(decoded.width(), decoded.height(), settings.max_dimension_sum);

    let rgb = if (width, height) == (decoded.width(), decoded.height()) {
        decoded.to_rgb8()
    } else {
        decoded
            .resize_exact(width, height, FilterType::Lanczos3)
            .to_rgb8()
    };

    let floor = settings.min_quality.max(1);
    let mut quality = settings.initial_quality.clamp(floor, 100);
    let mut best = encode_jpeg(&rgb, quality)?;
    let mut best_quality = quality;
    let mut last_len = best.len();

    while last_len > settings.max_bytes && quality > floor {
        quality = quality.saturating_sub(settings.quality_step.max(1)).max(floor);
        let attempt = encode_jpeg(&rgb, quality)?;
        last_len = attempt.len();
        debug!(quality, bytes = last_len, "re-encoded photo");
        if attempt.len() < best.len() {
            best = attempt;
            best_quality = quality;
        }
    }

    counter!(PHOTO_NORMALIZED).increment(1);
    histogram!(PHOTO_BYTES).record(best.len() as f64);
    histogram!(PHOTO_QUALITY).record(f64::from(best_quality));
    debug!(
        width,
        height,
        quality = best_quality,
        bytes = best.len(),
        input_bytes = input.len(),
        "normalized photo"
    );

    Ok(NormalizedPhoto {
        bytes: best,
        width,
        height,
        quality: best_quality,
    })
}

fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, AppError> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality).encode(
        image.as_raw(),
        image.width(),
        image.height(),
        ExtendedColorType::Rgb8,
    )?;
    Ok(out)
}
