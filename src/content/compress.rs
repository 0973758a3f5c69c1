//! Reactive image recompression.
//!
//! Images over the upload ceiling are capped in resolution, then re-encoded
//! as JPEG at the highest quality that still fits. Quality is found by
//! bisection over the configured bounds.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageReader};

/// Bluesky's per-image blob limit in bytes.
pub const IMAGE_MAX_SIZE: usize = 1_000_000;

/// Maximum width or height kept after downscaling.
pub const IMAGE_MAX_RESOLUTION: u32 = 2000;

/// Lowest JPEG quality the search will try.
pub const MIN_QUALITY: u8 = 25;

/// Highest JPEG quality, also the fast-path quality.
pub const MAX_QUALITY: u8 = 96;

/// MIME type of every compressed output.
pub const COMPRESSED_MIME: &str = "image/jpeg";

/// Size and quality bounds for recompression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageLimits {
    /// Size ceiling in bytes.
    pub max_bytes: usize,
    /// Resolution ceiling in pixels, applied to both dimensions.
    pub max_resolution: u32,
    /// Lower quality bound (inclusive).
    pub min_quality: u8,
    /// Upper quality bound (inclusive).
    pub max_quality: u8,
}

impl Default for ImageLimits {
    fn default() -> Self {
        Self {
            max_bytes: IMAGE_MAX_SIZE,
            max_resolution: IMAGE_MAX_RESOLUTION,
            min_quality: MIN_QUALITY,
            max_quality: MAX_QUALITY,
        }
    }
}

/// Errors raised while recompressing an image.
#[derive(Debug, thiserror::Error)]
pub enum CompressError {
    /// The input could not be decoded as an image.
    #[error("could not read image: {0}")]
    Decode(#[source] image::ImageError),
    /// The JPEG encoder failed.
    #[error("could not re-encode image: {0}")]
    Encode(#[source] image::ImageError),
    /// No quality within bounds brings the image under the ceiling.
    #[error("image is too large to fit under {max_bytes} bytes even at quality {min_quality}")]
    Exhausted {
        /// The ceiling that could not be met.
        max_bytes: usize,
        /// The lowest quality tried.
        min_quality: u8,
    },
}

/// A recompressed JPEG image.
#[derive(Debug, Clone)]
pub struct CompressedImage {
    /// Encoded JPEG bytes.
    pub data: Vec<u8>,
    /// Width after downscaling.
    pub width: u32,
    /// Height after downscaling.
    pub height: u32,
    /// Quality the image was encoded at.
    pub quality: u8,
}

/// Recompress `raw` so it fits under `limits.max_bytes`.
///
/// Callers only invoke this for images already over the ceiling; the output
/// is always JPEG.
///
/// # Errors
///
/// [`CompressError::Decode`] if `raw` is not a readable image,
/// [`CompressError::Exhausted`] if even the lowest quality is too large.
pub fn compress(raw: &[u8], limits: &ImageLimits) -> Result<CompressedImage, CompressError> {
    let img = decode(raw)?;
    let img = cap_resolution(img, limits.max_resolution);
    let (width, height) = img.dimensions();

    let fast = encode_jpeg(&img, limits.max_quality)?;
    if fast.len() <= limits.max_bytes {
        tracing::debug!(
            width,
            height,
            bytes = fast.len(),
            quality = limits.max_quality,
            "image fits at fast-path quality"
        );
        return Ok(CompressedImage {
            data: fast,
            width,
            height,
            quality: limits.max_quality,
        });
    }

    let best = search_quality(limits.min_quality, limits.max_quality, |quality| {
        encode_jpeg(&img, quality).map(|data| data.len() <= limits.max_bytes)
    })?;

    let Some(quality) = best else {
        return Err(CompressError::Exhausted {
            max_bytes: limits.max_bytes,
            min_quality: limits.min_quality,
        });
    };

    let data = encode_jpeg(&img, quality)?;
    tracing::debug!(
        width,
        height,
        bytes = data.len(),
        quality,
        "image recompressed"
    );
    Ok(CompressedImage {
        data,
        width,
        height,
        quality,
    })
}

/// Binary search for the highest quality in `[min, max]` accepted by `fits`.
///
/// `fits` is assumed monotonic (lower quality never grows the output). It is
/// never called with a quality outside the bounds. Returns `None` when no
/// quality is accepted.
///
/// # Errors
///
/// Propagates the first error returned by `fits`.
pub fn search_quality<F, E>(min: u8, max: u8, mut fits: F) -> Result<Option<u8>, E>
where
    F: FnMut(u8) -> Result<bool, E>,
{
    let mut best = None;
    let mut lo = min;
    let mut hi = max;

    while lo <= hi {
        let mid = lo.saturating_add(hi.saturating_sub(lo) / 2);
        if fits(mid)? {
            best = Some(mid);
            match mid.checked_add(1) {
                Some(next) => lo = next,
                None => break,
            }
        } else {
            match mid.checked_sub(1) {
                Some(prev) => hi = prev,
                None => break,
            }
        }
    }

    Ok(best)
}

/// Downscale so neither side exceeds `max_resolution`, keeping the aspect
/// ratio. Smaller images are returned untouched.
pub fn cap_resolution(img: DynamicImage, max_resolution: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    if width <= max_resolution && height <= max_resolution {
        return img;
    }
    img.resize(max_resolution, max_resolution, FilterType::Lanczos3)
}

/// Encode `img` as JPEG at `quality`.
///
/// Alpha is dropped since JPEG cannot carry it.
///
/// # Errors
///
/// Returns [`CompressError::Encode`] if the encoder fails.
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, CompressError> {
    let mut output = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut output, quality);
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    rgb.write_with_encoder(encoder)
        .map_err(CompressError::Encode)?;
    Ok(output.into_inner())
}

fn decode(raw: &[u8]) -> Result<DynamicImage, CompressError> {
    ImageReader::new(Cursor::new(raw))
        .with_guessed_format()
        .map_err(|e| CompressError::Decode(image::ImageError::IoError(e)))?
        .decode()
        .map_err(CompressError::Decode)
}
