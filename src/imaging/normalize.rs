use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageDecoder, ImageReader};
use tracing::{debug, warn};

use crate::config::{Config, DEFAULT_IMAGE_JPEG_QUALITY, DEFAULT_IMAGE_MAX_DIMENSION};
use crate::imaging::data_uri::UploadedImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    pub max_dimension: u32,
    pub jpeg_quality: u8,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_IMAGE_MAX_DIMENSION,
            jpeg_quality: DEFAULT_IMAGE_JPEG_QUALITY,
        }
    }
}

impl NormalizeOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_dimension: config.image_max_dimension.max(1),
            jpeg_quality: config.image_jpeg_quality.clamp(1, 100),
        }
    }
}

/// Scales `(width, height)` so the longer side is at most `max_dimension`,
/// preserving aspect ratio. Dimensions already in bounds are returned as-is.
pub fn fit_within(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let max_dimension = max_dimension.max(1);
    if width.max(height) <= max_dimension {
        return (width, height);
    }

    let scale = |short: u32, long: u32| -> u32 {
        let scaled = (f64::from(short) * f64::from(max_dimension) / f64::from(long)).round();
        (scaled as u32).clamp(1, max_dimension)
    };

    if width >= height {
        (max_dimension, scale(height, width))
    } else {
        (scale(width, height), max_dimension)
    }
}

/// Decodes `bytes` upright. The EXIF orientation is applied here because the
/// JPEG we re-encode carries no metadata.
fn decode_upright(bytes: &[u8]) -> image::ImageResult<DynamicImage> {
    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_decoder()?;
    let orientation = decoder.orientation()?;
    let mut decoded = DynamicImage::from_decoder(decoder)?;
    decoded.apply_orientation(orientation);
    Ok(decoded)
}

fn reencode(bytes: &[u8], options: NormalizeOptions) -> image::ImageResult<Vec<u8>> {
    let decoded = decode_upright(bytes)?;
    let (width, height) = fit_within(decoded.width(), decoded.height(), options.max_dimension);
    let resized = if (width, height) == (decoded.width(), decoded.height()) {
        decoded
    } else {
        debug!(
            from_width = decoded.width(),
            from_height = decoded.height(),
            width,
            height,
            "Downscaling upload before generation"
        );
        decoded.resize_exact(width, height, FilterType::Lanczos3)
    };

    // JPEG has no alpha channel.
    let rgb = resized.to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, options.jpeg_quality).encode_image(&rgb)?;
    Ok(out)
}

/// Produces a bounded JPEG rendition of `image` for transmission. When the
/// payload cannot be decoded locally the original is returned unchanged.
pub fn normalize_image(image: &UploadedImage, options: NormalizeOptions) -> UploadedImage {
    match reencode(image.bytes(), options) {
        Ok(bytes) => UploadedImage::new("image/jpeg", bytes),
        Err(err) => {
            warn!(
                "Could not resize {} upload ({} bytes), sending original: {}",
                image.mime_type(),
                image.len(),
                err
            );
            image.clone()
        }
    }
}
