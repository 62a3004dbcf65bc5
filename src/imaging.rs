//! Image codec helpers: load, rotate, crop to ROI, encode.

use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, ImageFormat, ImageReader};
use thiserror::Error;

use crate::config::Roi;

/// JPEG quality for page payloads.
const PAYLOAD_JPEG_QUALITY: u8 = 90;

#[derive(Debug, Error)]
pub enum ImagingError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("ROI {roi} is empty for a {width}x{height} image")]
    EmptyRoi { roi: Roi, width: u32, height: u32 },
}

/// Quarter turns used to straighten sideways scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    /// 90° clockwise.
    Clockwise,
    /// 90° counter-clockwise.
    CounterClockwise,
}

/// Load an image, sniffing the format from content rather than extension.
pub fn load(path: &Path) -> Result<DynamicImage, ImagingError> {
    let reader = ImageReader::open(path).map_err(|source| ImagingError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let reader = reader
        .with_guessed_format()
        .map_err(|source| ImagingError::Read {
            path: path.display().to_string(),
            source,
        })?;
    Ok(reader.decode()?)
}

/// Landscape images are pages captured sideways.
pub fn is_landscape(image: &DynamicImage) -> bool {
    image.width() > image.height()
}

/// Rotate by a quarter turn, expanding the canvas.
pub fn rotate(image: &DynamicImage, rotation: Rotation) -> DynamicImage {
    match rotation {
        Rotation::Clockwise => image.rotate90(),
        Rotation::CounterClockwise => image.rotate270(),
    }
}

/// Crop the region of interest, clamped to the image bounds.
pub fn crop_roi(image: &DynamicImage, roi: Roi) -> Result<DynamicImage, ImagingError> {
    let (width, height) = (image.width(), image.height());
    let (x_min, y_min, x_max, y_max) = roi.to_pixels(width, height);
    let (x_max, y_max) = (x_max.min(width), y_max.min(height));

    if x_max <= x_min || y_max <= y_min {
        return Err(ImagingError::EmptyRoi { roi, width, height });
    }

    Ok(image.crop_imm(x_min, y_min, x_max - x_min, y_max - y_min))
}

/// Encode as baseline RGB JPEG, the format embedded into output PDFs.
pub fn encode_jpeg(image: &DynamicImage) -> Result<Vec<u8>, ImagingError> {
    let rgb = image.to_rgb8();
    let mut buffer = Vec::new();
    let encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, PAYLOAD_JPEG_QUALITY);
    rgb.write_with_encoder(encoder)?;
    Ok(buffer)
}

/// Read the pixel dimensions of an encoded image without decoding it.
pub fn encoded_dimensions(bytes: &[u8]) -> Result<(u32, u32), ImagingError> {
    let reader = ImageReader::with_format(Cursor::new(bytes), ImageFormat::Jpeg);
    Ok(reader.into_dimensions()?)
}
