//! OCR engine abstraction.
//!
//! The pipeline only needs "image region in, text out". Engines must be
//! safe to call from many workers at once and keep no state across calls.

use image::DynamicImage;
use thiserror::Error;

/// Errors raised by an OCR engine.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR backend not available: {0}")]
    BackendNotAvailable(String),

    #[error("OCR failed: {0}")]
    OcrFailed(String),

    #[error("Image error: {0}")]
    Image(#[from] crate::imaging::ImagingError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which of the two passes a worker is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrPass {
    /// Whole page, automatic segmentation. Used for term markers and text volume.
    Coarse,
    /// ROI only, tuned for a single block of text.
    Fine,
}

/// Text-extraction capability.
pub trait OcrEngine: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Check if the engine can run on this machine.
    fn is_available(&self) -> bool;

    /// Human-readable installation hint.
    fn availability_hint(&self) -> String;

    /// Extract text from an image (or image region).
    fn extract_text(&self, image: &DynamicImage, pass: OcrPass) -> Result<String, OcrError>;
}
