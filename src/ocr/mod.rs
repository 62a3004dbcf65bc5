//! OCR capability and text parsing.
//!
//! Tesseract is the only shipped engine. The `OcrEngine` trait is the seam
//! the worker pool calls through, so tests and alternative engines can be
//! swapped in without touching the pipeline.

mod backend;
mod tesseract;
mod text;
mod tools;

pub use backend::{OcrEngine, OcrError, OcrPass};
pub use tesseract::TesseractBackend;
pub use text::{detect_term, extract_sheet_number, has_sheet_number, TermMarker};
pub use tools::{check_binary, check_tools};
