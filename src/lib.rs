//! sheetsort - turn scanned book sheets into one PDF per numbered page.
//!
//! Scanned front/back images of a bound book are OCR'd in parallel, then
//! consumed strictly in filename order so that page numbering, back-page
//! inference, duplicate detection and manual corrections all see the
//! previous file's resolved number.

pub mod cli;
pub mod config;
pub mod imaging;
pub mod models;
pub mod ocr;
pub mod services;
