//! Tesseract OCR backend implementation.
//!
//! Uses Tesseract via command-line for text extraction. Each call runs in its
//! own child process, so an engine crash surfaces as a failed command.

use std::path::Path;
use std::process::Command;

use image::DynamicImage;
use tempfile::TempDir;

use super::backend::{OcrEngine, OcrError, OcrPass};
use super::tools::check_binary;
use crate::config::OcrSettings;

/// Tesseract OCR backend.
pub struct TesseractBackend {
    language: String,
    oem: u8,
    psm: u8,
    coarse_psm: u8,
}

impl TesseractBackend {
    /// Create a backend with the default Portuguese configuration.
    pub fn new() -> Self {
        Self::with_settings(&OcrSettings::default())
    }

    pub fn with_settings(settings: &OcrSettings) -> Self {
        Self {
            language: settings.language.clone(),
            oem: settings.oem,
            psm: settings.psm,
            coarse_psm: settings.coarse_psm,
        }
    }

    fn psm_for(&self, pass: OcrPass) -> u8 {
        match pass {
            OcrPass::Coarse => self.coarse_psm,
            OcrPass::Fine => self.psm,
        }
    }

    /// Run Tesseract on an image file.
    fn run_tesseract(&self, image_path: &Path, psm: u8) -> Result<String, OcrError> {
        let output = Command::new("tesseract")
            .arg(image_path)
            .arg("stdout")
            .args(["--oem", &self.oem.to_string()])
            .args(["--psm", &psm.to_string()])
            .args(["-l", &self.language])
            .output();

        match output {
            Ok(output) => {
                if output.status.success() {
                    Ok(String::from_utf8_lossy(&output.stdout).to_string())
                } else {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    Err(OcrError::OcrFailed(format!("tesseract failed: {}", stderr.trim())))
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(OcrError::BackendNotAvailable(
                    "tesseract not found (install tesseract-ocr)".to_string(),
                ))
            }
            Err(e) => Err(OcrError::Io(e)),
        }
    }
}

impl Default for TesseractBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrEngine for TesseractBackend {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn is_available(&self) -> bool {
        check_binary("tesseract")
    }

    fn availability_hint(&self) -> String {
        if !check_binary("tesseract") {
            "Tesseract not installed. Install with: apt install tesseract-ocr tesseract-ocr-por"
                .to_string()
        } else {
            format!("Tesseract is available (language: {})", self.language)
        }
    }

    fn extract_text(&self, image: &DynamicImage, pass: OcrPass) -> Result<String, OcrError> {
        // Tesseract reads from disk; the temp dir is removed on drop
        let temp_dir = TempDir::new()?;
        let image_path = temp_dir.path().join("region.png");
        image
            .save_with_format(&image_path, image::ImageFormat::Png)
            .map_err(|e| OcrError::OcrFailed(format!("failed to stage image: {}", e)))?;

        self.run_tesseract(&image_path, self.psm_for(pass))
    }
}
