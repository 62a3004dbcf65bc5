//! Page writer: one PDF per finalized page.

use std::io::Write;
use std::path::PathBuf;

use lopdf::{dictionary, Document, Object, Stream};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::imaging::{self, ImagingError};
use crate::models::{FinalizedPage, PageDisposition};

pub const OPENING_TERM_FILENAME: &str = "TERMO DE ABERTURA.pdf";
pub const CLOSING_TERM_FILENAME: &str = "TERMO DE ENCERRAMENTO.pdf";
pub const UNRESOLVED_PREFIX: &str = "ERRO_OCR_";

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("No image payload for {0}")]
    EmptyPayload(String),

    #[error("Invalid image payload: {0}")]
    Image(#[from] ImagingError),

    #[error("Failed to build PDF: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Output filename for a page.
///
/// Distinct dispositions always map to distinct names; unresolved pages are
/// keyed by their source base filename.
pub fn output_filename(disposition: PageDisposition, base_filename: &str) -> String {
    match disposition {
        PageDisposition::Regular(n) => format!("FL. {:03}.pdf", n),
        PageDisposition::BackPage(n) => format!("FL. {:03}-verso.pdf", n),
        PageDisposition::OpeningTerm => OPENING_TERM_FILENAME.to_string(),
        PageDisposition::ClosingTerm => CLOSING_TERM_FILENAME.to_string(),
        PageDisposition::Unresolved => format!("{}{}.pdf", UNRESOLVED_PREFIX, base_filename),
    }
}

/// Renders finalized pages into the output directory.
#[derive(Debug, Clone)]
pub struct PageWriter {
    output_dir: PathBuf,
    /// Pixels per inch used to size the PDF page.
    resolution: f32,
}

impl PageWriter {
    pub fn new(output_dir: impl Into<PathBuf>, resolution: f32) -> Self {
        Self {
            output_dir: output_dir.into(),
            resolution,
        }
    }

    /// Write the page and return its final path.
    ///
    /// The PDF is assembled in a temporary file inside the output directory
    /// and renamed into place, so a failed write never leaves a partial file
    /// under the final name.
    pub fn write(&self, page: &FinalizedPage) -> Result<PathBuf, WriteError> {
        if page.image_payload.is_empty() {
            return Err(WriteError::EmptyPayload(page.output_filename.clone()));
        }

        let mut document = self.render(&page.image_payload)?;

        let target = self.output_dir.join(&page.output_filename);
        let mut file = NamedTempFile::new_in(&self.output_dir)?;
        document.save_to(&mut file)?;
        file.flush()?;
        file.persist(&target).map_err(|e| e.error)?;

        Ok(target)
    }

    /// Build a one-page PDF showing the JPEG at the configured resolution.
    fn render(&self, jpeg: &[u8]) -> Result<Document, WriteError> {
        let (width_px, height_px) = imaging::encoded_dimensions(jpeg)?;
        let width = width_px as f32 * 72.0 / self.resolution;
        let height = height_px as f32 * 72.0 / self.resolution;

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        // JPEG bytes go in as-is
        let image = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width_px as i64,
                "Height" => height_px as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg.to_vec(),
        )
        .with_compression(false);
        let image_id = doc.add_object(image);

        let content = format!("q\n{:.2} 0 0 {:.2} 0 0 cm\n/Im0 Do\nQ\n", width, height);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), Object::Real(width), Object::Real(height)],
            "Resources" => dictionary! {
                "XObject" => dictionary! {
                    "Im0" => image_id,
                },
            },
            "Contents" => content_id,
        });

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        Ok(doc)
    }
}
