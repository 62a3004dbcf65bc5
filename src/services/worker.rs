//! Per-image OCR worker.
//!
//! Runs on the blocking pool. Given one image it straightens sideways scans,
//! looks for term markers on the whole page, reads the sheet number from the
//! ROI, and returns a self-contained `OcrOutcome`. It never touches pipeline
//! state, never writes files, never logs, and never returns an error: failures
//! become `worker_error`.

use std::path::Path;
use std::sync::Arc;

use image::DynamicImage;

use crate::config::{OcrSettings, Roi};
use crate::imaging::{self, Rotation};
use crate::models::{file_name_of, OcrOutcome, PageTask};
use crate::ocr::{
    detect_term, extract_sheet_number, has_sheet_number, OcrEngine, OcrError, OcrPass,
};

/// Immutable snapshot of the OCR parameters a worker needs.
#[derive(Debug, Clone)]
pub struct WorkerParams {
    pub roi: Roi,
    pub max_pages: u32,
    pub opening_markers: Vec<String>,
    pub closing_markers: Vec<String>,
}

impl WorkerParams {
    pub fn new(ocr: &OcrSettings, max_pages: u32) -> Self {
        Self {
            roi: ocr.roi,
            max_pages,
            opening_markers: ocr.opening_markers.clone(),
            closing_markers: ocr.closing_markers.clone(),
        }
    }
}

/// OCR worker shared by every task of a run.
pub struct PageOcrWorker {
    engine: Arc<dyn OcrEngine>,
    params: WorkerParams,
}

impl PageOcrWorker {
    pub fn new(engine: Arc<dyn OcrEngine>, params: WorkerParams) -> Self {
        Self { engine, params }
    }

    /// Process one task. Always returns an outcome.
    ///
    /// A failed outcome still carries the unrotated page when it can be
    /// decoded, so an error page can be saved for later inspection.
    pub fn process(&self, task: &PageTask) -> OcrOutcome {
        match self.try_process(&task.source_path) {
            Ok(outcome) => outcome,
            Err(e) => Self::failed(task, e.to_string()),
        }
    }

    /// Failed outcome carrying the unrotated source page, or no payload if
    /// the source cannot be decoded either.
    pub fn failed(task: &PageTask, error: impl Into<String>) -> OcrOutcome {
        let mut outcome = OcrOutcome::failed(task.filename(), error);
        outcome.image_payload = imaging::load(&task.source_path)
            .and_then(|image| imaging::encode_jpeg(&image))
            .unwrap_or_default();
        outcome
    }

    fn try_process(&self, path: &Path) -> Result<OcrOutcome, OcrError> {
        let image = imaging::load(path)?;
        let image = self.straighten(image);
        let (candidate_page, full_text) = self.read_page(&image)?;
        let image_payload = imaging::encode_jpeg(&image)?;

        Ok(OcrOutcome {
            source_filename: file_name_of(path),
            candidate_page,
            full_text,
            image_payload,
            worker_error: None,
        })
    }

    /// Turn a landscape scan upright.
    ///
    /// Clockwise is kept when the ROI of that orientation shows a sheet
    /// number; otherwise the original is turned the other way.
    fn straighten(&self, image: DynamicImage) -> DynamicImage {
        if !imaging::is_landscape(&image) {
            return image;
        }

        let clockwise = imaging::rotate(&image, Rotation::Clockwise);
        if self.roi_shows_number(&clockwise) {
            clockwise
        } else {
            imaging::rotate(&image, Rotation::CounterClockwise)
        }
    }

    /// Rotation probe. Any failure counts as "no number here".
    fn roi_shows_number(&self, image: &DynamicImage) -> bool {
        imaging::crop_roi(image, self.params.roi)
            .ok()
            .and_then(|roi| self.engine.extract_text(&roi, OcrPass::Fine).ok())
            .map(|text| has_sheet_number(&text))
            .unwrap_or(false)
    }

    /// Coarse full-page pass for term markers, then fine ROI pass for the number.
    fn read_page(&self, image: &DynamicImage) -> Result<(Option<u32>, String), OcrError> {
        let full_text = self.engine.extract_text(image, OcrPass::Coarse)?;

        if let Some(term) = detect_term(
            &full_text,
            &self.params.opening_markers,
            &self.params.closing_markers,
        ) {
            return Ok((Some(term.page_number(self.params.max_pages)), full_text));
        }

        let roi = imaging::crop_roi(image, self.params.roi)?;
        let roi_text = self.engine.extract_text(&roi, OcrPass::Fine)?;
        Ok((extract_sheet_number(&roi_text), full_text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::sync::Mutex;

    /// Engine that answers by pass and records the image sizes it saw.
    struct FakeEngine {
        coarse: String,
        fine: String,
        /// Fine-pass text used while the image is taller than wide.
        fine_when_portrait_cw: Option<String>,
        fail_coarse: bool,
        seen: Mutex<Vec<(OcrPass, u32, u32)>>,
    }

    impl FakeEngine {
        fn new(coarse: &str, fine: &str) -> Self {
            Self {
                coarse: coarse.to_string(),
                fine: fine.to_string(),
                fine_when_portrait_cw: None,
                fail_coarse: false,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl OcrEngine for FakeEngine {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn is_available(&self) -> bool {
            true
        }

        fn availability_hint(&self) -> String {
            String::new()
        }

        fn extract_text(&self, image: &DynamicImage, pass: OcrPass) -> Result<String, OcrError> {
            let mut seen = self.seen.lock().unwrap();
            seen.push((pass, image.width(), image.height()));
            match pass {
                OcrPass::Coarse if self.fail_coarse => {
                    Err(OcrError::OcrFailed("engine crashed".to_string()))
                }
                OcrPass::Coarse => Ok(self.coarse.clone()),
                OcrPass::Fine => {
                    // First fine call on a landscape input is the rotation probe
                    if seen.len() == 1 {
                        if let Some(ref probe) = self.fine_when_portrait_cw {
                            return Ok(probe.clone());
                        }
                    }
                    Ok(self.fine.clone())
                }
            }
        }
    }

    fn write_image(dir: &Path, name: &str, width: u32, height: u32) -> PageTask {
        let path = dir.join(name);
        let mut img = RgbImage::from_pixel(width, height, Rgb([250, 250, 250]));
        img.put_pixel(0, 0, Rgb([0, 0, 0]));
        DynamicImage::ImageRgb8(img)
            .save_with_format(&path, ImageFormat::Jpeg)
            .unwrap();
        PageTask::new(path, 0)
    }

    fn worker(engine: Arc<FakeEngine>) -> PageOcrWorker {
        PageOcrWorker::new(engine, WorkerParams::new(&OcrSettings::default(), 300))
    }

    #[test]
    fn test_reads_sheet_number_from_roi() {
        let dir = tempfile::tempdir().unwrap();
        let task = write_image(dir.path(), "a.jpg", 100, 200);
        let engine = Arc::new(FakeEngine::new("corpo do texto", "FL. 17"));

        let outcome = worker(engine.clone()).process(&task);
        assert_eq!(outcome.worker_error, None);
        assert_eq!(outcome.candidate_page, Some(17));
        assert_eq!(outcome.full_text, "corpo do texto");
        assert_eq!(outcome.source_filename, "a.jpg");
        assert_eq!(
            imaging::encoded_dimensions(&outcome.image_payload).unwrap(),
            (100, 200)
        );

        let seen = engine.seen.lock().unwrap();
        assert_eq!(seen[0], (OcrPass::Coarse, 100, 200));
        // ROI of a 100x200 page: x 45..95, y 10..50
        assert_eq!(seen[1], (OcrPass::Fine, 50, 40));
    }

    #[test]
    fn test_term_marker_skips_roi_pass() {
        let dir = tempfile::tempdir().unwrap();
        let task = write_image(dir.path(), "c.jpg", 100, 200);

        let engine = Arc::new(FakeEngine::new("TERMO DE ENCERRAMENTO deste livro", "FL 3"));
        let outcome = worker(engine.clone()).process(&task);
        assert_eq!(outcome.candidate_page, Some(301));
        assert_eq!(engine.seen.lock().unwrap().len(), 1);

        let engine = Arc::new(FakeEngine::new("Termo de Abertura", "FL 3"));
        let outcome = worker(engine).process(&task);
        assert_eq!(outcome.candidate_page, Some(0));
    }

    #[test]
    fn test_landscape_keeps_clockwise_when_probe_finds_number() {
        let dir = tempfile::tempdir().unwrap();
        let task = write_image(dir.path(), "l.jpg", 200, 100);
        let mut engine = FakeEngine::new("", "FOLHA 4");
        engine.fine_when_portrait_cw = Some("FOLHA 4".to_string());
        let engine = Arc::new(engine);

        let outcome = worker(engine.clone()).process(&task);
        assert_eq!(outcome.candidate_page, Some(4));
        assert_eq!(
            imaging::encoded_dimensions(&outcome.image_payload).unwrap(),
            (100, 200)
        );
        // probe + coarse + fine
        assert_eq!(engine.seen.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_landscape_falls_back_to_counter_clockwise() {
        let dir = tempfile::tempdir().unwrap();
        let task = write_image(dir.path(), "l.jpg", 200, 100);
        let mut engine = FakeEngine::new("", "");
        engine.fine_when_portrait_cw = Some("nothing".to_string());

        let outcome = worker(Arc::new(engine)).process(&task);
        assert_eq!(outcome.candidate_page, None);
        assert_eq!(outcome.worker_error, None);

        // Dark pixel at (0,0) lands bottom-left after a counter-clockwise turn
        let img = image::load_from_memory(&outcome.image_payload).unwrap().to_rgb8();
        assert_eq!((img.width(), img.height()), (100, 200));
        assert!(img.get_pixel(0, 199)[0] < 128);
    }

    #[test]
    fn test_failures_become_data() {
        let dir = tempfile::tempdir().unwrap();
        let missing = PageTask::new(dir.path().join("gone.jpg"), 0);
        let outcome = worker(Arc::new(FakeEngine::new("", ""))).process(&missing);
        assert_eq!(outcome.source_filename, "gone.jpg");
        assert!(outcome.worker_error.is_some());
        assert_eq!(outcome.candidate_page, None);
        assert!(outcome.image_payload.is_empty());

        let task = write_image(dir.path(), "a.jpg", 100, 200);
        let mut engine = FakeEngine::new("", "FL 1");
        engine.fail_coarse = true;
        let outcome = worker(Arc::new(engine)).process(&task);
        assert!(outcome
            .worker_error
            .as_deref()
            .unwrap()
            .contains("engine crashed"));
        assert_eq!(
            imaging::encoded_dimensions(&outcome.image_payload).unwrap(),
            (100, 200)
        );
    }
}
