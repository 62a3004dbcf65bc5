//! Per-page models flowing through the pipeline.
//!
//! A `PageTask` is created for every input image, a worker turns it into an
//! `OcrOutcome`, the classifier derives a `PageDisposition`, and the writer
//! receives a `FinalizedPage`.

use std::path::{Path, PathBuf};

/// One discovered input image, in processing order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTask {
    /// Full path to the source image.
    pub source_path: PathBuf,
    /// Position in filename order (0-based).
    pub sequence_index: usize,
}

impl PageTask {
    pub fn new(source_path: PathBuf, sequence_index: usize) -> Self {
        Self {
            source_path,
            sequence_index,
        }
    }

    /// File name including extension (e.g. `IMG_0001.jpg`).
    pub fn filename(&self) -> String {
        file_name_of(&self.source_path)
    }

    /// File name without extension (e.g. `IMG_0001`).
    pub fn base_filename(&self) -> String {
        base_name_of(&self.filename())
    }
}

/// Result of OCR for a single image, produced exactly once per task.
///
/// Worker failures are carried in `worker_error` rather than raised, so the
/// coordinator always receives a value.
#[derive(Debug, Clone, Default)]
pub struct OcrOutcome {
    pub source_filename: String,
    /// Page number read from the ROI, or a term sentinel (0 / max+1).
    pub candidate_page: Option<u32>,
    /// Coarse full-page text, used by the back-page heuristic.
    pub full_text: String,
    /// The (possibly rotated) page encoded as JPEG.
    pub image_payload: Vec<u8>,
    pub worker_error: Option<String>,
}

impl OcrOutcome {
    /// Outcome for a worker that could not process its image.
    pub fn failed(source_filename: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            source_filename: source_filename.into(),
            worker_error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn base_filename(&self) -> String {
        base_name_of(&self.source_filename)
    }

    /// Character count of the full-page text, ignoring all whitespace.
    pub fn stripped_text_len(&self) -> usize {
        self.full_text.chars().filter(|c| !c.is_whitespace()).count()
    }
}

/// What a consumed page turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageDisposition {
    Regular(u32),
    OpeningTerm,
    ClosingTerm,
    /// Near-blank verso of the given front page.
    BackPage(u32),
    Unresolved,
}

impl PageDisposition {
    /// Map a resolved page number onto a disposition.
    ///
    /// 0 is the opening term and `max_pages + 1` the closing term.
    pub fn from_number(number: u32, max_pages: u32) -> Self {
        if number == 0 {
            Self::OpeningTerm
        } else if number == max_pages + 1 {
            Self::ClosingTerm
        } else {
            Self::Regular(number)
        }
    }

    /// The page number this disposition stands for, sentinels included.
    pub fn page_number(&self, max_pages: u32) -> Option<u32> {
        match *self {
            Self::Regular(n) | Self::BackPage(n) => Some(n),
            Self::OpeningTerm => Some(0),
            Self::ClosingTerm => Some(max_pages + 1),
            Self::Unresolved => None,
        }
    }

    /// Number that moves the "last confirmed page" cursor, if any.
    ///
    /// Term pages and out-of-range numbers never advance it.
    pub fn cursor_number(&self, max_pages: u32) -> Option<u32> {
        match *self {
            Self::Regular(n) | Self::BackPage(n) if n > 0 && n <= max_pages => Some(n),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Regular(_) => "regular",
            Self::OpeningTerm => "opening term",
            Self::ClosingTerm => "closing term",
            Self::BackPage(_) => "back page",
            Self::Unresolved => "unresolved",
        }
    }
}

impl std::fmt::Display for PageDisposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Regular(n) => write!(f, "page {:03}", n),
            Self::BackPage(n) => write!(f, "page {:03} (verso)", n),
            other => f.write_str(other.label()),
        }
    }
}

/// A page ready to be written to disk.
#[derive(Debug, Clone)]
pub struct FinalizedPage {
    pub output_filename: String,
    pub image_payload: Vec<u8>,
    pub disposition: PageDisposition,
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub(crate) fn base_name_of(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_names() {
        let task = PageTask::new(PathBuf::from("/scans/IMG_0007.JPG"), 3);
        assert_eq!(task.filename(), "IMG_0007.JPG");
        assert_eq!(task.base_filename(), "IMG_0007");
    }

    #[test]
    fn test_stripped_text_len_ignores_whitespace() {
        let outcome = OcrOutcome {
            full_text: " a b\n\tc \r\n".to_string(),
            ..Default::default()
        };
        assert_eq!(outcome.stripped_text_len(), 3);
    }

    #[test]
    fn test_failed_outcome_has_no_candidate() {
        let outcome = OcrOutcome::failed("x.jpg", "boom");
        assert_eq!(outcome.candidate_page, None);
        assert_eq!(outcome.worker_error.as_deref(), Some("boom"));
        assert_eq!(outcome.base_filename(), "x");
    }

    #[test]
    fn test_from_number_sentinels() {
        assert_eq!(PageDisposition::from_number(0, 300), PageDisposition::OpeningTerm);
        assert_eq!(PageDisposition::from_number(301, 300), PageDisposition::ClosingTerm);
        assert_eq!(PageDisposition::from_number(42, 300), PageDisposition::Regular(42));
    }

    #[test]
    fn test_cursor_number_excludes_terms_and_out_of_range() {
        assert_eq!(PageDisposition::Regular(5).cursor_number(300), Some(5));
        assert_eq!(PageDisposition::BackPage(5).cursor_number(300), Some(5));
        assert_eq!(PageDisposition::OpeningTerm.cursor_number(300), None);
        assert_eq!(PageDisposition::ClosingTerm.cursor_number(300), None);
        assert_eq!(PageDisposition::Regular(400).cursor_number(300), None);
        assert_eq!(PageDisposition::Unresolved.cursor_number(300), None);
    }
}
