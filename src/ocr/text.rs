//! Parsing of OCR text: sheet numbers and term markers.

use std::sync::LazyLock;

use regex::Regex;

/// "FOLHA 12", "FL. 12", "FL: 012", "fl 3" ...
static SHEET_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(FOLHA|FL)\s*[:.\s]*(\d+)").unwrap());

/// Kind of term page detected on the full page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermMarker {
    Opening,
    Closing,
}

impl TermMarker {
    /// Sentinel page number for this term.
    pub fn page_number(&self, max_pages: u32) -> u32 {
        match self {
            Self::Opening => 0,
            Self::Closing => max_pages + 1,
        }
    }
}

/// Extract the sheet number from OCR text, if a `FOLHA`/`FL` token is present.
pub fn extract_sheet_number(text: &str) -> Option<u32> {
    let upper = text.to_uppercase();
    let caps = SHEET_NUMBER.captures(&upper)?;
    caps.get(2)?.as_str().parse().ok()
}

/// Whether the text carries a sheet-number token at all.
pub fn has_sheet_number(text: &str) -> bool {
    SHEET_NUMBER.is_match(&text.to_uppercase())
}

/// Look for opening or closing markers. Opening wins if both appear.
pub fn detect_term(text: &str, opening: &[String], closing: &[String]) -> Option<TermMarker> {
    let upper = text.to_uppercase();
    let contains_any = |markers: &[String]| {
        markers
            .iter()
            .any(|m| !m.is_empty() && upper.contains(&m.to_uppercase()))
    };

    if contains_any(opening) {
        Some(TermMarker::Opening)
    } else if contains_any(closing) {
        Some(TermMarker::Closing)
    } else {
        None
    }
}
