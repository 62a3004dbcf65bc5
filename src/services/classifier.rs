//! Page classification policy.
//!
//! A pure function of the OCR outcome and the coordinator's state. Rules are
//! applied in order and the first match wins:
//!
//! 1. a worker error discards any candidate number;
//! 2. a manual correction for the base filename replaces the candidate;
//! 3. a number already on disk is a cache-skip;
//! 4. no number: near-blank text after a known page is that page's verso,
//!    anything else is unresolved;
//! 5. 0 is the opening term, `max_pages + 1` the closing term, anything else
//!    a regular page.

use crate::models::{OcrOutcome, PageDisposition, PipelineState};

/// Tunables the classifier needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifierPolicy {
    pub max_pages: u32,
    /// Non-whitespace characters below which an unnumbered page is a verso.
    pub back_page_threshold: usize,
}

/// Result of classifying one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Must be written (or escalated, for `Unresolved`).
    Page(PageDisposition),
    /// Already materialized; counts for numbering but is not rewritten.
    CacheSkip(PageDisposition),
}

impl Classification {
    pub fn disposition(&self) -> PageDisposition {
        match *self {
            Self::Page(d) | Self::CacheSkip(d) => d,
        }
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, Self::Page(PageDisposition::Unresolved))
    }
}

/// Classify an OCR outcome against the current pipeline state.
pub fn classify(
    outcome: &OcrOutcome,
    state: &PipelineState,
    policy: &ClassifierPolicy,
) -> Classification {
    let mut candidate = if outcome.worker_error.is_some() {
        None
    } else {
        outcome.candidate_page
    };

    if let Some(manual) = state.manual_correction(&outcome.base_filename()) {
        candidate = Some(manual);
    }

    match candidate {
        Some(number) => resolve_number(number, state, policy),
        None if outcome.worker_error.is_none() => infer_back_page(outcome, state, policy),
        None => Classification::Page(PageDisposition::Unresolved),
    }
}

/// Classify a known page number (from OCR or a human), including the cache check.
pub fn resolve_number(
    number: u32,
    state: &PipelineState,
    policy: &ClassifierPolicy,
) -> Classification {
    let disposition = PageDisposition::from_number(number, policy.max_pages);
    if state.processed.contains(number) {
        Classification::CacheSkip(disposition)
    } else {
        Classification::Page(disposition)
    }
}

/// Back-page heuristic for pages without a readable number.
fn infer_back_page(
    outcome: &OcrOutcome,
    state: &PipelineState,
    policy: &ClassifierPolicy,
) -> Classification {
    let last = state.last_confirmed;
    if outcome.stripped_text_len() < policy.back_page_threshold && last > 0 {
        let disposition = PageDisposition::BackPage(last);
        if state.processed.contains_verso(last) {
            Classification::CacheSkip(disposition)
        } else {
            Classification::Page(disposition)
        }
    } else {
        Classification::Page(PageDisposition::Unresolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: ClassifierPolicy = ClassifierPolicy {
        max_pages: 300,
        back_page_threshold: 250,
    };

    fn outcome(name: &str, candidate: Option<u32>, text: &str) -> OcrOutcome {
        OcrOutcome {
            source_filename: name.to_string(),
            candidate_page: candidate,
            full_text: text.to_string(),
            ..Default::default()
        }
    }

    fn long_text() -> String {
        "palavra ".repeat(100)
    }

    #[test]
    fn test_regular_and_terms() {
        let state = PipelineState::new();
        assert_eq!(
            classify(&outcome("a.jpg", Some(5), ""), &state, &POLICY),
            Classification::Page(PageDisposition::Regular(5))
        );
        assert_eq!(
            classify(&outcome("a.jpg", Some(0), ""), &state, &POLICY),
            Classification::Page(PageDisposition::OpeningTerm)
        );
        assert_eq!(
            classify(&outcome("a.jpg", Some(301), ""), &state, &POLICY),
            Classification::Page(PageDisposition::ClosingTerm)
        );
    }

    #[test]
    fn test_back_page_uses_last_confirmed() {
        let state = PipelineState::starting_after(5);
        assert_eq!(
            classify(&outcome("b.jpg", None, "  \n x "), &state, &POLICY),
            Classification::Page(PageDisposition::BackPage(5))
        );
    }

    #[test]
    fn test_back_page_requires_known_previous_page() {
        let state = PipelineState::new();
        assert!(classify(&outcome("b.jpg", None, ""), &state, &POLICY).is_unresolved());
    }

    #[test]
    fn test_long_unnumbered_text_is_unresolved() {
        let state = PipelineState::starting_after(5);
        assert!(classify(&outcome("b.jpg", None, &long_text()), &state, &POLICY).is_unresolved());
    }

    #[test]
    fn test_worker_error_is_unresolved_even_when_blank() {
        let state = PipelineState::starting_after(5);
        let mut failed = OcrOutcome::failed("x.jpg", "decode error");
        failed.candidate_page = Some(9);
        assert!(classify(&failed, &state, &POLICY).is_unresolved());
    }

    #[test]
    fn test_manual_correction_overrides_ocr_and_errors() {
        let mut state = PipelineState::new();
        state.manual_corrections.insert("x".to_string(), 12);

        assert_eq!(
            classify(&outcome("x.jpg", Some(99), ""), &state, &POLICY),
            Classification::Page(PageDisposition::Regular(12))
        );
        assert_eq!(
            classify(&OcrOutcome::failed("x.jpeg", "boom"), &state, &POLICY),
            Classification::Page(PageDisposition::Regular(12))
        );
    }

    #[test]
    fn test_manual_correction_still_hits_cache() {
        let mut state = PipelineState::new();
        state.manual_corrections.insert("x".to_string(), 12);
        state.processed.insert(12);
        assert_eq!(
            classify(&outcome("x.jpg", None, ""), &state, &POLICY),
            Classification::CacheSkip(PageDisposition::Regular(12))
        );
    }

    #[test]
    fn test_cache_skip_for_processed_numbers() {
        let mut state = PipelineState::new();
        state.processed.insert(10);
        state.processed.insert(301);
        assert_eq!(
            classify(&outcome("a.jpg", Some(10), ""), &state, &POLICY),
            Classification::CacheSkip(PageDisposition::Regular(10))
        );
        assert_eq!(
            classify(&outcome("a.jpg", Some(301), ""), &state, &POLICY),
            Classification::CacheSkip(PageDisposition::ClosingTerm)
        );
    }

    #[test]
    fn test_existing_verso_is_cache_skip() {
        let mut state = PipelineState::starting_after(7);
        state.processed.insert(7);
        assert_eq!(
            classify(&outcome("b.jpg", None, ""), &state, &POLICY),
            Classification::Page(PageDisposition::BackPage(7))
        );

        state.processed.insert_verso(7);
        assert_eq!(
            classify(&outcome("b.jpg", None, ""), &state, &POLICY),
            Classification::CacheSkip(PageDisposition::BackPage(7))
        );
    }

    #[test]
    fn test_threshold_is_strict() {
        let policy = ClassifierPolicy {
            back_page_threshold: 3,
            ..POLICY
        };
        let state = PipelineState::starting_after(2);
        assert_eq!(
            classify(&outcome("b.jpg", None, "a b"), &state, &policy),
            Classification::Page(PageDisposition::BackPage(2))
        );
        assert!(classify(&outcome("b.jpg", None, "abc"), &state, &policy).is_unresolved());
    }
}
