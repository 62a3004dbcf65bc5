//! Mutable pipeline state, owned by the coordinator alone.

use std::collections::{BTreeSet, HashMap};

use super::page::PageDisposition;

/// Page numbers already materialized as output files.
///
/// Term pages are stored under their sentinels (0 and `max_pages + 1`).
/// Verso files are tracked separately so a re-run does not rewrite them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessedPages {
    numbers: BTreeSet<u32>,
    versos: BTreeSet<u32>,
}

impl ProcessedPages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, number: u32) -> bool {
        self.numbers.contains(&number)
    }

    pub fn contains_verso(&self, number: u32) -> bool {
        self.versos.contains(&number)
    }

    pub fn insert(&mut self, number: u32) {
        self.numbers.insert(number);
    }

    pub fn insert_verso(&mut self, number: u32) {
        self.numbers.insert(number);
        self.versos.insert(number);
    }

    /// Record a successfully written page.
    pub fn record(&mut self, disposition: PageDisposition, max_pages: u32) {
        match disposition {
            PageDisposition::BackPage(n) => self.insert_verso(n),
            PageDisposition::Unresolved => {}
            other => {
                if let Some(n) = other.page_number(max_pages) {
                    self.insert(n);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.numbers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty()
    }

    pub fn numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.numbers.iter().copied()
    }

    pub fn versos(&self) -> impl Iterator<Item = u32> + '_ {
        self.versos.iter().copied()
    }
}

/// State threaded through sequential consumption.
///
/// Workers never see this; it is only read and written by the coordinator.
#[derive(Debug, Clone, Default)]
pub struct PipelineState {
    pub last_confirmed: u32,
    /// Manual page numbers keyed by base filename, sticky for the whole run.
    pub manual_corrections: HashMap<String, u32>,
    pub processed: ProcessedPages,
}

impl PipelineState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed state with the last page confirmed by an earlier run.
    pub fn starting_after(last_confirmed: u32) -> Self {
        Self {
            last_confirmed,
            ..Default::default()
        }
    }

    pub fn manual_correction(&self, base_filename: &str) -> Option<u32> {
        self.manual_corrections.get(base_filename).copied()
    }

    /// Move the cursor if the disposition is an in-range regular or verso page.
    pub fn advance(&mut self, disposition: PageDisposition, max_pages: u32) -> bool {
        match disposition.cursor_number(max_pages) {
            Some(n) => {
                self.last_confirmed = n;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_tracks_versos_separately() {
        let mut processed = ProcessedPages::new();
        processed.record(PageDisposition::Regular(5), 300);
        assert!(processed.contains(5));
        assert!(!processed.contains_verso(5));

        processed.record(PageDisposition::BackPage(5), 300);
        assert!(processed.contains_verso(5));
        assert_eq!(processed.len(), 1);
    }

    #[test]
    fn test_record_terms_use_sentinels() {
        let mut processed = ProcessedPages::new();
        processed.record(PageDisposition::OpeningTerm, 300);
        processed.record(PageDisposition::ClosingTerm, 300);
        processed.record(PageDisposition::Unresolved, 300);
        assert_eq!(processed.numbers().collect::<Vec<_>>(), vec![0, 301]);
    }

    #[test]
    fn test_advance_ignores_terms() {
        let mut state = PipelineState::starting_after(4);
        assert!(!state.advance(PageDisposition::ClosingTerm, 300));
        assert_eq!(state.last_confirmed, 4);
        assert!(state.advance(PageDisposition::Regular(9), 300));
        assert_eq!(state.last_confirmed, 9);
    }
}
