//! Run-level results.

use std::path::PathBuf;

use super::page::PageDisposition;
use super::state::PipelineState;

/// How a run ended. Infrastructure failures are reported as errors instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Cancelled,
}

/// Final disposition of one consumed input file.
#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    Written {
        disposition: PageDisposition,
        path: PathBuf,
    },
    CacheSkipped {
        disposition: PageDisposition,
    },
    WriteFailed {
        disposition: PageDisposition,
        error: String,
    },
}

impl PageOutcome {
    pub fn disposition(&self) -> PageDisposition {
        match self {
            Self::Written { disposition, .. }
            | Self::CacheSkipped { disposition }
            | Self::WriteFailed { disposition, .. } => *disposition,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PageRecord {
    pub source_filename: String,
    pub outcome: PageOutcome,
    /// Worker failure reported for this file, if any.
    pub worker_error: Option<String>,
    pub manually_corrected: bool,
}

/// Summary returned by the coordinator.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub status: RunStatus,
    /// Number of input files discovered.
    pub discovered: usize,
    pub pages: Vec<PageRecord>,
    pub state: PipelineState,
}

impl RunReport {
    pub fn written(&self) -> usize {
        self.count(|o| matches!(o, PageOutcome::Written { .. }))
    }

    pub fn cache_skipped(&self) -> usize {
        self.count(|o| matches!(o, PageOutcome::CacheSkipped { .. }))
    }

    pub fn write_failures(&self) -> usize {
        self.count(|o| matches!(o, PageOutcome::WriteFailed { .. }))
    }

    /// Pages saved under an `ERRO_OCR_` name.
    pub fn unresolved(&self) -> usize {
        self.count(|o| {
            matches!(
                o,
                PageOutcome::Written {
                    disposition: PageDisposition::Unresolved,
                    ..
                }
            )
        })
    }

    /// Files that were never consumed because the run was cancelled.
    pub fn not_consumed(&self) -> usize {
        self.discovered.saturating_sub(self.pages.len())
    }

    pub fn last_confirmed(&self) -> u32 {
        self.state.last_confirmed
    }

    pub fn record_for(&self, source_filename: &str) -> Option<&PageRecord> {
        self.pages
            .iter()
            .find(|r| r.source_filename == source_filename)
    }

    fn count(&self, pred: impl Fn(&PageOutcome) -> bool) -> usize {
        self.pages.iter().filter(|r| pred(&r.outcome)).count()
    }
}
