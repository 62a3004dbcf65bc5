//! Data models for sheetsort.

mod page;
mod report;
mod state;

pub use page::{FinalizedPage, OcrOutcome, PageDisposition, PageTask};
pub use report::{PageOutcome, PageRecord, RunReport, RunStatus};
pub use state::{PipelineState, ProcessedPages};

pub(crate) use page::file_name_of;
