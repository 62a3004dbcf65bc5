//! Service layer for sheetsort.
//!
//! This module contains the pipeline logic separated from UI concerns.
//! The CLI drives it through events and the correction gateway.

pub mod cache;
pub mod classifier;
pub mod correction;
pub mod pipeline;
pub mod source;
pub mod worker;
pub mod writer;

pub use classifier::{classify, Classification, ClassifierPolicy};
pub use correction::{
    correction_channel, CorrectionAction, CorrectionClient, CorrectionGateway, CorrectionInbox,
    CorrectionInputError, CorrectionRequest, CorrectionResponse, FixedPolicy, PendingCorrection,
};
pub use pipeline::{PipelineCoordinator, PipelineError, PipelineEvent};
pub use source::ImageSource;
pub use worker::{PageOcrWorker, WorkerParams};
pub use writer::{output_filename, PageWriter, WriteError};
