//! Pipeline coordinator.
//!
//! Every input image is handed to the worker pool as soon as it is
//! discovered. Results are then consumed strictly in filename order on a
//! single task, which is the only place `PipelineState` is mutated. Numbering
//! decisions therefore need no locks even though OCR runs in parallel.

mod types;

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::cache;
use super::classifier::{classify, resolve_number, Classification, ClassifierPolicy};
use super::correction::{CorrectionAction, CorrectionGateway, CorrectionRequest};
use super::source::ImageSource;
use super::worker::{PageOcrWorker, WorkerParams};
use super::writer::{output_filename, PageWriter, WriteError};
use crate::config::Settings;
use crate::models::{
    FinalizedPage, OcrOutcome, PageOutcome, PageRecord, PageTask, PipelineState, RunReport,
    RunStatus,
};
use crate::ocr::OcrEngine;

pub use types::{PipelineError, PipelineEvent};

/// An OCR job in flight, in input order.
type PendingOcr = VecDeque<(PageTask, JoinHandle<OcrOutcome>)>;

/// Result of consuming one outcome.
enum Step {
    Consumed(PageRecord),
    Stopped,
}

/// Drives one run from discovery to the last written page.
pub struct PipelineCoordinator {
    settings: Settings,
    worker: Arc<PageOcrWorker>,
    writer: PageWriter,
    gateway: Arc<dyn CorrectionGateway>,
    cancel: CancellationToken,
}

impl PipelineCoordinator {
    pub fn new(
        settings: Settings,
        engine: Arc<dyn OcrEngine>,
        gateway: Arc<dyn CorrectionGateway>,
    ) -> Self {
        let params = WorkerParams::new(&settings.ocr, settings.max_pages);
        let writer = PageWriter::new(&settings.output_dir, settings.pdf_resolution);
        Self {
            worker: Arc::new(PageOcrWorker::new(engine, params)),
            writer,
            settings,
            gateway,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that stops the run when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn policy(&self) -> ClassifierPolicy {
        ClassifierPolicy {
            max_pages: self.settings.max_pages,
            back_page_threshold: self.settings.back_page_threshold,
        }
    }

    /// Run the pipeline.
    ///
    /// `state` seeds the cursor and manual corrections (for example from an
    /// earlier run in the same session); its processed set is replaced by
    /// what is found in the output directory.
    pub async fn run(
        &self,
        mut state: PipelineState,
        events: mpsc::Sender<PipelineEvent>,
    ) -> Result<RunReport, PipelineError> {
        self.settings.validate()?;
        if self.settings.workers > Semaphore::MAX_PERMITS {
            return Err(PipelineError::WorkerPool(format!(
                "{} workers requested, at most {} supported",
                self.settings.workers,
                Semaphore::MAX_PERMITS
            )));
        }

        let output_dir = &self.settings.output_dir;
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|source| PipelineError::OutputDir {
                path: output_dir.clone(),
                source,
            })?;

        state.processed = cache::load(output_dir, self.settings.max_pages);

        let source = ImageSource::new(&self.settings.input_dir);
        let tasks = source.discover().map_err(|source_err| PipelineError::InputDir {
            path: self.settings.input_dir.clone(),
            source: source_err,
        })?;
        let discovered = tasks.len();

        if tasks.is_empty() {
            tracing::warn!(
                "No .jpg/.jpeg images found in {}",
                self.settings.input_dir.display()
            );
        } else {
            tracing::info!(
                "Found {} images, {} pages already in {}",
                discovered,
                state.processed.len(),
                output_dir.display()
            );
        }

        let _ = events
            .send(PipelineEvent::RunStarted {
                total: discovered,
                cached: state.processed.len(),
            })
            .await;

        let semaphore = Arc::new(Semaphore::new(self.settings.workers));
        let mut pending = if self.cancel.is_cancelled() {
            PendingOcr::new()
        } else {
            self.submit(tasks, &semaphore)
        };

        let mut pages = Vec::with_capacity(discovered);
        let mut status = if self.cancel.is_cancelled() {
            RunStatus::Cancelled
        } else {
            RunStatus::Completed
        };

        while let Some((task, mut handle)) = pending.pop_front() {
            if self.cancel.is_cancelled() {
                handle.abort();
                status = RunStatus::Cancelled;
                break;
            }

            let joined = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                joined = &mut handle => Some(joined),
            };

            let outcome = match joined {
                Some(Ok(outcome)) => outcome,
                Some(Err(e)) => OcrOutcome::failed(task.filename(), format!("worker lost: {}", e)),
                None => {
                    handle.abort();
                    status = RunStatus::Cancelled;
                    break;
                }
            };

            match self.consume(outcome, &mut state, &events).await {
                Step::Consumed(record) => pages.push(record),
                Step::Stopped => {
                    status = RunStatus::Cancelled;
                    break;
                }
            }
        }

        if status == RunStatus::Cancelled {
            // Queued jobs fail fast; running OCR calls are abandoned
            semaphore.close();
            for (_, handle) in pending.drain(..) {
                handle.abort();
            }
            tracing::warn!(
                "Run cancelled after {} of {} images",
                pages.len(),
                discovered
            );
        } else {
            tracing::info!(
                "Run completed: {} images, last confirmed page {}",
                discovered,
                state.last_confirmed
            );
        }

        let _ = events.send(PipelineEvent::RunFinished { status }).await;

        Ok(RunReport {
            status,
            discovered,
            pages,
            state,
        })
    }

    /// Hand every task to the pool. Order of completion does not matter.
    fn submit(&self, tasks: Vec<PageTask>, semaphore: &Arc<Semaphore>) -> PendingOcr {
        tasks
            .into_iter()
            .map(|task| {
                let worker = Arc::clone(&self.worker);
                let semaphore = Arc::clone(semaphore);
                let job = task.clone();

                let handle = tokio::spawn(async move {
                    let filename = job.filename();
                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        return OcrOutcome::failed(filename, "worker pool closed");
                    };
                    let source = job.clone();
                    match tokio::task::spawn_blocking(move || worker.process(&job)).await {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            // Crashed workers still hand back the source page
                            let error = format!("worker crashed: {}", e);
                            tokio::task::spawn_blocking(move || {
                                PageOcrWorker::failed(&source, error)
                            })
                            .await
                            .unwrap_or_else(|e| {
                                OcrOutcome::failed(filename, format!("worker crashed: {}", e))
                            })
                        }
                    }
                });

                (task, handle)
            })
            .collect()
    }

    /// Classify, correct if needed, then cache-skip or write one page.
    async fn consume(
        &self,
        outcome: OcrOutcome,
        state: &mut PipelineState,
        events: &mpsc::Sender<PipelineEvent>,
    ) -> Step {
        let max_pages = self.settings.max_pages;
        let policy = self.policy();
        let filename = outcome.source_filename.clone();
        let base = outcome.base_filename();

        let _ = events
            .send(PipelineEvent::OcrCompleted {
                filename: filename.clone(),
                candidate_page: outcome.candidate_page,
            })
            .await;

        if let Some(ref error) = outcome.worker_error {
            tracing::warn!("OCR failed for {}: {}", filename, error);
            let _ = events
                .send(PipelineEvent::WorkerFailed {
                    filename: filename.clone(),
                    error: error.clone(),
                })
                .await;
        }

        let mut classification = classify(&outcome, state, &policy);
        let mut manually_corrected = false;

        if classification.is_unresolved() {
            if self.cancel.is_cancelled() {
                return Step::Stopped;
            }

            let _ = events
                .send(PipelineEvent::CorrectionRequested {
                    filename: filename.clone(),
                })
                .await;

            let request = CorrectionRequest::new(&filename, state.last_confirmed, max_pages)
                .with_reason(outcome.worker_error.clone());
            let response = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Step::Stopped,
                response = self.gateway.request(request) => response,
            };

            match response.action() {
                CorrectionAction::Confirm(number) => {
                    tracing::info!("{} manually set to page {}", filename, number);
                    state.manual_corrections.insert(base.clone(), number);
                    classification = resolve_number(number, state, &policy);
                    manually_corrected = true;
                }
                CorrectionAction::Skip(number) => {
                    tracing::info!("{} takes suggested page {}", filename, number);
                    classification = resolve_number(number, state, &policy);
                    manually_corrected = true;
                }
                CorrectionAction::LeaveUnresolved => {
                    tracing::warn!("{} left unresolved", filename);
                }
                CorrectionAction::Stop => {
                    tracing::warn!("Stop requested while correcting {}", filename);
                    self.cancel.cancel();
                    return Step::Stopped;
                }
            }
        }

        let disposition = classification.disposition();
        state.advance(disposition, max_pages);

        let page_outcome = match classification {
            Classification::CacheSkip(disposition) => {
                tracing::info!("{}: {} already exists, skipping", filename, disposition);
                let _ = events
                    .send(PipelineEvent::PageCacheSkipped {
                        filename: filename.clone(),
                        disposition,
                    })
                    .await;
                PageOutcome::CacheSkipped { disposition }
            }
            Classification::Page(disposition) => {
                let page = FinalizedPage {
                    output_filename: output_filename(disposition, &base),
                    image_payload: outcome.image_payload,
                    disposition,
                };

                match self.write(page).await {
                    Ok(path) => {
                        state.processed.record(disposition, max_pages);
                        tracing::info!("{} -> {}", filename, path.display());
                        let _ = events
                            .send(PipelineEvent::PageWritten {
                                filename: filename.clone(),
                                disposition,
                                path: path.clone(),
                            })
                            .await;
                        PageOutcome::Written { disposition, path }
                    }
                    Err(e) => {
                        tracing::error!("Failed to write {} ({}): {}", filename, disposition, e);
                        let _ = events
                            .send(PipelineEvent::PageWriteFailed {
                                filename: filename.clone(),
                                disposition,
                                error: e.to_string(),
                            })
                            .await;
                        PageOutcome::WriteFailed {
                            disposition,
                            error: e.to_string(),
                        }
                    }
                }
            }
        };

        Step::Consumed(PageRecord {
            source_filename: filename,
            outcome: page_outcome,
            worker_error: outcome.worker_error,
            manually_corrected,
        })
    }

    /// PDF encoding is CPU-bound; keep it off the async threads.
    async fn write(&self, page: FinalizedPage) -> Result<std::path::PathBuf, WriteError> {
        let writer = self.writer.clone();
        tokio::task::spawn_blocking(move || writer.write(&page))
            .await
            .map_err(|e| WriteError::Io(std::io::Error::other(e.to_string())))?
    }
}
