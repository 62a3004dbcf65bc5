//! The `run` command: OCR, classify and write a whole book.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use console::style;
use indicatif::ProgressBar;
use tokio::sync::{mpsc, Mutex};

use crate::config::Settings;
use crate::models::{PageOutcome, PipelineState, RunReport, RunStatus};
use crate::ocr::{OcrEngine, TesseractBackend};
use crate::services::{
    correction_channel, CorrectionGateway, FixedPolicy, PipelineCoordinator, PipelineEvent,
};

use super::super::helpers::{disposition_tag, page_progress_bar, print_above, truncate};
use super::super::prompt::spawn_terminal_prompt;
use super::{RunArgs, UnresolvedPolicy};

/// Apply command-line overrides on top of file/default settings.
fn apply_overrides(settings: &mut Settings, args: &RunArgs) {
    if let Some(ref input) = args.input {
        settings.input_dir = input.clone();
    }
    if let Some(ref output) = args.output {
        settings.output_dir = output.clone();
    }
    if let Some(max_pages) = args.max_pages {
        settings.max_pages = max_pages;
    }
    if let Some(workers) = args.workers {
        settings.workers = workers;
    }
    if let Some(threshold) = args.back_page_threshold {
        settings.back_page_threshold = threshold;
    }
    if let Some(roi) = args.roi {
        settings.ocr.roi = roi;
    }
    if let Some(ref language) = args.language {
        settings.ocr.language = language.clone();
    }
}

/// Run the pipeline over one input directory.
pub async fn cmd_run(mut settings: Settings, args: RunArgs) -> anyhow::Result<()> {
    apply_overrides(&mut settings, &args);
    settings.validate()?;

    let engine = Arc::new(TesseractBackend::with_settings(&settings.ocr));
    if !engine.is_available() {
        println!("{} {}", style("✗").red(), engine.availability_hint());
        return Err(anyhow::anyhow!(
            "Missing required tools. Run 'sheetsort check' for install instructions."
        ));
    }

    println!(
        "{} {} -> {} ({} workers, pages 1-{})",
        style("→").cyan(),
        settings.input_dir.display(),
        settings.output_dir.display(),
        settings.workers,
        settings.max_pages
    );

    let progress = Arc::new(Mutex::new(None::<ProgressBar>));

    let mut policy = args.on_unresolved;
    if policy == UnresolvedPolicy::Prompt && !console::user_attended_stderr() {
        println!(
            "{} No terminal attached; unresolved pages will be saved as errors",
            style("!").yellow()
        );
        policy = UnresolvedPolicy::Error;
    }

    let mut prompt_handle = None;
    let gateway: Arc<dyn CorrectionGateway> = match policy {
        UnresolvedPolicy::Prompt => {
            let (client, inbox) = correction_channel();
            prompt_handle = Some(spawn_terminal_prompt(inbox, progress.clone()));
            Arc::new(client)
        }
        UnresolvedPolicy::Error => Arc::new(FixedPolicy::SaveAsError),
        UnresolvedPolicy::Stop => Arc::new(FixedPolicy::Stop),
    };

    let coordinator = PipelineCoordinator::new(settings, engine, gateway);
    let cancel = coordinator.cancellation_token();

    // Ctrl-C stops consumption; already written pages stay on disk
    let interrupted = Arc::new(AtomicBool::new(false));
    let signal_handler = {
        let cancel = cancel.clone();
        let interrupted = interrupted.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                interrupted.store(true, Ordering::SeqCst);
                cancel.cancel();
            }
        })
    };

    let (event_tx, event_rx) = mpsc::channel::<PipelineEvent>(100);
    let event_handler = tokio::spawn(render_events(event_rx, progress.clone()));

    let result = coordinator
        .run(PipelineState::starting_after(args.start_after), event_tx)
        .await;

    let _ = event_handler.await;
    signal_handler.abort();
    // Dropping the coordinator closes the correction channel
    drop(coordinator);
    if let Some(handle) = prompt_handle {
        if !interrupted.load(Ordering::SeqCst) {
            let _ = handle.await;
        }
    }

    let report = result?;
    print_summary(&report);

    if interrupted.load(Ordering::SeqCst) {
        // A pending terminal read would keep the runtime alive
        std::process::exit(130);
    }

    Ok(())
}

/// Turn pipeline events into progress output.
async fn render_events(
    mut event_rx: mpsc::Receiver<PipelineEvent>,
    progress: Arc<Mutex<Option<ProgressBar>>>,
) {
    while let Some(event) = event_rx.recv().await {
        match event {
            PipelineEvent::RunStarted { total, cached } => {
                println!(
                    "{} {} images to process, {} pages already written",
                    style("→").cyan(),
                    total,
                    cached
                );
                let bar = page_progress_bar(total as u64);
                bar.set_message("Running OCR...");
                *progress.lock().await = Some(bar);
            }
            PipelineEvent::OcrCompleted { filename, .. } => {
                if let Some(ref bar) = *progress.lock().await {
                    bar.set_message(truncate(&filename, 40));
                }
            }
            PipelineEvent::WorkerFailed { filename, error } => {
                let guard = progress.lock().await;
                print_above(
                    guard.as_ref(),
                    &format!("  {} OCR failed for {}: {}", style("✗").red(), filename, error),
                );
            }
            PipelineEvent::CorrectionRequested { .. } => {}
            PipelineEvent::PageWritten {
                filename,
                disposition,
                ..
            } => {
                if let Some(ref bar) = *progress.lock().await {
                    bar.set_message(format!(
                        "{} -> {}",
                        truncate(&filename, 30),
                        disposition_tag(disposition)
                    ));
                    bar.inc(1);
                }
            }
            PipelineEvent::PageCacheSkipped { .. } => {
                if let Some(ref bar) = *progress.lock().await {
                    bar.inc(1);
                }
            }
            PipelineEvent::PageWriteFailed {
                filename,
                disposition,
                error,
            } => {
                let guard = progress.lock().await;
                print_above(
                    guard.as_ref(),
                    &format!(
                        "  {} Could not write {} ({}): {}",
                        style("✗").red(),
                        filename,
                        disposition,
                        error
                    ),
                );
                if let Some(ref bar) = *guard {
                    bar.inc(1);
                }
            }
            PipelineEvent::RunFinished { .. } => {
                if let Some(bar) = progress.lock().await.take() {
                    bar.finish_and_clear();
                }
            }
        }
    }
}

fn print_summary(report: &RunReport) {
    let headline = match report.status {
        RunStatus::Completed => format!("{} Run completed", style("✓").green()),
        RunStatus::Cancelled => format!("{} Run cancelled", style("!").yellow()),
    };
    println!(
        "{}: {} written, {} already present, last confirmed page {}",
        headline,
        report.written(),
        report.cache_skipped(),
        report.last_confirmed()
    );

    if report.unresolved() > 0 {
        println!(
            "  {} {} pages saved as ERRO_OCR_*",
            style("!").yellow(),
            report.unresolved()
        );
    }
    if report.write_failures() > 0 {
        println!(
            "  {} {} pages could not be written:",
            style("✗").red(),
            report.write_failures()
        );
        for record in &report.pages {
            if let PageOutcome::WriteFailed { ref error, .. } = record.outcome {
                println!("    {}: {}", record.source_filename, error);
            }
        }
    }
    if report.not_consumed() > 0 {
        println!(
            "  {} {} images were not processed",
            style("→").dim(),
            report.not_consumed()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Roi;
    use std::path::PathBuf;

    #[test]
    fn test_cli_flags_override_settings() {
        let mut settings = Settings::default();
        let args = RunArgs {
            input: Some(PathBuf::from("/scans")),
            max_pages: Some(120),
            roi: Some(Roi::new(0, 0, 500, 200)),
            language: Some("eng".to_string()),
            ..Default::default()
        };

        apply_overrides(&mut settings, &args);
        assert_eq!(settings.input_dir, PathBuf::from("/scans"));
        assert_eq!(settings.output_dir, PathBuf::from("pdf"));
        assert_eq!(settings.max_pages, 120);
        assert_eq!(settings.workers, crate::config::DEFAULT_WORKERS);
        assert_eq!(settings.ocr.roi, Roi::new(0, 0, 500, 200));
        assert_eq!(settings.ocr.language, "eng");
    }
}
