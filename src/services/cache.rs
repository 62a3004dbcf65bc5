//! Output cache index: page numbers already materialized as PDFs.
//!
//! The output directory is the only persisted state. It is scanned once at
//! startup; afterwards the coordinator updates the in-memory set itself.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::ProcessedPages;

static SHEET_FILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"FL\.\s*(\d{3,})(-VERSO)?\.PDF").unwrap());

const OPENING_NAME: &str = "TERMO DE ABERTURA";
const CLOSING_NAME: &str = "TERMO DE ENCERRAMENTO";

/// Scan `output_dir` for existing page files.
///
/// A missing directory is an empty cache, not an error. Unreadable entries
/// are skipped with a warning.
pub fn load(output_dir: &Path, max_pages: u32) -> ProcessedPages {
    let mut processed = ProcessedPages::new();

    let entries = match std::fs::read_dir(output_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return processed,
        Err(e) => {
            tracing::warn!(
                "Failed to read output directory {}: {}",
                output_dir.display(),
                e
            );
            return processed;
        }
    };

    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_uppercase();
        if !name.ends_with(".PDF") {
            continue;
        }
        record_filename(&mut processed, &name, max_pages);
    }

    tracing::info!(
        "Loaded cache with {} processed pages from {}",
        processed.len(),
        output_dir.display()
    );
    processed
}

/// Recognize one (uppercased) output filename.
fn record_filename(processed: &mut ProcessedPages, name: &str, max_pages: u32) {
    if let Some(caps) = SHEET_FILE.captures(name) {
        if let Some(number) = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok()) {
            if caps.get(2).is_some() {
                processed.insert_verso(number);
            } else {
                processed.insert(number);
            }
        }
    }
    if name.contains(OPENING_NAME) {
        processed.insert(0);
    }
    if name.contains(CLOSING_NAME) {
        processed.insert(max_pages + 1);
    }
}
