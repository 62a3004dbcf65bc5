//! The `cache` command: show what an output directory already holds.

use std::path::PathBuf;

use console::style;

use crate::config::Settings;
use crate::models::ProcessedPages;
use crate::services::cache;

/// List page numbers already materialized in the output directory.
pub async fn cmd_cache(
    settings: &Settings,
    output: Option<PathBuf>,
    max_pages: Option<u32>,
) -> anyhow::Result<()> {
    let mut settings = settings.clone();
    if let Some(output) = output {
        settings.output_dir = output;
    }
    if let Some(max_pages) = max_pages {
        settings.max_pages = max_pages;
    }
    settings.validate()?;

    let output_dir = &settings.output_dir;
    let max_pages = settings.max_pages;

    if !output_dir.is_dir() {
        println!(
            "{} {} does not exist yet",
            style("!").yellow(),
            output_dir.display()
        );
        return Ok(());
    }

    let processed = cache::load(output_dir, max_pages);
    if processed.is_empty() {
        println!("{} No pages in {}", style("→").dim(), output_dir.display());
        return Ok(());
    }

    println!(
        "{} {} pages in {}",
        style("✓").green(),
        processed.len(),
        output_dir.display()
    );
    for line in describe(&processed, max_pages, settings.closing_number()) {
        println!("  {}", line);
    }

    let missing = missing_pages(&processed, max_pages);
    if !missing.is_empty() {
        println!(
            "{} Missing: {}",
            style("!").yellow(),
            compress_ranges(&missing)
        );
    }

    Ok(())
}

fn describe(processed: &ProcessedPages, max_pages: u32, closing_number: u32) -> Vec<String> {
    let mut lines = Vec::new();
    if processed.contains(0) {
        lines.push("opening term".to_string());
    }

    let regular: Vec<u32> = processed
        .numbers()
        .filter(|n| *n > 0 && *n <= max_pages)
        .collect();
    if !regular.is_empty() {
        lines.push(format!("pages {}", compress_ranges(&regular)));
    }

    let versos: Vec<u32> = processed.versos().collect();
    if !versos.is_empty() {
        lines.push(format!("versos {}", compress_ranges(&versos)));
    }

    if processed.contains(closing_number) {
        lines.push("closing term".to_string());
    }
    lines
}

fn missing_pages(processed: &ProcessedPages, max_pages: u32) -> Vec<u32> {
    let highest = processed
        .numbers()
        .filter(|n| *n > 0 && *n <= max_pages)
        .max()
        .unwrap_or(0);
    (1..=highest).filter(|n| !processed.contains(*n)).collect()
}

/// Render sorted numbers as `1-3, 5, 7-9`.
fn compress_ranges(numbers: &[u32]) -> String {
    let mut parts = Vec::new();
    let mut iter = numbers.iter().copied().peekable();

    while let Some(start) = iter.next() {
        let mut end = start;
        while iter.peek() == Some(&(end + 1)) {
            end += 1;
            iter.next();
        }
        if start == end {
            parts.push(start.to_string());
        } else {
            parts.push(format!("{}-{}", start, end));
        }
    }
    parts.join(", ")
}
