//! Shared helper functions for CLI commands.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::models::PageDisposition;

/// Progress bar in the house style.
pub fn page_progress_bar(total: u64) -> ProgressBar {
    let progress = ProgressBar::new(total);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░"),
    );
    progress
}

/// Print a line above the progress bar, or directly if there is none.
pub fn print_above(progress: Option<&ProgressBar>, line: &str) {
    match progress {
        Some(pb) => pb.suspend(|| eprintln!("{}", line)),
        None => eprintln!("{}", line),
    }
}

/// Short colored tag for a disposition.
pub fn disposition_tag(disposition: PageDisposition) -> String {
    match disposition {
        PageDisposition::Unresolved => style(disposition.to_string()).red().to_string(),
        PageDisposition::OpeningTerm | PageDisposition::ClosingTerm => {
            style(disposition.to_string()).magenta().to_string()
        }
        PageDisposition::BackPage(_) => style(disposition.to_string()).dim().to_string(),
        PageDisposition::Regular(_) => style(disposition.to_string()).cyan().to_string(),
    }
}

/// Truncate a string for display, respecting UTF-8 boundaries.
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
