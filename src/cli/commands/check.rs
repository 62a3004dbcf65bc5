//! The `check` command: OCR tool status.

use console::style;

use crate::ocr::{check_tools, OcrEngine, TesseractBackend};

/// Check OCR tool availability.
pub async fn cmd_check() -> anyhow::Result<()> {
    println!("\n{}", style("OCR Tool Status").bold());
    println!("{}", "-".repeat(50));

    println!("\n{}", style("Tools:").cyan());
    for (tool, available) in check_tools() {
        let status = if available {
            style("✓ found").green()
        } else {
            style("✗ not found").red()
        };
        println!("  {:<15} {}", tool, status);
    }

    println!("\n{}", style("OCR Backends:").cyan());
    let tesseract = TesseractBackend::new();
    let status = if tesseract.is_available() {
        style("✓ available").green()
    } else {
        style("✗ not available").red()
    };
    println!("  {:<15} {}", "Tesseract", status);
    println!(
        "                  {}",
        style(tesseract.availability_hint()).dim()
    );
    println!();

    Ok(())
}
