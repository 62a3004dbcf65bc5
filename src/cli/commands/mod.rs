//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod cache;
mod check;
mod run;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings, LoadOptions, Roi};

/// What to do when a page cannot be numbered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum UnresolvedPolicy {
    /// Ask on the terminal
    #[default]
    Prompt,
    /// Save it as ERRO_OCR_<name>.pdf and continue
    Error,
    /// Cancel the run
    Stop,
}

#[derive(Parser)]
#[command(name = "sheetsort")]
#[command(about = "Turn scanned book sheets into one PDF per numbered page")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

/// Overrides shared by commands that touch the pipeline.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct RunArgs {
    /// Directory with the scanned .jpg/.jpeg images
    pub input: Option<PathBuf>,
    /// Directory that receives one PDF per page
    pub output: Option<PathBuf>,
    /// Highest regular page number (closing term is this + 1)
    #[arg(short = 'm', long, env = "SHEETSORT_MAX_PAGES")]
    pub max_pages: Option<u32>,
    /// Number of parallel OCR workers
    #[arg(short, long, env = "SHEETSORT_WORKERS")]
    pub workers: Option<usize>,
    /// Characters below which an unnumbered page counts as a verso
    #[arg(long)]
    pub back_page_threshold: Option<usize>,
    /// Page-number region as x0,y0,x1,y1 on a 0-1000 scale
    #[arg(long)]
    pub roi: Option<Roi>,
    /// Tesseract language
    #[arg(short, long)]
    pub language: Option<String>,
    /// What to do with pages that cannot be numbered
    #[arg(long, value_enum, default_value_t = UnresolvedPolicy::Prompt)]
    pub on_unresolved: UnresolvedPolicy,
    /// Continue numbering after this page (for resumed books)
    #[arg(long, default_value = "0")]
    pub start_after: u32,
}

#[derive(Subcommand)]
enum Commands {
    /// OCR the scans and write one PDF per page
    Run(RunArgs),

    /// Check if required OCR tools are installed
    Check,

    /// List pages already present in an output directory
    Cache {
        /// Output directory (defaults to the configured one)
        output: Option<PathBuf>,
        /// Highest regular page number
        #[arg(short = 'm', long)]
        max_pages: Option<u32>,
    },
}

/// Parse arguments and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
    };
    let settings = load_settings(&options).await?;

    match cli.command {
        Commands::Run(args) => run::cmd_run(settings, args).await,
        Commands::Check => check::cmd_check().await,
        Commands::Cache { output, max_pages } => {
            cache::cmd_cache(&settings, output, max_pages).await
        }
    }
}
