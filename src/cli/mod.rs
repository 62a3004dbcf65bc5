//! Command-line interface.

mod commands;
mod helpers;
mod prompt;

pub use commands::{is_verbose, run};
