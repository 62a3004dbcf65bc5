//! Discovery of input images.

use std::path::{Path, PathBuf};

use crate::models::PageTask;

/// Extensions accepted as input (compared case-insensitively).
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg"];

/// Enumerates eligible images in a flat input directory.
pub struct ImageSource {
    dir: PathBuf,
}

impl ImageSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// List supported images sorted by filename.
    ///
    /// Subdirectories and other file types are ignored.
    pub fn discover(&self) -> std::io::Result<Vec<PageTask>> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_file() && is_supported(&path) {
                paths.push(path);
            }
        }

        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        Ok(paths
            .into_iter()
            .enumerate()
            .map(|(i, path)| PageTask::new(path, i))
            .collect())
    }
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|s| e.eq_ignore_ascii_case(s))
        })
        .unwrap_or(false)
}
