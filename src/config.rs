//! Configuration management for sheetsort using the prefer crate.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default highest regular page number of a book.
pub const DEFAULT_MAX_PAGES: u32 = 300;

/// Default number of parallel OCR workers.
pub const DEFAULT_WORKERS: usize = 4;

/// Below this many non-whitespace characters an unnumbered page is a verso.
pub const DEFAULT_BACK_PAGE_THRESHOLD: usize = 250;

/// Resolution used when embedding page images into PDFs.
pub const DEFAULT_PDF_RESOLUTION: f32 = 100.0;

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid setting: {0}")]
    Invalid(String),
}

/// Region of interest on a 0-1000 normalized scale: `(x_min, y_min, x_max, y_max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u32; 4]", into = "[u32; 4]")]
pub struct Roi {
    pub x_min: u32,
    pub y_min: u32,
    pub x_max: u32,
    pub y_max: u32,
}

impl Roi {
    pub const SCALE: u32 = 1000;

    pub fn new(x_min: u32, y_min: u32, x_max: u32, y_max: u32) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    /// Check `0 <= min < max <= 1000` on both axes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.x_min >= self.x_max
            || self.y_min >= self.y_max
            || self.x_max > Self::SCALE
            || self.y_max > Self::SCALE
        {
            return Err(ConfigError::Invalid(format!(
                "ROI {} must satisfy min < max <= {} on both axes",
                self,
                Self::SCALE
            )));
        }
        Ok(())
    }

    /// Convert to pixel bounds `(x_min, y_min, x_max, y_max)` for an image.
    pub fn to_pixels(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let scale = |dim: u32, v: u32| (dim as u64 * v as u64 / Self::SCALE as u64) as u32;
        (
            scale(width, self.x_min),
            scale(height, self.y_min),
            scale(width, self.x_max),
            scale(height, self.y_max),
        )
    }
}

impl Default for Roi {
    fn default() -> Self {
        Self::new(450, 50, 950, 250)
    }
}

impl From<[u32; 4]> for Roi {
    fn from(v: [u32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<Roi> for [u32; 4] {
    fn from(r: Roi) -> Self {
        [r.x_min, r.y_min, r.x_max, r.y_max]
    }
}

impl std::fmt::Display for Roi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{},{},{}", self.x_min, self.y_min, self.x_max, self.y_max)
    }
}

impl FromStr for Roi {
    type Err = ConfigError;

    /// Parse `"x0,y0,x1,y1"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<u32> = s
            .split(',')
            .map(|p| p.trim().parse::<u32>())
            .collect::<Result<_, _>>()
            .map_err(|_| ConfigError::Invalid(format!("ROI '{}' is not four integers", s)))?;
        match parts.as_slice() {
            [a, b, c, d] => {
                let roi = Roi::new(*a, *b, *c, *d);
                roi.validate()?;
                Ok(roi)
            }
            _ => Err(ConfigError::Invalid(format!(
                "ROI '{}' needs exactly four values",
                s
            ))),
        }
    }
}

/// OCR parameters handed to every worker as an immutable snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// Where the page number is printed.
    pub roi: Roi,
    /// Tesseract language pack.
    pub language: String,
    /// Tesseract OCR engine mode.
    pub oem: u8,
    /// Page segmentation mode for the ROI pass (single uniform block).
    pub psm: u8,
    /// Page segmentation mode for the full-page pass.
    pub coarse_psm: u8,
    pub opening_markers: Vec<String>,
    pub closing_markers: Vec<String>,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            roi: Roi::default(),
            language: "por".to_string(),
            oem: 3,
            psm: 6,
            coarse_psm: 3,
            opening_markers: vec![
                "TERMO DE ABERTURA".to_string(),
                "TERMO DE INSTALAÇÃO".to_string(),
            ],
            closing_markers: vec!["TERMO DE ENCERRAMENTO".to_string()],
        }
    }
}

/// Resolved settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub max_pages: u32,
    pub workers: usize,
    pub back_page_threshold: usize,
    pub pdf_resolution: f32,
    pub ocr: OcrSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("."),
            output_dir: PathBuf::from("pdf"),
            max_pages: DEFAULT_MAX_PAGES,
            workers: DEFAULT_WORKERS,
            back_page_threshold: DEFAULT_BACK_PAGE_THRESHOLD,
            pdf_resolution: DEFAULT_PDF_RESOLUTION,
            ocr: OcrSettings::default(),
        }
    }
}

impl Settings {
    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_pages == 0 {
            return Err(ConfigError::Invalid("max_pages must be positive".into()));
        }
        if self.max_pages == u32::MAX {
            return Err(ConfigError::Invalid(format!(
                "max_pages must be below {} to leave room for the closing term",
                u32::MAX
            )));
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be positive".into()));
        }
        if !(self.pdf_resolution > 0.0) {
            return Err(ConfigError::Invalid(
                "pdf_resolution must be positive".into(),
            ));
        }
        self.ocr.roi.validate()
    }

    /// The closing-term sentinel.
    pub fn closing_number(&self) -> u32 {
        self.max_pages + 1
    }
}

/// Configuration file structure. Every key is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub back_page_threshold: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_resolution: Option<f32>,
    #[serde(default)]
    pub ocr: OcrSettings,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Falls back to defaults when no config file is found or it fails to parse.
    pub async fn load() -> Self {
        match prefer::load("sheetsort").await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => config,
                        Err(e) => {
                            tracing::warn!("Ignoring config file: {}", e);
                            Self::default()
                        }
                    }
                } else {
                    Self::default()
                }
            }
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let mut config = Self::parse(&contents, path)?;
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    fn parse(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let parse_err = |message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        };

        match ext {
            "toml" => toml::from_str(contents).map_err(|e| parse_err(e.to_string())),
            "yaml" | "yml" => serde_yaml::from_str(contents).map_err(|e| parse_err(e.to_string())),
            _ => serde_json::from_str(contents).map_err(|e| parse_err(e.to_string())),
        }
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref dir) = self.input_dir {
            settings.input_dir = self.resolve_path(dir, base_dir);
        }
        if let Some(ref dir) = self.output_dir {
            settings.output_dir = self.resolve_path(dir, base_dir);
        }
        if let Some(max_pages) = self.max_pages {
            settings.max_pages = max_pages;
        }
        if let Some(workers) = self.workers {
            settings.workers = workers;
        }
        if let Some(threshold) = self.back_page_threshold {
            settings.back_page_threshold = threshold;
        }
        if let Some(resolution) = self.pdf_resolution {
            settings.pdf_resolution = resolution;
        }
        settings.ocr = self.ocr.clone();
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
}

/// Load settings from the discovered (or explicit) config file on top of defaults.
pub async fn load_settings(options: &LoadOptions) -> Result<Settings, ConfigError> {
    let config = match options.config_path {
        Some(ref path) => Config::load_from_path(path).await?,
        None => Config::load().await,
    };

    let base_dir = config
        .base_dir()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    let mut settings = Settings::default();
    config.apply_to_settings(&mut settings, &base_dir);

    if let Some(ref path) = config.source_path {
        tracing::debug!("Loaded config from {}", path.display());
    }

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roi_default_and_pixels() {
        let roi = Roi::default();
        assert_eq!(roi.to_pixels(1000, 2000), (450, 100, 950, 500));
        assert_eq!(roi.to_pixels(2480, 3508), (1116, 175, 2356, 877));
    }

    #[test]
    fn test_roi_from_str() {
        let roi: Roi = "10, 20, 300, 400".parse().unwrap();
        assert_eq!(roi, Roi::new(10, 20, 300, 400));
        assert!("1,2,3".parse::<Roi>().is_err());
        assert!("a,b,c,d".parse::<Roi>().is_err());
        assert!("500,0,400,100".parse::<Roi>().is_err());
        assert!("0,0,1001,100".parse::<Roi>().is_err());
    }

    #[test]
    fn test_settings_validate() {
        let mut settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.closing_number(), 301);

        settings.workers = 0;
        assert!(settings.validate().is_err());

        settings.workers = 2;
        settings.max_pages = 0;
        assert!(settings.validate().is_err());

        // The closing term sits at max_pages + 1
        settings.max_pages = u32::MAX;
        assert!(settings.validate().is_err());
        settings.max_pages = u32::MAX - 1;
        assert!(settings.validate().is_ok());
        assert_eq!(settings.closing_number(), u32::MAX);
    }

    #[test]
    fn test_parse_toml_config() {
        let toml = r#"
            input_dir = "scans"
            max_pages = 120

            [ocr]
            roi = [400, 0, 1000, 200]
            language = "eng"
        "#;
        let config = Config::parse(toml, Path::new("sheetsort.toml")).unwrap();
        assert_eq!(config.max_pages, Some(120));
        assert_eq!(config.ocr.roi, Roi::new(400, 0, 1000, 200));
        assert_eq!(config.ocr.language, "eng");
        // Unspecified OCR keys keep their defaults
        assert_eq!(config.ocr.psm, 6);
        assert_eq!(config.ocr.closing_markers, vec!["TERMO DE ENCERRAMENTO"]);
    }

    #[test]
    fn test_parse_yaml_and_json() {
        let yaml = "workers: 8\noutput_dir: out\n";
        let config = Config::parse(yaml, Path::new("c.yaml")).unwrap();
        assert_eq!(config.workers, Some(8));

        let json = r#"{"back_page_threshold": 90}"#;
        let config = Config::parse(json, Path::new("c.json")).unwrap();
        assert_eq!(config.back_page_threshold, Some(90));

        assert!(Config::parse("{nope", Path::new("c.json")).is_err());
    }

    #[test]
    fn test_apply_resolves_relative_paths() {
        let config = Config {
            input_dir: Some("scans".into()),
            output_dir: Some("/abs/out".into()),
            max_pages: Some(50),
            ..Default::default()
        };
        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings, Path::new("/books/vol1"));
        assert_eq!(settings.input_dir, PathBuf::from("/books/vol1/scans"));
        assert_eq!(settings.output_dir, PathBuf::from("/abs/out"));
        assert_eq!(settings.max_pages, 50);
        assert_eq!(settings.workers, DEFAULT_WORKERS);
    }

    #[tokio::test]
    async fn test_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheetsort.toml");
        std::fs::write(&path, "max_pages = 10\n").unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        assert_eq!(config.max_pages, Some(10));
        assert_eq!(config.base_dir(), Some(dir.path().to_path_buf()));

        let settings = load_settings(&LoadOptions {
            config_path: Some(path),
        })
        .await
        .unwrap();
        assert_eq!(settings.max_pages, 10);
    }
}
