use crate::app_dirs::AppDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_OUTFILE: &str = "steps/Steps_Recorded.html";
pub const DEFAULT_CURSOR: &str = "resources/Cursor.png";
pub const DEFAULT_QUALITY: u8 = 80;

/// Screenshot encoding. Png is lossless, Jpeg is lossy and honours quality.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[strum(serialize = "png")]
    Png,
    #[default]
    #[strum(serialize = "jpg")]
    Jpeg,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
        }
    }

    /// Only the lossless format gets its own type; everything else is
    /// declared as jpeg in the report.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            _ => "image/jpeg",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("quality must be between 1 and 100, got {0}")]
    InvalidQuality(u8),
}

/// Persisted defaults, overridable from the command line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub outfile: PathBuf,
    pub cursor: Option<PathBuf>,
    pub format: ImageFormat,
    pub quality: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            outfile: PathBuf::from(DEFAULT_OUTFILE),
            cursor: Some(PathBuf::from(DEFAULT_CURSOR)),
            format: ImageFormat::default(),
            quality: DEFAULT_QUALITY,
        }
    }
}

impl TryFrom<&Config> for SessionConfig {
    type Error = ConfigError;

    fn try_from(cfg: &Config) -> Result<Self, Self::Error> {
        SessionConfig::new(cfg.outfile.clone(), cfg.cursor.clone(), cfg.format, cfg.quality)
    }
}

/// Immutable settings for one recording session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    outfile: PathBuf,
    cursor: Option<PathBuf>,
    format: ImageFormat,
    quality: u8,
    title: String,
}

impl SessionConfig {
    pub fn new(
        outfile: PathBuf,
        cursor: Option<PathBuf>,
        format: ImageFormat,
        quality: u8,
    ) -> Result<Self, ConfigError> {
        if !(1..=100).contains(&quality) {
            return Err(ConfigError::InvalidQuality(quality));
        }
        let title = title_from_path(&outfile);
        Ok(Self {
            outfile,
            cursor,
            format,
            quality,
            title,
        })
    }

    pub fn outfile(&self) -> &Path {
        &self.outfile
    }

    pub fn cursor(&self) -> Option<&Path> {
        self.cursor.as_deref()
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Report title, taken from the destination's file stem.
    pub fn title(&self) -> &str {
        &self.title
    }
}

fn title_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "report".to_string())
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = AppDirs::config_path().unwrap_or_else(|| PathBuf::from("steprec_config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            match serde_json::from_slice::<Config>(&bytes) {
                Ok(cfg) => return cfg,
                Err(e) => tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "ignoring unreadable config file"
                ),
            }
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).unwrap_or_default();
        fs::write(&self.path, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = Config::default();
        store.save(&cfg).unwrap();
        let loaded = store.load();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn save_and_load_custom_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = Config {
            outfile: PathBuf::from("out/guide.html"),
            cursor: None,
            format: ImageFormat::Png,
            quality: 42,
        };
        store.save(&cfg).unwrap();
        let loaded = store.load();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn corrupt_config_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, b"{ not json").unwrap();
        let store = FileConfigStore::with_path(&path);
        assert_eq!(store.load(), Config::default());
    }

    #[test]
    fn title_is_destination_stem() {
        let cfg = SessionConfig::new(
            PathBuf::from("steps/My Report.html"),
            None,
            ImageFormat::Png,
            80,
        )
        .unwrap();
        assert_eq!(cfg.title(), "My Report");
    }

    #[test]
    fn title_falls_back_when_path_has_no_stem() {
        let cfg = SessionConfig::new(PathBuf::from("/"), None, ImageFormat::Png, 80).unwrap();
        assert_eq!(cfg.title(), "report");
    }

    #[test]
    fn quality_out_of_range_is_rejected() {
        let zero = SessionConfig::new(PathBuf::from("a.html"), None, ImageFormat::Jpeg, 0);
        assert_eq!(zero, Err(ConfigError::InvalidQuality(0)));
        let high = SessionConfig::new(PathBuf::from("a.html"), None, ImageFormat::Jpeg, 101);
        assert_eq!(high, Err(ConfigError::InvalidQuality(101)));
        assert!(SessionConfig::new(PathBuf::from("a.html"), None, ImageFormat::Jpeg, 100).is_ok());
    }

    #[test]
    fn mime_mapping_is_png_or_jpeg() {
        assert_eq!(ImageFormat::Png.mime_type(), "image/png");
        assert_eq!(ImageFormat::Jpeg.mime_type(), "image/jpeg");
        assert_eq!(ImageFormat::Jpeg.to_string(), "jpg");
    }
}
