use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::FileServerError;

/// Server configuration, loadable from TOML and overridden by CLI flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// List entries whose name starts with a dot
    #[serde(default)]
    pub include_dotfiles: bool,

    /// Regular expression; matching entry names are never listed
    #[serde(default)]
    pub exclude: Option<String>,

    /// Accept uploads on `POST /files`
    #[serde(default)]
    pub uploads: bool,

    /// Where uploads are stored (defaults to the system temp directory)
    #[serde(default)]
    pub uploads_dir: Option<PathBuf>,

    /// Prefix stored upload names with their creation time
    #[serde(default)]
    pub uploads_timestamp: bool,

    /// Maximum upload size in bytes, 0 disables the limit
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: u64,

    /// Read the filesystem per request or serve a startup snapshot
    #[serde(default)]
    pub mode: ServeMode,

    /// Content-Disposition used for downloads
    #[serde(default)]
    pub download: Disposition,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ServeMode {
    /// Stat the filesystem on every request
    #[default]
    Live,
    /// Walk the tree once at startup and serve from memory
    Snapshot,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    #[default]
    Inline,
    Attachment,
}

impl Disposition {
    pub fn as_str(self) -> &'static str {
        match self {
            Disposition::Inline => "inline",
            Disposition::Attachment => "attachment",
        }
    }
}

fn default_max_upload_size() -> u64 {
    100 * 1024 * 1024 // 100 MB
}

impl Default for Config {
    fn default() -> Self {
        Self {
            include_dotfiles: false,
            exclude: None,
            uploads: false,
            uploads_dir: None,
            uploads_timestamp: false,
            max_upload_size: default_max_upload_size(),
            mode: ServeMode::default(),
            download: Disposition::default(),
        }
    }
}

/// Validated upload settings.
#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub enabled: bool,
    /// Absolute directory uploads are written to.
    pub dir: PathBuf,
    pub timestamp: bool,
    /// `None` means unlimited.
    pub max_size: Option<u64>,
}

impl Config {
    /// Load config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Compile the exclude pattern, if any. An empty pattern counts as unset.
    pub fn exclude_pattern(&self) -> Result<Option<Regex>, FileServerError> {
        match self.exclude.as_deref() {
            None | Some("") => Ok(None),
            Some(pattern) => Ok(Some(Regex::new(pattern)?)),
        }
    }

    /// Resolve the uploads directory to an absolute path and, when uploads
    /// are enabled, make sure it exists.
    pub fn upload_settings(&self) -> Result<UploadSettings, FileServerError> {
        let dir = self
            .uploads_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        let dir = std::path::absolute(&dir).map_err(FileServerError::Io)?;

        if self.uploads {
            if dir.exists() && !dir.is_dir() {
                return Err(FileServerError::Config(format!(
                    "uploads dir is not a directory: {}",
                    dir.display()
                )));
            }
            std::fs::create_dir_all(&dir)
                .map_err(|_| FileServerError::CreateDirFailed(dir.display().to_string()))?;
        }

        Ok(UploadSettings {
            enabled: self.uploads,
            dir,
            timestamp: self.uploads_timestamp,
            max_size: (self.max_upload_size > 0).then_some(self.max_upload_size),
        })
    }
}
