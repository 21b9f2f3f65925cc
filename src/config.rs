//! `config.json` loading and path resolution.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

use crate::models::DEVICE_IMPORT_MARKER;

/// Default location of the dump directory, relative to the working directory
pub const DEFAULT_DUMP_DIR: &str = "./data";

/// Contents of `config.json`. Every key is optional.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backup folder for relocated duplicate files
    pub move_files_folder: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
    pub import_marker: Option<String>,
    pub dump_dir: Option<PathBuf>,
}

impl Config {
    /// Load a config file. A missing file yields the empty config.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("Failed to parse config {}", path.display()))
    }

    /// Database path: CLI, then config, then `REKORDBOX_DB_PATH`, then the platform default.
    pub fn resolve_db_path(&self, cli: Option<&Path>) -> Option<PathBuf> {
        cli.map(Path::to_path_buf)
            .or_else(|| self.db_path.clone())
            .or_else(|| env::var_os("REKORDBOX_DB_PATH").map(PathBuf::from))
            .or_else(default_db_path)
    }

    pub fn resolve_backup_dir(&self, cli: Option<&Path>) -> Option<PathBuf> {
        cli.map(Path::to_path_buf).or_else(|| self.move_files_folder.clone())
    }

    pub fn resolve_import_marker(&self, cli: Option<&str>) -> String {
        cli.map(str::to_string)
            .or_else(|| self.import_marker.clone())
            .unwrap_or_else(|| DEVICE_IMPORT_MARKER.to_string())
    }

    pub fn resolve_dump_dir(&self, cli: Option<&Path>) -> PathBuf {
        cli.map(Path::to_path_buf)
            .or_else(|| self.dump_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DUMP_DIR))
    }
}

/// Where Rekordbox keeps `master.db` on this platform, if it exists.
pub fn default_db_path() -> Option<PathBuf> {
    let path = if cfg!(target_os = "windows") {
        dirs::data_dir()?.join("Pioneer").join("rekordbox").join("master.db")
    } else {
        dirs::home_dir()?
            .join("Library")
            .join("Pioneer")
            .join("rekordbox")
            .join("master.db")
    };
    path.exists().then_some(path)
}
