//! Path management for spendlens configuration files.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.config/spendlens/
//! ├── config.toml          # ClientConfig
//! └── credentials.toml     # token, refresh_token, username (mode 600)
//! ```

use std::path::{Path, PathBuf};

const APP_DIR: &str = "spendlens";
const CONFIG_FILE: &str = "config.toml";
const CREDENTIALS_FILE: &str = "credentials.toml";

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// The platform config directory could not be determined.
    ConfigDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::ConfigDirNotFound => write!(f, "Cannot find config directory"),
        }
    }
}

impl std::error::Error for PathError {}

impl From<PathError> for spendlens_core::SpendError {
    fn from(err: PathError) -> Self {
        spendlens_core::SpendError::config(err.to_string())
    }
}

/// Resolves spendlens file locations.
///
/// With a base path every file lives directly under it; tests use this to
/// stay inside a temporary directory.
#[derive(Debug, Clone, Default)]
pub struct SpendLensPaths {
    base: Option<PathBuf>,
}

impl SpendLensPaths {
    pub fn new(base: Option<&Path>) -> Self {
        Self {
            base: base.map(Path::to_path_buf),
        }
    }

    /// Returns the spendlens configuration directory.
    ///
    /// # Returns
    ///
    /// - `Ok(PathBuf)`: The base path, or e.g. `~/.config/spendlens/`
    /// - `Err(PathError::ConfigDirNotFound)`: No platform config directory
    pub fn config_dir(&self) -> Result<PathBuf, PathError> {
        match &self.base {
            Some(base) => Ok(base.clone()),
            None => dirs::config_dir()
                .map(|dir| dir.join(APP_DIR))
                .ok_or(PathError::ConfigDirNotFound),
        }
    }

    pub fn config_file(&self) -> Result<PathBuf, PathError> {
        Ok(self.config_dir()?.join(CONFIG_FILE))
    }

    /// Returns the path to the credentials file.
    ///
    /// # Security Note
    ///
    /// The file holds bearer tokens; it is written with mode 600 on Unix.
    pub fn credentials_file(&self) -> Result<PathBuf, PathError> {
        Ok(self.config_dir()?.join(CREDENTIALS_FILE))
    }
}
