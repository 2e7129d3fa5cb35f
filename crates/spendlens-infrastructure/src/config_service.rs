//! Configuration service implementation.
//!
//! Loads [`ClientConfig`] from `~/.config/spendlens/config.toml`, applies
//! environment overrides, and caches the result.

use crate::paths::SpendLensPaths;
use crate::storage::AtomicTomlFile;
use spendlens_core::config::ClientConfig;
use spendlens_core::error::Result;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

/// Overrides `api_base_url` when set and non-empty.
pub const API_BASE_URL_ENV: &str = "SPENDLENS_API_BASE_URL";

/// Loads and caches the client configuration.
#[derive(Clone)]
pub struct ConfigService {
    paths: SpendLensPaths,
    /// Cached configuration, filled on first access.
    config: Arc<RwLock<Option<ClientConfig>>>,
}

impl ConfigService {
    pub fn new(paths: SpendLensPaths) -> Self {
        Self {
            paths,
            config: Arc::new(RwLock::new(None)),
        }
    }

    /// Gets the configuration, loading it on first access.
    ///
    /// A missing or unreadable file falls back to defaults; environment
    /// overrides apply either way.
    pub fn get_config(&self) -> ClientConfig {
        {
            let cached = self
                .config
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(config) = cached.as_ref() {
                return config.clone();
            }
        }

        let mut loaded = match self.load_file() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load config.toml, using defaults");
                ClientConfig::default()
            }
        };
        apply_env_overrides(&mut loaded, std::env::var(API_BASE_URL_ENV).ok());

        let mut cached = self
            .config
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *cached = Some(loaded.clone());
        loaded
    }

    /// Invalidates the cache, forcing a reload on next access.
    pub fn invalidate_cache(&self) {
        let mut cached = self
            .config
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *cached = None;
    }

    /// Writes a default `config.toml` unless one exists.
    ///
    /// # Returns
    ///
    /// The path of the config file, existing or newly created.
    pub fn ensure_config_file(&self) -> Result<PathBuf> {
        let path = self.paths.config_file()?;
        let file = AtomicTomlFile::<ClientConfig>::new(path.clone());
        if !file.exists() {
            file.save(&ClientConfig::default())?;
            tracing::info!(path = %path.display(), "Created default config file");
        }
        Ok(path)
    }

    fn load_file(&self) -> Result<ClientConfig> {
        let path = self.paths.config_file()?;
        let config = AtomicTomlFile::<ClientConfig>::new(path.clone()).load()?;
        match config {
            Some(config) => {
                tracing::debug!(path = %path.display(), "Loaded config file");
                Ok(config)
            }
            None => Ok(ClientConfig::default()),
        }
    }
}

fn apply_env_overrides(config: &mut ClientConfig, base_url: Option<String>) {
    if let Some(url) = base_url.filter(|url| !url.trim().is_empty()) {
        tracing::debug!(url = %url, "Using API base URL from {}", API_BASE_URL_ENV);
        config.api_base_url = url.trim().to_string();
    }
}
