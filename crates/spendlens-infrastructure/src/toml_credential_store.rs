//! File-backed credential store.
//!
//! Credentials live in `credentials.toml`:
//!
//! ```toml
//! token = "..."
//! refresh_token = "..."
//! username = "alice"
//! ```
//!
//! Every write goes through [`AtomicTomlFile::update`], so concurrent CLI
//! invocations never observe a half-written file.

use crate::paths::SpendLensPaths;
use crate::storage::AtomicTomlFile;
use serde::{Deserialize, Serialize};
use spendlens_core::credentials::{CredentialKey, CredentialStore};
use spendlens_core::error::Result;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CredentialsDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    username: Option<String>,
}

impl CredentialsDocument {
    fn slot(&mut self, key: CredentialKey) -> &mut Option<String> {
        match key {
            CredentialKey::Token => &mut self.token,
            CredentialKey::RefreshToken => &mut self.refresh_token,
            CredentialKey::Username => &mut self.username,
        }
    }

    fn is_empty(&self) -> bool {
        self.token.is_none() && self.refresh_token.is_none() && self.username.is_none()
    }
}

/// [`CredentialStore`] persisted as a mode-600 TOML file.
pub struct TomlCredentialStore {
    file: AtomicTomlFile<CredentialsDocument>,
}

impl TomlCredentialStore {
    /// Opens the store at the default location.
    ///
    /// # Errors
    ///
    /// Fails when the platform config directory cannot be determined.
    pub fn open(paths: &SpendLensPaths) -> Result<Self> {
        Ok(Self::at(paths.credentials_file()?))
    }

    /// Opens the store at an explicit path. The file is created on first write.
    pub fn at(path: PathBuf) -> Self {
        Self {
            file: AtomicTomlFile::new(path).with_mode(0o600),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.file.path().to_path_buf()
    }

    fn read(&self) -> Result<CredentialsDocument> {
        Ok(self.file.load()?.unwrap_or_default())
    }
}

impl CredentialStore for TomlCredentialStore {
    fn get(&self, key: CredentialKey) -> Result<Option<String>> {
        let mut document = self.read()?;
        Ok(document.slot(key).take())
    }

    fn set(&self, key: CredentialKey, value: &str) -> Result<()> {
        self.file.update(CredentialsDocument::default(), |document| {
            *document.slot(key) = Some(value.to_string());
            Ok(())
        })?;
        tracing::debug!(key = key.as_str(), path = %self.file.path().display(), "Credential stored");
        Ok(())
    }

    fn remove(&self, key: CredentialKey) -> Result<()> {
        if !self.file.exists() {
            return Ok(());
        }
        let remaining = self.file.update(CredentialsDocument::default(), |document| {
            *document.slot(key) = None;
            Ok(())
        })?;
        if remaining.is_empty() {
            self.file.remove()?;
        }
        Ok(())
    }

    /// Deletes the whole file in one step.
    fn clear(&self) -> Result<()> {
        self.file.remove()?;
        tracing::debug!(path = %self.file.path().display(), "Credentials cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spendlens_core::credentials::StoredCredentials;
    use tempfile::TempDir;

    fn store(temp_dir: &TempDir) -> TomlCredentialStore {
        TomlCredentialStore::open(&SpendLensPaths::new(Some(temp_dir.path()))).unwrap()
    }

    #[test]
    fn test_set_get_and_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let first = store(&temp_dir);
        first.set(CredentialKey::Token, "tok").unwrap();
        first.set(CredentialKey::Username, "alice").unwrap();

        let reopened = store(&temp_dir);
        assert_eq!(reopened.get(CredentialKey::Token).unwrap().as_deref(), Some("tok"));
        assert_eq!(reopened.get(CredentialKey::RefreshToken).unwrap(), None);
        assert_eq!(
            reopened.get(CredentialKey::Username).unwrap().as_deref(),
            Some("alice")
        );
    }

    #[test]
    fn test_clear_removes_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        for key in CredentialKey::ALL {
            store.set(key, "value").unwrap();
        }

        store.clear().unwrap();
        assert!(!store.path().exists());
        assert!(StoredCredentials::load_from(&store).unwrap().is_empty());
        store.clear().unwrap();
    }

    #[test]
    fn test_removing_last_key_removes_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        store.set(CredentialKey::Token, "tok").unwrap();
        store.set(CredentialKey::Username, "alice").unwrap();

        store.remove(CredentialKey::Token).unwrap();
        assert!(store.path().exists());
        store.remove(CredentialKey::Username).unwrap();
        assert!(!store.path().exists());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        std::fs::write(store.path(), "token = ").unwrap();
        let err = store.get(CredentialKey::Token).unwrap_err();
        assert!(err.is_serialization());
    }

    #[cfg(unix)]
    #[test]
    fn test_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        store.set(CredentialKey::Token, "tok").unwrap();
        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
