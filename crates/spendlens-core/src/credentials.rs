//! Persisted credential store interface.
//!
//! The store is a small durable key/value map holding the access token, the
//! refresh token, and the cached username. Absence of [`CredentialKey::Token`]
//! means the client is anonymous.
//!
//! Only [`crate::session::SessionManager`] writes to a store. Other components
//! read session state through the manager so that every mutation is paired
//! with a notification.

use crate::error::Result;
use std::collections::HashMap;
use std::sync::Mutex;

/// Keys held by the credential store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKey {
    Token,
    RefreshToken,
    Username,
}

impl CredentialKey {
    /// All keys, in the order they are written.
    pub const ALL: [CredentialKey; 3] = [
        CredentialKey::Token,
        CredentialKey::RefreshToken,
        CredentialKey::Username,
    ];

    /// Storage name of the key.
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialKey::Token => "token",
            CredentialKey::RefreshToken => "refresh_token",
            CredentialKey::Username => "username",
        }
    }
}

/// Durable key/value storage for credentials.
///
/// Implementations must make `clear` remove every key, so that a cleared store
/// always reads back as anonymous.
pub trait CredentialStore: Send + Sync {
    /// Reads a value. Returns `Ok(None)` when the key is absent.
    fn get(&self, key: CredentialKey) -> Result<Option<String>>;

    /// Writes a value, replacing any previous one.
    fn set(&self, key: CredentialKey, value: &str) -> Result<()>;

    /// Removes a single key. Removing an absent key is not an error.
    fn remove(&self, key: CredentialKey) -> Result<()>;

    /// Removes all credential keys.
    fn clear(&self) -> Result<()> {
        for key in CredentialKey::ALL {
            self.remove(key)?;
        }
        Ok(())
    }
}

/// Snapshot of everything a store holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredCredentials {
    pub token: Option<String>,
    pub refresh_token: Option<String>,
    pub username: Option<String>,
}

impl StoredCredentials {
    /// Reads all three keys from `store`.
    pub fn load_from(store: &dyn CredentialStore) -> Result<Self> {
        Ok(Self {
            token: store.get(CredentialKey::Token)?,
            refresh_token: store.get(CredentialKey::RefreshToken)?,
            username: store.get(CredentialKey::Username)?,
        })
    }

    /// True when no access token is stored.
    pub fn is_empty(&self) -> bool {
        self.token.as_deref().is_none_or(str::is_empty)
    }
}

/// Process-local store, used for tests and for sessions that should not
/// outlive the process.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    values: Mutex<HashMap<CredentialKey, String>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with a token, as if a previous process had
    /// logged in.
    pub fn with_token(token: &str, refresh_token: &str, username: &str) -> Self {
        let store = Self::new();
        {
            let mut values = store.lock();
            values.insert(CredentialKey::Token, token.to_string());
            values.insert(CredentialKey::RefreshToken, refresh_token.to_string());
            values.insert(CredentialKey::Username, username.to_string());
        }
        store
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CredentialKey, String>> {
        self.values
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn get(&self, key: CredentialKey) -> Result<Option<String>> {
        Ok(self.lock().get(&key).cloned())
    }

    fn set(&self, key: CredentialKey, value: &str) -> Result<()> {
        self.lock().insert(key, value.to_string());
        Ok(())
    }

    fn remove(&self, key: CredentialKey) -> Result<()> {
        self.lock().remove(&key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.lock().clear();
        Ok(())
    }
}
