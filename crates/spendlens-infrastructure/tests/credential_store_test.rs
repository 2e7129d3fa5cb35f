//! Session state survives a restart through the TOML credential store.

use spendlens_core::credentials::{CredentialKey, CredentialStore};
use spendlens_core::session::{SessionManager, SessionStatus, TokenPair};
use spendlens_infrastructure::{SpendLensPaths, TomlCredentialStore};
use std::sync::Arc;
use tempfile::TempDir;

fn open(temp_dir: &TempDir) -> Arc<TomlCredentialStore> {
    Arc::new(TomlCredentialStore::open(&SpendLensPaths::new(Some(temp_dir.path()))).unwrap())
}

#[test]
fn test_login_survives_restart() {
    let temp_dir = TempDir::new().unwrap();

    let first = SessionManager::restore(open(&temp_dir)).unwrap();
    first
        .establish(TokenPair::new("access", "refresh"), "alice")
        .unwrap();

    let restarted = SessionManager::restore(open(&temp_dir)).unwrap();
    assert_eq!(
        restarted.status(),
        SessionStatus::Authenticated {
            username: "alice".to_string()
        }
    );
    assert_eq!(restarted.bearer().unwrap().token, "access");
}

#[test]
fn test_logout_leaves_no_token_on_disk() {
    let temp_dir = TempDir::new().unwrap();
    let store = open(&temp_dir);

    let manager = SessionManager::restore(store.clone()).unwrap();
    manager
        .establish(TokenPair::new("access", "refresh"), "alice")
        .unwrap();
    assert!(manager.logout().unwrap());

    assert_eq!(store.get(CredentialKey::Token).unwrap(), None);
    assert!(!store.path().exists());

    let restarted = SessionManager::restore(open(&temp_dir)).unwrap();
    assert_eq!(restarted.status(), SessionStatus::Anonymous);
}
