//! Durable storage for the session token.
//!
//! The only state that survives a restart is one bearer token; everything
//! else is re-derived through `GET /me`. The store is intentionally a
//! synchronous trait: the session reducer persists and clears the token in
//! the same locked state transition that updates the in-memory session, so
//! the durable and in-memory views can never be observed out of sync.

use crate::types::AuthToken;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from the credential store.
#[derive(Debug, Error)]
pub enum CredentialStoreError {
    /// Reading or writing the backing file failed.
    #[error("credential storage failed: {0}")]
    Io(String),

    /// The stored payload could not be encoded or decoded.
    #[error("credential payload invalid: {0}")]
    Payload(String),
}

/// Durable key/value storage for the session token.
pub trait CredentialStore: Send + Sync {
    /// Read the stored token, `None` when logged out.
    ///
    /// # Errors
    ///
    /// Returns an error when the backing storage is unreadable or corrupt.
    fn load(&self) -> Result<Option<AuthToken>, CredentialStoreError>;

    /// Persist the token, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error when the backing storage cannot be written.
    fn save(&self, token: &AuthToken) -> Result<(), CredentialStoreError>;

    /// Remove the stored token. Succeeds when nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns an error when the backing storage cannot be modified.
    fn clear(&self) -> Result<(), CredentialStoreError>;
}

/// On-disk payload; a struct rather than a bare string so the format can
/// grow without breaking stored files.
#[derive(Debug, Serialize, Deserialize)]
struct StoredCredentials {
    token: AuthToken,
}

/// File-backed credential store: one JSON file holding the token.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Create a store backed by the given file path. The file and its parent
    /// directories are created lazily on the first `save`.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Create a store at the platform default location
    /// (`<config dir>/sawari/credentials.json`).
    ///
    /// # Errors
    ///
    /// Returns an error when the platform config directory cannot be
    /// determined.
    pub fn default_location() -> Result<Self, CredentialStoreError> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| CredentialStoreError::Io("no config directory".to_string()))?;
        Ok(Self::new(config_dir.join("sawari").join("credentials.json")))
    }

    /// The path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<AuthToken>, CredentialStoreError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&self.path)
            .map_err(|e| CredentialStoreError::Io(e.to_string()))?;
        let stored: StoredCredentials = serde_json::from_str(&json)
            .map_err(|e| CredentialStoreError::Payload(e.to_string()))?;

        Ok(Some(stored.token))
    }

    fn save(&self, token: &AuthToken) -> Result<(), CredentialStoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| CredentialStoreError::Io(e.to_string()))?;
        }

        let stored = StoredCredentials {
            token: token.clone(),
        };
        let json = serde_json::to_string_pretty(&stored)
            .map_err(|e| CredentialStoreError::Payload(e.to_string()))?;

        fs::write(&self.path, json).map_err(|e| CredentialStoreError::Io(e.to_string()))
    }

    fn clear(&self) -> Result<(), CredentialStoreError> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| CredentialStoreError::Io(e.to_string()))?;
        }
        Ok(())
    }
}

/// In-memory credential store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryCredentialStore {
    token: std::sync::Mutex<Option<AuthToken>>,
}

impl MemoryCredentialStore {
    /// Create an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with a token.
    #[must_use]
    pub fn with_token(token: AuthToken) -> Self {
        Self {
            token: std::sync::Mutex::new(Some(token)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<AuthToken>, CredentialStoreError> {
        Ok(self
            .token
            .lock()
            .map_err(|_| CredentialStoreError::Io("lock poisoned".to_string()))?
            .clone())
    }

    fn save(&self, token: &AuthToken) -> Result<(), CredentialStoreError> {
        *self
            .token
            .lock()
            .map_err(|_| CredentialStoreError::Io("lock poisoned".to_string()))? =
            Some(token.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), CredentialStoreError> {
        *self
            .token
            .lock()
            .map_err(|_| CredentialStoreError::Io("lock poisoned".to_string()))? = None;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn file_store_round_trips_token() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("nested").join("credentials.json"));

        assert!(store.load().unwrap().is_none());

        let token = AuthToken::from("tok-123");
        store.save(&token).unwrap();
        assert_eq!(store.load().unwrap(), Some(token));

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        // Clearing again is fine.
        store.clear().unwrap();
    }

    #[test]
    fn file_store_rejects_corrupt_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, "not json").unwrap();

        let store = FileCredentialStore::new(&path);
        assert!(matches!(
            store.load(),
            Err(CredentialStoreError::Payload(_))
        ));
    }

    #[test]
    fn memory_store_round_trips_token() {
        let store = MemoryCredentialStore::new();
        assert!(store.load().unwrap().is_none());

        store.save(&AuthToken::from("tok")).unwrap();
        assert_eq!(store.load().unwrap(), Some(AuthToken::from("tok")));

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }
}
