//! Persisted credential storage for the session token pair.
//!
//! The backend hands out an access/refresh token pair at sign-in; this
//! module owns where that pair lives between runs. The default store
//! keeps it as a single JSON entry in the OS keychain. An in-memory
//! store is provided for tests and ephemeral sessions.

use std::sync::{Mutex, PoisonError};

use keyring::Entry;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const SERVICE_NAME: &str = "marketspace";

/// Keychain account name the token pair is stored under.
const TOKEN_ENTRY: &str = "session-tokens";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("keychain error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("credential encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Where the session token pair is persisted.
///
/// Implementations must be cheap to call; the session manager caches the
/// access token and only goes back to the store on refresh or cold start.
pub trait CredentialStore: Send + Sync {
    fn get(&self) -> Result<Option<TokenPair>, StoreError>;
    fn save(&self, pair: &TokenPair) -> Result<(), StoreError>;
    fn remove(&self) -> Result<(), StoreError>;
}

/// Token storage backed by the OS keychain.
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self {
            service: SERVICE_NAME.to_string(),
        }
    }

    /// Use a custom keychain service name (e.g. per-environment builds).
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self) -> Result<Entry, StoreError> {
        Ok(Entry::new(&self.service, TOKEN_ENTRY)?)
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for KeyringStore {
    fn get(&self) -> Result<Option<TokenPair>, StoreError> {
        match self.entry()?.get_password() {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn save(&self, pair: &TokenPair) -> Result<(), StoreError> {
        let raw = serde_json::to_string(pair)?;
        self.entry()?.set_password(&raw)?;
        Ok(())
    }

    fn remove(&self) -> Result<(), StoreError> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// In-memory token storage for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Option<TokenPair>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self) -> Result<Option<TokenPair>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, pair: &TokenPair) -> Result<(), StoreError> {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = Some(pair.clone());
        Ok(())
    }

    fn remove(&self) -> Result<(), StoreError> {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
