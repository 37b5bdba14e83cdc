//! Credential lookup facade
//!
//! [`Credentials`] wraps the credential store selected for the run and gives
//! service plugins a uniform way to fetch and store secrets. It is built once
//! and handed to plugins through [`ServiceContext`](crate::ServiceContext).

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{Error, Result};
use crate::traits::{CredentialStore, Plugin};

/// Username stored for credentials that only carry a password or API key
pub const API_KEY_USERNAME: &str = "api-key";

/// A username and password pair
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// Account name, absent for token style credentials
    pub username: Option<String>,
    /// Password, token or API key
    pub password: String,
}

impl Credential {
    pub fn new(username: Option<String>, password: impl Into<String>) -> Self {
        Self {
            username,
            password: password.into(),
        }
    }

    /// Username or an error naming the lookup key.
    pub fn require_username(&self, key: &str) -> Result<&str> {
        self.username
            .as_deref()
            .ok_or_else(|| Error::credential(format!("No username stored for {key}")))
    }
}

// Keep secrets out of logs
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .finish()
    }
}

/// Credential facade over one credential store
#[derive(Clone)]
pub struct Credentials {
    store: Arc<dyn CredentialStore>,
}

impl Credentials {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Name of the backing store
    pub fn store_name(&self) -> &str {
        self.store.name()
    }

    /// Credentials stored under `key`
    pub async fn get(&self, key: &str) -> Result<Credential> {
        let mut credential = self.store.get_credentials(key).await.map_err(|e| match e {
            Error::Credential(_) => e,
            other => Error::credential(format!("Cannot read credentials for {key}: {other}")),
        })?;
        if credential.username.as_deref() == Some(API_KEY_USERNAME) {
            credential.username = None;
        }
        Ok(credential)
    }

    /// Credentials for `target_host` at `provider_key`
    ///
    /// Looks up `<target_host>.<provider_key>.ddupdate` first so one account
    /// per updated host is possible, then falls back to `provider_key`.
    pub async fn get_for_host(&self, provider_key: &str, target_host: &str) -> Result<Credential> {
        let per_host = format!("{target_host}.{provider_key}.ddupdate");
        match self.get(&per_host).await {
            Ok(credential) => Ok(credential),
            Err(e) => {
                debug!("No credentials for {}: {}, trying {}", per_host, e, provider_key);
                self.get(provider_key).await
            }
        }
    }

    /// Store credentials under `key`
    ///
    /// A missing username is stored as the `api-key` placeholder.
    pub async fn set(&self, key: &str, username: Option<&str>, password: &str) -> Result<()> {
        let username = username.filter(|u| !u.is_empty()).unwrap_or(API_KEY_USERNAME);
        self.store.set_credentials(key, username, password).await
    }
}

/// In-memory credential store
///
/// Not persistent. Used by tests and by embedders that inject secrets.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    inner: Arc<RwLock<HashMap<String, (String, String)>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder style insert for tests
    pub async fn with(self, key: &str, username: &str, password: &str) -> Self {
        self.inner
            .write()
            .await
            .insert(key.to_string(), (username.to_string(), password.to_string()));
        self
    }
}

impl Plugin for MemoryCredentialStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn oneliner(&self) -> &str {
        "Keep credentials in memory for the current run"
    }

    fn help(&self) -> &str {
        "Credentials live only as long as the process. Intended for testing."
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get_credentials(&self, key: &str) -> Result<Credential> {
        let guard = self.inner.read().await;
        let (username, password) = guard
            .get(key)
            .ok_or_else(|| Error::credential(format!("No credentials stored for {key}")))?;
        Ok(Credential::new(Some(username.clone()), password.clone()))
    }

    async fn set_credentials(&self, key: &str, username: &str, password: &str) -> Result<()> {
        self.inner
            .write()
            .await
            .insert(key.to_string(), (username.to_string(), password.to_string()));
        Ok(())
    }
}
