// # Credential Store Trait
//
// Pluggable storage for service credentials. Exactly one store is active per
// run; service plugins reach it through `Credentials`, never directly.

use async_trait::async_trait;

use super::Plugin;
use crate::credentials::Credential;
use crate::error::Result;

/// Trait for credential store implementations
#[async_trait]
pub trait CredentialStore: Plugin {
    /// Look up the credentials stored under `key`
    ///
    /// A missing entry is an error, not an empty credential.
    async fn get_credentials(&self, key: &str) -> Result<Credential>;

    /// Store `username` and `password` under `key`, replacing any old entry
    async fn set_credentials(&self, key: &str, username: &str, password: &str) -> Result<()>;
}
