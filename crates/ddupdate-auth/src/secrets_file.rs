//! TOML secrets file credential store
//!
//! Credentials live in `$XDG_CONFIG_HOME/ddupdate/credentials.toml`:
//!
//! ```toml
//! [machines."dynv6.com"]
//! username = "api-key"
//! password = "..."
//! ```

use async_trait::async_trait;
use ddupdate_core::{Credential, CredentialStore, Error, Plugin, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

const HELP: &str = "\
Keeps credentials in a TOML file, by default
$XDG_CONFIG_HOME/ddupdate/credentials.toml (~/.config when unset).
Each machine gets a table:

    [machines.\"dynv6.com\"]
    username = \"api-key\"
    password = \"secret\"

The file is created with mode 0600 by --set-credentials.";

#[derive(Debug, Default, Serialize, Deserialize)]
struct SecretsFile {
    #[serde(default)]
    machines: BTreeMap<String, MachineSecret>,
}

#[derive(Debug, Serialize, Deserialize)]
struct MachineSecret {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    password: String,
}

/// Credential store backed by a TOML file
#[derive(Debug, Clone, Default)]
pub struct SecretsFileStore {
    path: Option<PathBuf>,
}

impl SecretsFileStore {
    /// Store using the default location under the user config directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Store using a fixed file
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    fn path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.path {
            return Ok(path.clone());
        }
        dirs::config_dir()
            .map(|dir| dir.join("ddupdate").join("credentials.toml"))
            .ok_or_else(|| Error::credential("Cannot determine the user config directory"))
    }

    async fn load(path: &Path) -> Result<SecretsFile> {
        let text = match fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(SecretsFile::default());
            }
            Err(e) => {
                return Err(Error::credential(format!(
                    "Failed to read credentials file {}: {}",
                    path.display(),
                    e
                )));
            }
        };
        toml::from_str(&text).map_err(|e| {
            Error::credential(format!(
                "Failed to parse credentials file {}: {}",
                path.display(),
                e
            ))
        })
    }

    async fn save(path: &Path, secrets: &SecretsFile) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::credential(format!(
                    "Failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        let text = toml::to_string_pretty(secrets)
            .map_err(|e| Error::credential(format!("Failed to serialize credentials: {e}")))?;
        crate::write_private(path, text.as_bytes()).await.map_err(|e| {
            Error::credential(format!(
                "Failed to write credentials file {}: {}",
                path.display(),
                e
            ))
        })
    }
}

impl Plugin for SecretsFileStore {
    fn name(&self) -> &str {
        "secrets-file"
    }

    fn oneliner(&self) -> &str {
        "Store credentials in a private TOML file"
    }

    fn help(&self) -> &str {
        HELP
    }
}

#[async_trait]
impl CredentialStore for SecretsFileStore {
    async fn get_credentials(&self, key: &str) -> Result<Credential> {
        let path = self.path()?;
        let secrets = Self::load(&path).await?;
        let secret = secrets
            .machines
            .iter()
            .find(|(machine, _)| machine.eq_ignore_ascii_case(key))
            .map(|(_, secret)| secret)
            .ok_or_else(|| {
                Error::credential(format!(
                    "No credentials for {} in {}",
                    key,
                    path.display()
                ))
            })?;
        Ok(Credential::new(
            secret.username.clone(),
            secret.password.clone(),
        ))
    }

    async fn set_credentials(&self, key: &str, username: &str, password: &str) -> Result<()> {
        let path = self.path()?;
        let mut secrets = Self::load(&path).await?;
        secrets
            .machines
            .retain(|machine, _| !machine.eq_ignore_ascii_case(key));
        secrets.machines.insert(
            key.to_lowercase(),
            MachineSecret {
                username: Some(username.to_string()).filter(|u| !u.is_empty()),
                password: password.to_string(),
            },
        );
        Self::save(&path, &secrets).await?;
        debug!("Stored credentials for {} in {}", key, path.display());
        Ok(())
    }
}
