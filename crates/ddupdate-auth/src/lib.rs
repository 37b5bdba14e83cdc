// # ddupdate-auth
//
// Credential stores selectable with `auth-plugin`:
//
// - `netrc`: the netrc(5) file, passwords base64 encoded
// - `secrets-file`: a TOML file under the user config directory
//
// Both files are created with mode 0600 and replaced atomically.

pub mod netrc;
pub mod secrets_file;

pub use netrc::NetrcStore;
pub use secrets_file::SecretsFileStore;

use ddupdate_core::registry::{BuiltinSource, PluginUnit};
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Add the credential stores to `source`
pub fn register(source: &mut BuiltinSource) {
    source.add(|| Ok(PluginUnit::Auth(Arc::new(NetrcStore::new()))));
    source.add(|| Ok(PluginUnit::Auth(Arc::new(SecretsFileStore::new()))));
}

/// Replace `path` with `contents`, readable by the owner only
///
/// The data goes to a sibling temp file created with mode 0600 and is then
/// renamed over `path`, so no reader ever sees it with wider permissions.
pub(crate) async fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    // A leftover temp file would keep its old mode
    if let Err(e) = fs::remove_file(&temp_path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            return Err(e);
        }
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(&temp_path).await?;
    file.write_all(contents).await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(&temp_path, path).await
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    fn mode(path: &Path) -> u32 {
        std::fs::metadata(path).unwrap().permissions().mode() & 0o777
    }

    #[tokio::test]
    async fn private_file_is_created_owner_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("netrc");

        write_private(&path, b"machine a password b\n").await.unwrap();
        assert_eq!(mode(&path), 0o600);
        assert_eq!(std::fs::read(&path).unwrap(), b"machine a password b\n");
        assert!(!dir.path().join("netrc.tmp").exists());
    }

    #[tokio::test]
    async fn private_file_replaces_wider_file_and_stale_temp() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("credentials.toml");
        let temp = dir.path().join("credentials.toml.tmp");
        for stale in [&path, &temp] {
            std::fs::write(stale, "old").unwrap();
            std::fs::set_permissions(stale, std::fs::Permissions::from_mode(0o644)).unwrap();
        }

        write_private(&path, b"new").await.unwrap();
        assert_eq!(mode(&path), 0o600);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
        assert!(!temp.exists());
    }
}
