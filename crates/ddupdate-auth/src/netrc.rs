//! netrc(5) credential store
//!
//! Lookup order for reading: `$NETRC`, `~/.netrc`, `/etc/netrc`. Writes go
//! to `$NETRC` or `~/.netrc`. Passwords are written base64 encoded; when
//! reading, a password that is not valid base64 text is used as is.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ddupdate_core::{Credential, CredentialStore, Error, Plugin, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

const HELP: &str = "\
Reads credentials from the netrc(5) file: $NETRC if set, else ~/.netrc,
else /etc/netrc. Entries look like

    machine www.duckdns.org login api-key password <base64 password>

Passwords are stored base64 encoded. Plain text passwords are accepted
when reading. The file should be readable by its owner only.";

/// One `machine` (or `default`) entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct NetrcEntry {
    login: Option<String>,
    password: Option<String>,
}

/// Parsed netrc file
#[derive(Debug, Default)]
struct Netrc {
    machines: Vec<(String, NetrcEntry)>,
    default: Option<NetrcEntry>,
}

impl Netrc {
    fn parse(text: &str) -> Netrc {
        let mut netrc = Netrc::default();
        let mut current: Option<(Option<String>, NetrcEntry)> = None;
        let mut lines = text.lines();

        let finish = |netrc: &mut Netrc, current: Option<(Option<String>, NetrcEntry)>| {
            match current {
                Some((Some(machine), entry)) => netrc.machines.push((machine, entry)),
                Some((None, entry)) => netrc.default = Some(entry),
                None => {}
            }
        };

        while let Some(line) = lines.next() {
            let line = line.split('#').next().unwrap_or_default();
            let mut tokens = line.split_whitespace();
            while let Some(token) = tokens.next() {
                match token {
                    "machine" => {
                        finish(&mut netrc, current.take());
                        let name = tokens.next().unwrap_or_default().to_string();
                        current = Some((Some(name), NetrcEntry::default()));
                    }
                    "default" => {
                        finish(&mut netrc, current.take());
                        current = Some((None, NetrcEntry::default()));
                    }
                    "login" => {
                        if let Some((_, entry)) = current.as_mut() {
                            entry.login = tokens.next().map(str::to_string);
                        }
                    }
                    "password" => {
                        if let Some((_, entry)) = current.as_mut() {
                            entry.password = tokens.next().map(str::to_string);
                        }
                    }
                    "account" => {
                        tokens.next();
                    }
                    "macdef" => {
                        // Macro body runs to the next empty line
                        for body in lines.by_ref() {
                            if body.trim().is_empty() {
                                break;
                            }
                        }
                        break;
                    }
                    _ => {}
                }
            }
        }
        finish(&mut netrc, current);
        netrc
    }

    fn authenticators(&self, machine: &str) -> Option<&NetrcEntry> {
        self.machines
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(machine))
            .map(|(_, entry)| entry)
            .or(self.default.as_ref())
    }
}

fn decode_password(stored: &str) -> String {
    STANDARD
        .decode(stored)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| stored.to_string())
}

fn names_machine(line: &str, machine: &str) -> bool {
    let words: Vec<&str> = line.split_whitespace().collect();
    words
        .windows(2)
        .any(|pair| pair[0] == "machine" && pair[1].eq_ignore_ascii_case(machine))
}

/// Credential store backed by the netrc(5) file
#[derive(Debug, Clone, Default)]
pub struct NetrcStore {
    path: Option<PathBuf>,
}

impl NetrcStore {
    /// Store using the standard netrc locations
    pub fn new() -> Self {
        Self::default()
    }

    /// Store using a fixed file
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    fn env_path() -> Option<PathBuf> {
        std::env::var_os("NETRC")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    }

    fn user_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".netrc"))
    }

    fn read_path(&self) -> Result<PathBuf> {
        if let Some(path) = self.path.clone().or_else(Self::env_path) {
            return Ok(path);
        }
        Self::user_path()
            .filter(|p| p.exists())
            .or_else(|| Some(PathBuf::from("/etc/netrc")).filter(|p| p.exists()))
            .ok_or_else(|| Error::credential("Cannot locate the netrc file"))
    }

    fn write_path(&self) -> Result<PathBuf> {
        self.path
            .clone()
            .or_else(Self::env_path)
            .or_else(Self::user_path)
            .ok_or_else(|| Error::credential("Cannot determine the home directory for ~/.netrc"))
    }

    async fn read_text(path: &Path) -> Result<String> {
        fs::read_to_string(path).await.map_err(|e| {
            Error::credential(format!("Cannot read netrc file {}: {}", path.display(), e))
        })
    }
}

impl Plugin for NetrcStore {
    fn name(&self) -> &str {
        "netrc"
    }

    fn oneliner(&self) -> &str {
        "Store credentials in .netrc(5)"
    }

    fn help(&self) -> &str {
        HELP
    }
}

#[async_trait]
impl CredentialStore for NetrcStore {
    async fn get_credentials(&self, key: &str) -> Result<Credential> {
        let path = self.read_path()?;
        debug!("Looking up {} in {}", key, path.display());
        let netrc = Netrc::parse(&Self::read_text(&path).await?);

        let entry = netrc
            .authenticators(key)
            .ok_or_else(|| Error::credential(format!("No .netrc data found for {key}")))?;
        let password = entry
            .password
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| Error::credential(format!("No password found for {key}")))?;

        Ok(Credential::new(entry.login.clone(), decode_password(password)))
    }

    async fn set_credentials(&self, key: &str, username: &str, password: &str) -> Result<()> {
        let path = self.write_path()?;
        let existing = match fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                return Err(Error::credential(format!(
                    "Cannot read netrc file {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let mut lines: Vec<String> = existing
            .lines()
            .filter(|line| !names_machine(line, key))
            .map(|line| line.trim().to_string())
            .collect();

        let mut entry = format!("machine {}", key.to_lowercase());
        if !username.is_empty() {
            entry.push_str(&format!(" login {username}"));
        }
        entry.push_str(&format!(" password {}", STANDARD.encode(password)));
        lines.push(entry);

        let mut text = lines.join("\n");
        text.push('\n');
        crate::write_private(&path, text.as_bytes()).await.map_err(|e| {
            Error::credential(format!("Cannot write netrc file {}: {}", path.display(), e))
        })?;
        debug!("Stored credentials for {} in {}", key, path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parses_machines_default_and_macdef() {
        let netrc = Netrc::parse(
            "machine a.example login alice password cGFzcw==\n\
             macdef init\n  cd /pub\n  bin\n\n\
             machine B.example\n  login bob\n  password plain\n\
             default login anon password guest\n",
        );
        let a = netrc.authenticators("a.example").unwrap();
        assert_eq!(a.login.as_deref(), Some("alice"));
        assert_eq!(decode_password(a.password.as_deref().unwrap()), "pass");

        let b = netrc.authenticators("b.example").unwrap();
        assert_eq!(b.login.as_deref(), Some("bob"));

        let other = netrc.authenticators("c.example").unwrap();
        assert_eq!(other.login.as_deref(), Some("anon"));
    }

    #[test]
    fn undecodable_password_is_used_verbatim() {
        assert_eq!(decode_password("not base64!"), "not base64!");
        assert_eq!(decode_password("aGVsbG8="), "hello");
    }

    #[tokio::test]
    async fn set_then_get_round_trip_replaces_old_entry() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("netrc");
        std::fs::write(
            &path,
            "machine other.example login x password eA==\nmachine DynV6.com password old\n",
        )
        .unwrap();
        let store = NetrcStore::with_path(&path);

        store.set_credentials("dynv6.com", "api-key", "s3cret").await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("dynv6.com").count(), 1, "old entry replaced: {text}");
        assert!(text.contains("other.example"));
        assert!(!text.contains("s3cret"), "password stored encoded");

        let credential = store.get_credentials("dynv6.com").await.unwrap();
        assert_eq!(credential.username.as_deref(), Some("api-key"));
        assert_eq!(credential.password, "s3cret");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[tokio::test]
    async fn missing_machine_is_credential_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("netrc");
        std::fs::write(&path, "machine a.example login a password cA==\n").unwrap();

        let err = NetrcStore::with_path(&path)
            .get_credentials("b.example")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Credential(_)));
    }
}
