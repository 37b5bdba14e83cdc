// # File Address Cache
//
// File-based implementation of AddressCache.
//
// ## Layout
//
// One file per cache key, `<dir>/<service>.ip` for the default section and
// `<dir>/<service>@<section>.ip` for named ones, holding the address as JSON:
//
// ```json
// { "v4": "203.0.113.9", "v6": null }
// ```
//
// The entry age is taken from the file modification time.
//
// ## Crash Safety
//
// - Writes go to `<key>.ip.tmp` and are renamed over the entry
// - An entry that does not parse is removed and reads as missing

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace, warn};

use super::{AddressCache, CacheEntry};
use crate::address::IpAddress;
use crate::error::{Error, Result};

/// File-based address cache
///
/// # Example
///
/// ```rust,no_run
/// use ddupdate_core::cache::{AddressCache, FileAddressCache};
/// use ddupdate_core::IpAddress;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let cache = FileAddressCache::new("/var/cache/ddupdate");
///     cache.write("duckdns.org", &IpAddress::from_v4("203.0.113.9".parse()?)).await?;
///     let entry = cache.read("duckdns.org").await?;
///     assert_eq!(entry.age_minutes, 0);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FileAddressCache {
    dir: PathBuf,
}

impl FileAddressCache {
    /// Create a cache rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the entry for cache key `service`
    pub fn entry_path(&self, service: &str) -> PathBuf {
        self.dir.join(format!("{}.ip", file_stem(service)))
    }

    fn temp_path(&self, service: &str) -> PathBuf {
        self.dir.join(format!("{}.ip.tmp", file_stem(service)))
    }

    async fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).await.map_err(|e| {
            Error::cache(format!(
                "Failed to create cache directory {}: {}",
                self.dir.display(),
                e
            ))
        })
    }
}

// Cache keys become file names; keep them to a safe character set.
fn file_stem(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '@') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn age_minutes(modified: std::time::SystemTime) -> u64 {
    let modified: DateTime<Utc> = modified.into();
    Utc::now()
        .signed_duration_since(modified)
        .num_minutes()
        .max(0) as u64
}

#[async_trait]
impl AddressCache for FileAddressCache {
    async fn read(&self, service: &str) -> Result<CacheEntry> {
        let path = self.entry_path(service);

        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No cached address for {}", service);
                return Ok(CacheEntry::missing());
            }
            Err(e) => {
                warn!("Cannot read cache entry {}: {}", path.display(), e);
                return Ok(CacheEntry::missing());
            }
        };

        let address: IpAddress = match serde_json::from_str(&content) {
            Ok(address) => address,
            Err(e) => {
                debug!("Removing unparsable cache entry {}: {}", path.display(), e);
                if let Err(e) = fs::remove_file(&path).await {
                    warn!("Cannot remove cache entry {}: {}", path.display(), e);
                }
                return Ok(CacheEntry::missing());
            }
        };

        let age_minutes = match fs::metadata(&path).await.and_then(|m| m.modified()) {
            Ok(modified) => age_minutes(modified),
            Err(e) => {
                warn!("Cannot stat cache entry {}: {}", path.display(), e);
                return Ok(CacheEntry::missing());
            }
        };

        debug!("Cached address for {}: {} ({} min old)", service, address, age_minutes);
        Ok(CacheEntry {
            address,
            age_minutes,
        })
    }

    async fn write(&self, service: &str, address: &IpAddress) -> Result<()> {
        self.ensure_dir().await?;

        let json = serde_json::to_string(address)?;
        let temp_path = self.temp_path(service);
        let path = self.entry_path(service);
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::cache(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            file.write_all(json.as_bytes()).await.map_err(|e| {
                Error::cache(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            file.flush().await.map_err(|e| {
                Error::cache(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        fs::rename(&temp_path, &path).await.map_err(|e| {
            Error::cache(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                path.display(),
                e
            ))
        })?;

        trace!("Cache entry written: {}", path.display());
        Ok(())
    }

    async fn clear(&self, service: &str) -> Result<()> {
        let path = self.entry_path(service);
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Cleared cache entry {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::cache(format!(
                "Failed to remove {}: {}",
                path.display(),
                e
            ))),
        }
    }
}
