//! Address cache implementations
//!
//! The cache remembers, per section, the last address that was
//! registered successfully and how long ago that happened. The engine uses
//! it to skip updates that would not change anything.
//!
//! - [`FileAddressCache`]: one file per key, survives restarts
//! - [`MemoryAddressCache`]: in-process only

pub mod file;
pub mod memory;

pub use file::FileAddressCache;
pub use memory::MemoryAddressCache;

use async_trait::async_trait;

use crate::address::IpAddress;
use crate::error::Result;

/// Cached address and its age
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEntry {
    /// Last registered address, empty if none or if the service chose it
    pub address: IpAddress,
    /// Whole minutes since the entry was written
    pub age_minutes: u64,
}

impl CacheEntry {
    /// Age reported for a service that has never been updated
    pub const NEVER_WRITTEN_AGE: u64 = u64::MAX;

    /// Entry returned when nothing is cached
    pub fn missing() -> Self {
        Self {
            address: IpAddress::default(),
            age_minutes: Self::NEVER_WRITTEN_AGE,
        }
    }

    pub fn is_missing(&self) -> bool {
        self.age_minutes == Self::NEVER_WRITTEN_AGE
    }
}

/// Trait for address cache implementations
///
/// Keys come from [`SectionConfig::cache_key`](crate::SectionConfig::cache_key):
/// the service plugin name, qualified by section name for named sections.
/// A missing or unreadable entry reads as
/// [`CacheEntry::missing`]; only I/O failures while writing or clearing are
/// reported as errors.
#[async_trait]
pub trait AddressCache: Send + Sync {
    /// Cached entry for `service`
    async fn read(&self, service: &str) -> Result<CacheEntry>;

    /// Record `address` as registered for `service` now
    async fn write(&self, service: &str, address: &IpAddress) -> Result<()>;

    /// Forget the entry for `service`; no-op if there is none
    async fn clear(&self, service: &str) -> Result<()>;
}
