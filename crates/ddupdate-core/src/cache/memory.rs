// # Memory Address Cache
//
// In-memory implementation of AddressCache. Nothing survives the process, so
// the first run always registers.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{AddressCache, CacheEntry};
use crate::address::IpAddress;
use crate::error::Result;

/// In-memory address cache
#[derive(Debug, Clone, Default)]
pub struct MemoryAddressCache {
    inner: Arc<RwLock<HashMap<String, (IpAddress, DateTime<Utc>)>>>,
}

impl MemoryAddressCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the entry for `service` look `minutes` older
    pub async fn backdate(&self, service: &str, minutes: i64) {
        if let Some(entry) = self.inner.write().await.get_mut(service) {
            entry.1 -= Duration::minutes(minutes);
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl AddressCache for MemoryAddressCache {
    async fn read(&self, service: &str) -> Result<CacheEntry> {
        let guard = self.inner.read().await;
        Ok(match guard.get(service) {
            Some((address, written)) => CacheEntry {
                address: *address,
                age_minutes: Utc::now()
                    .signed_duration_since(*written)
                    .num_minutes()
                    .max(0) as u64,
            },
            None => CacheEntry::missing(),
        })
    }

    async fn write(&self, service: &str, address: &IpAddress) -> Result<()> {
        self.inner
            .write()
            .await
            .insert(service.to_string(), (*address, Utc::now()));
        Ok(())
    }

    async fn clear(&self, service: &str) -> Result<()> {
        self.inner.write().await.remove(service);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[tokio::test]
    async fn write_read_and_backdate() {
        let cache = MemoryAddressCache::new();
        assert!(cache.read("svc").await.unwrap().is_missing());

        let address = IpAddress::from_v4(Ipv4Addr::new(192, 0, 2, 1));
        cache.write("svc", &address).await.unwrap();
        let entry = cache.read("svc").await.unwrap();
        assert_eq!(entry.address, address);
        assert_eq!(entry.age_minutes, 0);

        cache.backdate("svc", 90).await;
        assert_eq!(cache.read("svc").await.unwrap().age_minutes, 90);

        cache.clear("svc").await.unwrap();
        assert!(cache.is_empty().await);
    }
}
