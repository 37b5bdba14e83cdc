//! Test doubles and common utilities for engine contract tests
//!
//! The doubles count their calls so tests can assert which plugins the
//! engine invoked, without any network or filesystem access.

#![allow(dead_code)]

use async_trait::async_trait;
use ddupdate_core::cache::{AddressCache, CacheEntry, MemoryAddressCache};
use ddupdate_core::error::{Error, Result};
use ddupdate_core::registry::{BuiltinSource, PluginRegistry, PluginSource, PluginUnit};
use ddupdate_core::{
    AddressPlugin, Credentials, IpAddress, MemoryCredentialStore, Plugin, PluginOptions,
    ServiceContext, ServicePlugin,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Address plugin returning a fixed address
pub struct FixedAddressPlugin {
    name: String,
    address: IpAddress,
    call_count: Arc<AtomicUsize>,
}

impl FixedAddressPlugin {
    pub fn new(name: &str, address: IpAddress) -> Self {
        Self {
            name: name.to_string(),
            address,
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Get the number of times get_ip() was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Create a new plugin that shares counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            name: other.name.clone(),
            address: other.address,
            call_count: Arc::clone(&other.call_count),
        }
    }
}

impl Plugin for FixedAddressPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn oneliner(&self) -> &str {
        "Fixed test address"
    }

    fn help(&self) -> &str {
        "Returns the address it was built with"
    }
}

#[async_trait]
impl AddressPlugin for FixedAddressPlugin {
    async fn get_ip(&self, _options: &PluginOptions) -> Result<IpAddress> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        Ok(self.address)
    }
}

/// Address plugin that always fails
pub struct FailingAddressPlugin;

impl Plugin for FailingAddressPlugin {
    fn name(&self) -> &str {
        "failing-address"
    }

    fn oneliner(&self) -> &str {
        "Always fails"
    }

    fn help(&self) -> &str {
        ""
    }
}

#[async_trait]
impl AddressPlugin for FailingAddressPlugin {
    async fn get_ip(&self, _options: &PluginOptions) -> Result<IpAddress> {
        Err(Error::address("no route to anything"))
    }
}

/// Address plugin that reads the interface from a required `if=` option
pub struct InterfaceAddressPlugin {
    address: IpAddress,
}

impl InterfaceAddressPlugin {
    pub fn new(address: IpAddress) -> Self {
        Self { address }
    }
}

impl Plugin for InterfaceAddressPlugin {
    fn name(&self) -> &str {
        "needs-if"
    }

    fn oneliner(&self) -> &str {
        "Requires if=<interface>"
    }

    fn help(&self) -> &str {
        ""
    }
}

#[async_trait]
impl AddressPlugin for InterfaceAddressPlugin {
    async fn get_ip(&self, options: &PluginOptions) -> Result<IpAddress> {
        options.require("if")?;
        Ok(self.address)
    }
}

/// Cache that reads like a memory cache but refuses every write
#[derive(Default)]
pub struct ReadOnlyCache {
    inner: MemoryAddressCache,
}

#[async_trait]
impl AddressCache for ReadOnlyCache {
    async fn read(&self, key: &str) -> Result<CacheEntry> {
        self.inner.read(key).await
    }

    async fn write(&self, key: &str, _address: &IpAddress) -> Result<()> {
        Err(Error::cache(format!("{key}: read-only file system")))
    }

    async fn clear(&self, key: &str) -> Result<()> {
        self.inner.clear(key).await
    }
}

/// A recorded register() call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterCall {
    pub hostname: String,
    pub address: Option<IpAddress>,
}

/// Service plugin that records its calls
pub struct MockServicePlugin {
    name: String,
    ttl_minutes: u64,
    fail: bool,
    calls: Arc<Mutex<Vec<RegisterCall>>>,
}

impl MockServicePlugin {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ttl_minutes: 120,
            fail: false,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A service whose every register() call fails
    pub fn failing(name: &str) -> Self {
        Self {
            fail: true,
            ..Self::new(name)
        }
    }

    pub fn with_ttl(mut self, ttl_minutes: u64) -> Self {
        self.ttl_minutes = ttl_minutes;
        self
    }

    /// Get the number of times register() was called
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Get the recorded register() calls
    pub fn calls(&self) -> Vec<RegisterCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Create a new plugin that shares counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            name: other.name.clone(),
            ttl_minutes: other.ttl_minutes,
            fail: other.fail,
            calls: Arc::clone(&other.calls),
        }
    }
}

impl Plugin for MockServicePlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn oneliner(&self) -> &str {
        "Records register calls"
    }

    fn help(&self) -> &str {
        ""
    }
}

#[async_trait]
impl ServicePlugin for MockServicePlugin {
    fn cache_ttl_minutes(&self) -> u64 {
        self.ttl_minutes
    }

    async fn register(
        &self,
        _ctx: &ServiceContext,
        hostname: &str,
        address: Option<&IpAddress>,
        _options: &PluginOptions,
    ) -> Result<()> {
        self.calls.lock().unwrap().push(RegisterCall {
            hostname: hostname.to_string(),
            address: address.copied(),
        });
        if self.fail {
            return Err(Error::registration(&self.name, "service rejected the update"));
        }
        Ok(())
    }
}

/// Registry holding the given units as builtins
pub fn registry_with(units: Vec<PluginUnit>) -> Arc<PluginRegistry> {
    let mut builtins = BuiltinSource::new();
    for unit in units {
        builtins.add_unit(unit);
    }
    let sources: Vec<Box<dyn PluginSource>> = vec![Box::new(builtins)];
    Arc::new(PluginRegistry::discover(&sources))
}

/// Credentials backed by an empty memory store
pub fn empty_credentials() -> Credentials {
    Credentials::new(Arc::new(MemoryCredentialStore::new()))
}
