//! Plugin registry
//!
//! The registry holds the address, service and auth plugins available to a
//! run, keyed by name. It is filled by scanning an ordered list of
//! [`PluginSource`]s; the first source that provides a name wins.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ddupdate_core::registry::{BuiltinSource, PluginRegistry, PluginSource};
//!
//! let mut builtins = BuiltinSource::new();
//! ddupdate_services::register(&mut builtins);
//!
//! let sources: Vec<Box<dyn PluginSource>> = vec![Box::new(builtins)];
//! let registry = PluginRegistry::discover(&sources);
//! let service = registry.service("duckdns.org")?;
//! ```

pub mod source;

pub use source::{BuiltinSource, DefinitionHeader, DefinitionLoader, DirectorySource, PluginSource};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::traits::{AddressPlugin, CredentialStore, Plugin, ServicePlugin};

/// Plugin capability classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// Finds the address to register
    Address,
    /// Registers an address with a DNS service
    Service,
    /// Stores credentials
    Auth,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Capability::Address => "address",
            Capability::Service => "service",
            Capability::Auth => "auth",
        })
    }
}

/// A loaded plugin of any capability
#[derive(Clone)]
pub enum PluginUnit {
    Address(Arc<dyn AddressPlugin>),
    Service(Arc<dyn ServicePlugin>),
    Auth(Arc<dyn CredentialStore>),
}

impl PluginUnit {
    pub fn capability(&self) -> Capability {
        match self {
            PluginUnit::Address(_) => Capability::Address,
            PluginUnit::Service(_) => Capability::Service,
            PluginUnit::Auth(_) => Capability::Auth,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            PluginUnit::Address(p) => p.name(),
            PluginUnit::Service(p) => p.name(),
            PluginUnit::Auth(p) => p.name(),
        }
    }
}

impl fmt::Debug for PluginUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PluginUnit({} {})", self.capability(), self.name())
    }
}

/// Listing and help data for one plugin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginDescriptor {
    pub name: String,
    pub oneliner: String,
    pub help: String,
    pub capability: Capability,
    /// Source the plugin was loaded from
    pub origin: String,
}

/// A duplicate plugin name that was dropped during discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginConflict {
    pub capability: Capability,
    pub name: String,
    /// Origin of the plugin that was kept
    pub kept: String,
    /// Origin of the plugin that was dropped
    pub dropped: String,
}

struct Entry<T: ?Sized> {
    plugin: Arc<T>,
    origin: String,
}

/// Registry of available plugins
#[derive(Default)]
pub struct PluginRegistry {
    addressers: BTreeMap<String, Entry<dyn AddressPlugin>>,
    services: BTreeMap<String, Entry<dyn ServicePlugin>>,
    auths: BTreeMap<String, Entry<dyn CredentialStore>>,
    conflicts: Vec<PluginConflict>,
}

impl PluginRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from `sources`, highest precedence first
    ///
    /// Units and sources that fail to load are skipped with a warning.
    pub fn discover(sources: &[Box<dyn PluginSource>]) -> Self {
        let mut registry = Self::new();
        for source in sources {
            let origin = source.origin();
            let units = match source.load() {
                Ok(units) => units,
                Err(e) => {
                    warn!("Skipping plugin source {}: {}", origin, e);
                    continue;
                }
            };
            for unit in units {
                match unit {
                    Ok(unit) => {
                        registry.insert(unit, &origin);
                    }
                    Err(e) => warn!("Skipping plugin from {}: {}", origin, e),
                }
            }
        }
        debug!(
            "Plugins loaded: {} address, {} service, {} auth",
            registry.addressers.len(),
            registry.services.len(),
            registry.auths.len()
        );
        registry
    }

    /// Add `unit` unless a plugin with the same name and capability exists
    ///
    /// # Returns
    ///
    /// `true` if the unit was added, `false` if it was dropped as a duplicate
    pub fn insert(&mut self, unit: PluginUnit, origin: &str) -> bool {
        let capability = unit.capability();
        let name = unit.name().to_string();
        let kept = match unit {
            PluginUnit::Address(p) => insert_first(&mut self.addressers, &name, p, origin),
            PluginUnit::Service(p) => insert_first(&mut self.services, &name, p, origin),
            PluginUnit::Auth(p) => insert_first(&mut self.auths, &name, p, origin),
        };
        match kept {
            None => true,
            Some(kept) => {
                warn!(
                    "Ignoring duplicate {} plugin {} from {} (already loaded from {})",
                    capability, name, origin, kept
                );
                self.conflicts.push(PluginConflict {
                    capability,
                    name,
                    kept,
                    dropped: origin.to_string(),
                });
                false
            }
        }
    }

    /// Look up an address plugin
    pub fn address(&self, name: &str) -> Result<Arc<dyn AddressPlugin>> {
        self.addressers
            .get(name)
            .map(|e| Arc::clone(&e.plugin))
            .ok_or_else(|| Error::unknown_plugin(Capability::Address, name))
    }

    /// Look up a service plugin
    pub fn service(&self, name: &str) -> Result<Arc<dyn ServicePlugin>> {
        self.services
            .get(name)
            .map(|e| Arc::clone(&e.plugin))
            .ok_or_else(|| Error::unknown_plugin(Capability::Service, name))
    }

    /// Look up a credential store
    pub fn auth(&self, name: &str) -> Result<Arc<dyn CredentialStore>> {
        self.auths
            .get(name)
            .map(|e| Arc::clone(&e.plugin))
            .ok_or_else(|| Error::unknown_plugin(Capability::Auth, name))
    }

    /// Plugins of one capability, sorted by name
    pub fn list(&self, capability: Capability) -> Vec<PluginDescriptor> {
        match capability {
            Capability::Address => describe_all(&self.addressers, capability),
            Capability::Service => describe_all(&self.services, capability),
            Capability::Auth => describe_all(&self.auths, capability),
        }
    }

    /// Help for the plugin called `name`
    ///
    /// Address plugins are searched first, then services, then auth plugins.
    pub fn help(&self, name: &str) -> Option<PluginDescriptor> {
        if let Some(e) = self.addressers.get(name) {
            return Some(describe(e, Capability::Address));
        }
        if let Some(e) = self.services.get(name) {
            return Some(describe(e, Capability::Service));
        }
        self.auths.get(name).map(|e| describe(e, Capability::Auth))
    }

    /// Duplicates dropped during discovery
    pub fn conflicts(&self) -> &[PluginConflict] {
        &self.conflicts
    }

    pub fn has(&self, capability: Capability, name: &str) -> bool {
        match capability {
            Capability::Address => self.addressers.contains_key(name),
            Capability::Service => self.services.contains_key(name),
            Capability::Auth => self.auths.contains_key(name),
        }
    }
}

// Returns the origin of the existing entry when `name` is taken.
fn insert_first<T: ?Sized>(
    map: &mut BTreeMap<String, Entry<T>>,
    name: &str,
    plugin: Arc<T>,
    origin: &str,
) -> Option<String> {
    if let Some(existing) = map.get(name) {
        return Some(existing.origin.clone());
    }
    map.insert(
        name.to_string(),
        Entry {
            plugin,
            origin: origin.to_string(),
        },
    );
    None
}

fn describe<T: Plugin + ?Sized>(entry: &Entry<T>, capability: Capability) -> PluginDescriptor {
    PluginDescriptor {
        name: entry.plugin.name().to_string(),
        oneliner: entry.plugin.oneliner().to_string(),
        help: entry.plugin.help().to_string(),
        capability,
        origin: entry.origin.clone(),
    }
}

fn describe_all<T: Plugin + ?Sized>(
    map: &BTreeMap<String, Entry<T>>,
    capability: Capability,
) -> Vec<PluginDescriptor> {
    map.values().map(|e| describe(e, capability)).collect()
}
