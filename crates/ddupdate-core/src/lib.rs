// # ddupdate-core
//
// Core library for the ddupdate dynamic DNS updater.
//
// ## Architecture Overview
//
// - **AddressPlugin**: finds the address to register
// - **ServicePlugin**: pushes an address to a dynamic DNS service
// - **CredentialStore**: stores service credentials, used through `Credentials`
// - **PluginRegistry**: name keyed plugin collections filled from plugin sources
// - **AddressCache**: last registered address per service, with its age
// - **UpdateEngine**: resolve, filter, check cache, register, record
//
// Plugin implementations live in their own crates and add themselves to a
// `BuiltinSource` through a `register` function.

pub mod address;
pub mod cache;
pub mod config;
pub mod credentials;
pub mod engine;
pub mod error;
pub mod options;
pub mod registry;
pub mod traits;

// Re-export core types for convenience
pub use address::{IpAddress, IpVersion};
pub use cache::{AddressCache, CacheEntry, FileAddressCache, MemoryAddressCache};
pub use config::{ConfigFile, SectionConfig, Settings};
pub use credentials::{Credential, Credentials, MemoryCredentialStore};
pub use engine::{RunReport, SectionOutcome, SectionReport, UpdateEngine};
pub use error::{Error, Result};
pub use options::PluginOptions;
pub use registry::{Capability, PluginDescriptor, PluginRegistry, PluginUnit};
pub use traits::{AddressPlugin, CredentialStore, Plugin, ServiceContext, ServicePlugin};
