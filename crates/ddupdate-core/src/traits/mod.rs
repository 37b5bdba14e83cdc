//! Plugin capability traits
//!
//! - [`AddressPlugin`]: find the address to register
//! - [`ServicePlugin`]: push an address to a dynamic DNS service
//! - [`CredentialStore`]: look up and store service credentials
//!
//! All three share the [`Plugin`] descriptor methods used for listing and help.

pub mod address_plugin;
pub mod credential_store;
pub mod service_plugin;

pub use address_plugin::AddressPlugin;
pub use credential_store::CredentialStore;
pub use service_plugin::{DEFAULT_CACHE_TTL_MINUTES, ServiceContext, ServicePlugin};

/// Descriptive metadata every plugin provides
pub trait Plugin: Send + Sync {
    /// Unique name within the plugin's capability class
    fn name(&self) -> &str;

    /// One line description shown in plugin listings
    fn oneliner(&self) -> &str;

    /// Full help text
    fn help(&self) -> &str;
}
