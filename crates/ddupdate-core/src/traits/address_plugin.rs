// # Address Plugin Trait
//
// Defines how the address to register is found.
//
// ## Implementations
//
// - Local interfaces and commands: `ddupdate-address-local` crate
// - HTTP echo services: `ddupdate-address-http` crate
//
// ## Usage
//
// ```rust,ignore
// use ddupdate_core::{AddressPlugin, PluginOptions};
//
// let options = PluginOptions::parse_str("if=eth0");
// let address = plugin.get_ip(&options).await?;
// println!("{address}");
// ```

use async_trait::async_trait;

use super::Plugin;
use crate::address::IpAddress;
use crate::error::Result;
use crate::options::PluginOptions;

/// Trait for address plugins
///
/// An address plugin answers one question: which address should be
/// registered right now. It does not look at the cache and does not decide
/// whether an update happens.
///
/// Returning an empty [`IpAddress`] is allowed and means the service should
/// use the address the update request comes from.
#[async_trait]
pub trait AddressPlugin: Plugin {
    /// Resolve the current address
    ///
    /// # Returns
    ///
    /// - `Ok(IpAddress)`: the resolved address, possibly empty
    /// - `Err(Error)`: the address cannot be determined
    async fn get_ip(&self, options: &PluginOptions) -> Result<IpAddress>;
}
