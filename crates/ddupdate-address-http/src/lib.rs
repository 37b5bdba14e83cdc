// # Web Address Plugins
//
// Address plugins asking web services for the external address, for hosts
// behind NAT:
//
// - `default-web-ip`: IPv4, three services tried in turn
// - `default-web-ip6`: IPv6, three services tried in turn
// - `ip.dnshome.de`: both families from dnshome.de
// - `onhub`: WAN address from an OnHub / Google Wifi router's status API
//
// [`WebAddressPlugin`] is also used for address plugins defined in plugin
// definition files.

pub mod dnshome;
pub mod onhub;
pub mod web;

pub use dnshome::DnsHomeAddressPlugin;
pub use onhub::OnHubAddressPlugin;
pub use web::{AddressFamily, DEFAULT_HTTP_TIMEOUT, WebAddressPlugin, extract_address};

use ddupdate_core::registry::{BuiltinSource, PluginUnit};
use std::sync::Arc;

/// Add the web address plugins to `source`
pub fn register(source: &mut BuiltinSource) {
    source.add(|| Ok(PluginUnit::Address(Arc::new(WebAddressPlugin::default_web_ip()))));
    source.add(|| Ok(PluginUnit::Address(Arc::new(WebAddressPlugin::default_web_ip6()))));
    source.add(|| Ok(PluginUnit::Address(Arc::new(DnsHomeAddressPlugin::new()))));
    source.add(|| Ok(PluginUnit::Address(Arc::new(OnHubAddressPlugin::new()))));
}
