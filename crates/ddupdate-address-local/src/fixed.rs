//! Addresses that need no lookup

use async_trait::async_trait;
use ddupdate_core::{AddressPlugin, Error, IpAddress, Plugin, PluginOptions, Result};
use std::net::{Ipv4Addr, Ipv6Addr};

/// `hardcoded-ip`: addresses given as options
#[derive(Debug, Clone, Default)]
pub struct HardcodedAddressPlugin;

impl Plugin for HardcodedAddressPlugin {
    fn name(&self) -> &str {
        "hardcoded-ip"
    }

    fn oneliner(&self) -> &str {
        "Use address from configuration"
    }

    fn help(&self) -> &str {
        "\
Returns the address given as options, for hosts with a static address
or for testing.

Options:
    ip=<IPv4 address>
    ip6=<IPv6 address>
At least one of them is required."
    }
}

fn parse_option<T: std::str::FromStr>(options: &PluginOptions, key: &str) -> Result<Option<T>> {
    options
        .get(key)
        .map(|value| {
            value
                .parse::<T>()
                .map_err(|_| Error::invalid_option(format!("Bad address {key}={value}")))
        })
        .transpose()
}

#[async_trait]
impl AddressPlugin for HardcodedAddressPlugin {
    async fn get_ip(&self, options: &PluginOptions) -> Result<IpAddress> {
        let v4 = parse_option::<Ipv4Addr>(options, "ip")?;
        let v6 = parse_option::<Ipv6Addr>(options, "ip6")?;
        let address = IpAddress::new(v4, v6);
        if address.is_empty() {
            return Err(Error::invalid_option("Required option ip=<address> or ip6=<address> missing"));
        }
        Ok(address)
    }
}

/// `ip-disabled`: let the service use the request's source address
#[derive(Debug, Clone, Default)]
pub struct DisabledAddressPlugin;

impl Plugin for DisabledAddressPlugin {
    fn name(&self) -> &str {
        "ip-disabled"
    }

    fn oneliner(&self) -> &str {
        "Force update service to use the address it sees"
    }

    fn help(&self) -> &str {
        "\
Returns no address at all. Services that support it then register the
address the update request comes from."
    }
}

#[async_trait]
impl AddressPlugin for DisabledAddressPlugin {
    async fn get_ip(&self, _options: &PluginOptions) -> Result<IpAddress> {
        Ok(IpAddress::default())
    }
}
