//! Addresses of local network interfaces, read through ip(8)

use async_trait::async_trait;
use ddupdate_core::{AddressPlugin, Error, IpAddress, Plugin, PluginOptions, Result};
use std::time::Duration;
use tracing::debug;

use crate::command::{DEFAULT_COMMAND_TIMEOUT, run_command};

/// Interface of the first `default` route in `ip route` output
pub fn default_route_interface(routes: &str) -> Option<&str> {
    routes
        .lines()
        .filter(|line| line.split_whitespace().next() == Some("default"))
        .find_map(|line| {
            let mut words = line.split_whitespace();
            words.by_ref().find(|w| *w == "dev")?;
            words.next()
        })
}

/// Runs ip(8); the program is swappable for tests
#[derive(Debug, Clone)]
struct IpTool {
    program: String,
    timeout: Duration,
}

impl IpTool {
    fn new() -> Self {
        Self {
            program: "ip".to_string(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    async fn interface_address(&self, interface: &str) -> Result<IpAddress> {
        let output = run_command(
            &self.program,
            &["address", "show", "dev", interface],
            self.timeout,
        )
        .await?;
        IpAddress::parse_ip_output(&output)
            .map_err(|e| Error::address(format!("Interface {interface}: {e}")))
    }

    async fn default_interface(&self) -> Result<String> {
        let routes = run_command(&self.program, &["route"], self.timeout).await?;
        default_route_interface(&routes)
            .map(str::to_string)
            .ok_or_else(|| Error::address("No default route found"))
    }
}

/// `default-if`: address of the interface carrying the default route
#[derive(Debug, Clone)]
pub struct DefaultInterfacePlugin {
    ip: IpTool,
}

impl DefaultInterfacePlugin {
    pub fn new() -> Self {
        Self { ip: IpTool::new() }
    }

    /// Use `program` instead of `ip`
    pub fn with_ip_program(program: impl Into<String>) -> Self {
        Self {
            ip: IpTool {
                program: program.into(),
                ..IpTool::new()
            },
        }
    }
}

impl Default for DefaultInterfacePlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for DefaultInterfacePlugin {
    fn name(&self) -> &str {
        "default-if"
    }

    fn oneliner(&self) -> &str {
        "Get ip address from default interface (linux)"
    }

    fn help(&self) -> &str {
        "\
Uses the first default route in `ip route` output to find the default
interface, then reads its address with `ip address show dev <if>`.
Link-local and deprecated IPv6 addresses are skipped.

Usable when the host is directly connected to the internet; behind NAT
the interface address is a private one."
    }
}

#[async_trait]
impl AddressPlugin for DefaultInterfacePlugin {
    async fn get_ip(&self, _options: &PluginOptions) -> Result<IpAddress> {
        let interface = self.ip.default_interface().await?;
        debug!("Default interface: {}", interface);
        self.ip.interface_address(&interface).await
    }
}

/// `hardcoded-if`: address of the interface named by `if=`
#[derive(Debug, Clone)]
pub struct NamedInterfacePlugin {
    ip: IpTool,
}

impl NamedInterfacePlugin {
    pub fn new() -> Self {
        Self { ip: IpTool::new() }
    }

    /// Use `program` instead of `ip`
    pub fn with_ip_program(program: impl Into<String>) -> Self {
        Self {
            ip: IpTool {
                program: program.into(),
                ..IpTool::new()
            },
        }
    }
}

impl Default for NamedInterfacePlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for NamedInterfacePlugin {
    fn name(&self) -> &str {
        "hardcoded-if"
    }

    fn oneliner(&self) -> &str {
        "Get address from a configured interface (linux)"
    }

    fn help(&self) -> &str {
        "\
Reads the address of a given interface with `ip address show dev <if>`.

Options:
    if=<interface>   Interface name, required"
    }
}

#[async_trait]
impl AddressPlugin for NamedInterfacePlugin {
    async fn get_ip(&self, options: &PluginOptions) -> Result<IpAddress> {
        let interface = options.require("if")?;
        self.ip.interface_address(interface).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    const ROUTES: &str = "\
10.0.0.0/24 dev wlan0 proto kernel scope link src 10.0.0.12
default via 10.0.0.1 dev wlan0 proto dhcp metric 600
default via 192.168.1.1 dev eth0 metric 700
";

    #[test]
    fn first_default_route_wins() {
        assert_eq!(default_route_interface(ROUTES), Some("wlan0"));
        assert_eq!(default_route_interface("10.0.0.0/8 dev eth0\n"), None);
        assert_eq!(default_route_interface("default via 10.0.0.1\n"), None);
    }

    #[tokio::test]
    async fn hardcoded_if_requires_option() {
        let err = NamedInterfacePlugin::new()
            .get_ip(&PluginOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidOption(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn default_if_reads_routes_then_interface() {
        let dir = std::env::temp_dir().join(format!("ddupdate-ip-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let script = dir.join("fake-ip");
        std::fs::write(
            &script,
            "#!/bin/sh\n\
             if [ \"$1\" = route ]; then\n\
               echo 'default via 10.0.0.1 dev eth7'\n\
             elif [ \"$4\" = eth7 ]; then\n\
               echo '2: eth7: <UP>'\n\
               echo '    inet 10.0.0.12/24 brd 10.0.0.255 scope global eth7'\n\
             else exit 1; fi\n",
        )
        .unwrap();
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let plugin = DefaultInterfacePlugin::with_ip_program(script.to_string_lossy());
        let address = plugin.get_ip(&PluginOptions::new()).await.unwrap();
        assert_eq!(address, IpAddress::from_v4(Ipv4Addr::new(10, 0, 0, 12)));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
