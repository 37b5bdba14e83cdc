//! Plugin definition files
//!
//! A definition file adds one address or service plugin without code:
//!
//! ```toml
//! name = "example-dyndns"
//! oneliner = "Updates on example.net"
//! capability = "service"
//!
//! [service]
//! url = "https://example.net/nic/update?hostname={hostname}"
//! ipv4-param = "myip"
//! success = ["good", "nochg"]
//! match = "starts-with"
//! ```
//!
//! Address plugins use an `[address]` table with either `url`/`urls` and a
//! `family`, or a shell `command`.

use ddupdate_address_http::{AddressFamily, WebAddressPlugin};
use ddupdate_address_local::CommandAddressPlugin;
use ddupdate_core::registry::{DefinitionHeader, DefinitionLoader};
use ddupdate_core::{Capability, Error, PluginUnit, Result};
use ddupdate_services::{ServiceTemplate, TemplateConfig};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct ServiceDefinition {
    service: TemplateConfig,
}

#[derive(Debug, Deserialize)]
struct AddressDefinition {
    address: AddressTable,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct AddressTable {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    urls: Vec<String>,
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    family: AddressFamily,
}

/// Builds plugins from `*.toml` definition files
#[derive(Debug, Default)]
pub struct PluginDefinitionLoader;

impl DefinitionLoader for PluginDefinitionLoader {
    fn load_definition(&self, path: &Path) -> Result<PluginUnit> {
        let text = std::fs::read_to_string(path)?;
        let unit = parse_definition(&text)?;
        debug!("Loaded {} plugin {} from {}", unit.capability(), unit.name(), path.display());
        Ok(unit)
    }
}

/// Build the plugin described by definition file `text`
pub fn parse_definition(text: &str) -> Result<PluginUnit> {
    let header = DefinitionHeader::parse(text)?;
    let bad = |e: toml::de::Error| Error::config(format!("Plugin {}: {}", header.name, e));

    match header.capability {
        Capability::Service => {
            let definition: ServiceDefinition = toml::from_str(text).map_err(bad)?;
            let template =
                ServiceTemplate::new(&header.name, &header.oneliner, &header.help, definition.service)?;
            Ok(PluginUnit::Service(Arc::new(template)))
        }
        Capability::Address => {
            let definition: AddressDefinition = toml::from_str(text).map_err(bad)?;
            address_plugin(&header, definition.address)
        }
        Capability::Auth => Err(Error::config(format!(
            "Plugin {}: credential stores cannot be defined in files",
            header.name
        ))),
    }
}

fn address_plugin(header: &DefinitionHeader, table: AddressTable) -> Result<PluginUnit> {
    let mut urls = table.urls;
    urls.extend(table.url);

    match (urls.is_empty(), table.command) {
        (false, None) => Ok(PluginUnit::Address(Arc::new(WebAddressPlugin::new(
            &header.name,
            &header.oneliner,
            &header.help,
            urls,
            table.family,
        )))),
        (true, Some(command)) if !command.trim().is_empty() => {
            Ok(PluginUnit::Address(Arc::new(CommandAddressPlugin::with_command(
                &header.name,
                &header.oneliner,
                &header.help,
                command,
            ))))
        }
        _ => Err(Error::config(format!(
            "Plugin {}: [address] needs either url(s) or a command",
            header.name
        ))),
    }
}
