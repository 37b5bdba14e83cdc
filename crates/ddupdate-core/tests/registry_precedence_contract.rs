//! Contract Test: Plugin Registry Precedence
//!
//! Plugin sources are scanned in order. The first plugin seen for a name
//! wins, later duplicates are dropped and recorded, and broken units never
//! stop discovery.

mod common;

use common::*;
use ddupdate_core::registry::{
    BuiltinSource, DefinitionHeader, DefinitionLoader, DirectorySource, PluginRegistry,
    PluginSource, PluginUnit,
};
use ddupdate_core::{AddressPlugin, Capability, Error, IpAddress, Result};
use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::Arc;

/// Loads `capability = "address"` files as fixed address plugins
struct FixedLoader;

impl DefinitionLoader for FixedLoader {
    fn load_definition(&self, path: &Path) -> Result<PluginUnit> {
        let text = std::fs::read_to_string(path)?;
        let header = DefinitionHeader::parse(&text)?;
        if header.capability != Capability::Address {
            return Err(Error::config("only address definitions supported here"));
        }
        Ok(PluginUnit::Address(Arc::new(FixedAddressPlugin::new(
            &header.name,
            IpAddress::from_v4(Ipv4Addr::new(10, 9, 9, 9)),
        ))))
    }
}

fn builtin(name: &str, last_octet: u8) -> BuiltinSource {
    let mut source = BuiltinSource::new();
    source.add_unit(PluginUnit::Address(Arc::new(FixedAddressPlugin::new(
        name,
        IpAddress::from_v4(Ipv4Addr::new(10, 0, 0, last_octet)),
    ))));
    source
}

#[tokio::test]
async fn first_source_wins_and_conflict_is_recorded() {
    let sources: Vec<Box<dyn PluginSource>> =
        vec![Box::new(builtin("dup", 1)), Box::new(builtin("dup", 2))];

    let registry = PluginRegistry::discover(&sources);

    let plugin = registry.address("dup").unwrap();
    let address = plugin.get_ip(&Default::default()).await.unwrap();
    assert_eq!(address.v4, Some(Ipv4Addr::new(10, 0, 0, 1)));

    assert_eq!(registry.list(Capability::Address).len(), 1);
    let conflicts = registry.conflicts();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].name, "dup");
    assert_eq!(conflicts[0].capability, Capability::Address);
}

#[test]
fn same_name_in_different_capabilities_is_not_a_conflict() {
    let mut source = builtin("shared-name", 1);
    source.add_unit(PluginUnit::Service(Arc::new(MockServicePlugin::new(
        "shared-name",
    ))));
    let sources: Vec<Box<dyn PluginSource>> = vec![Box::new(source)];

    let registry = PluginRegistry::discover(&sources);
    assert!(registry.has(Capability::Address, "shared-name"));
    assert!(registry.has(Capability::Service, "shared-name"));
    assert!(registry.conflicts().is_empty());
}

#[test]
fn directory_definitions_follow_builtins() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("a-shadowed.toml"),
        "name = \"builtin-one\"\ncapability = \"address\"\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("b-new.toml"),
        "name = \"from-file\"\noneliner = \"File plugin\"\ncapability = \"address\"\n",
    )
    .unwrap();
    std::fs::write(dir.path().join("c-broken.toml"), "this is = = not toml").unwrap();
    std::fs::write(dir.path().join("ignored.txt"), "name = \"txt\"").unwrap();

    let sources: Vec<Box<dyn PluginSource>> = vec![
        Box::new(builtin("builtin-one", 1)),
        Box::new(DirectorySource::new(dir.path(), Arc::new(FixedLoader))),
        Box::new(DirectorySource::new(
            dir.path().join("missing"),
            Arc::new(FixedLoader),
        )),
    ];
    let registry = PluginRegistry::discover(&sources);

    let names: Vec<_> = registry
        .list(Capability::Address)
        .into_iter()
        .map(|d| d.name)
        .collect();
    assert_eq!(names, vec!["builtin-one", "from-file"]);

    let help = registry.help("from-file").unwrap();
    assert_eq!(help.oneliner, "Fixed test address");
    assert_eq!(help.origin, dir.path().display().to_string());

    assert_eq!(registry.conflicts().len(), 1);
    assert_eq!(registry.conflicts()[0].kept, "builtin");
}
