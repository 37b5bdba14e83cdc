// # Local Address Plugins
//
// Address plugins that need no network access:
//
// - `default-if`: interface carrying the default route, via ip(8)
// - `hardcoded-if`: a named interface, via ip(8)
// - `hardcoded-ip`: addresses from options
// - `ip-from-command`: address words printed by a shell command
// - `ip-disabled`: no address, the service decides
//
// The ip(8) based plugins only work on Linux. Elsewhere they fail at
// resolution time like any other lookup failure.

pub mod command;
pub mod fixed;
pub mod interface;

pub use command::{CommandAddressPlugin, DEFAULT_COMMAND_TIMEOUT, run_command, run_shell};
pub use fixed::{DisabledAddressPlugin, HardcodedAddressPlugin};
pub use interface::{DefaultInterfacePlugin, NamedInterfacePlugin};

use ddupdate_core::registry::{BuiltinSource, PluginUnit};
use std::sync::Arc;

/// Add the local address plugins to `source`
pub fn register(source: &mut BuiltinSource) {
    source.add(|| Ok(PluginUnit::Address(Arc::new(DefaultInterfacePlugin::new()))));
    source.add(|| Ok(PluginUnit::Address(Arc::new(NamedInterfacePlugin::new()))));
    source.add(|| Ok(PluginUnit::Address(Arc::new(HardcodedAddressPlugin))));
    source.add(|| Ok(PluginUnit::Address(Arc::new(CommandAddressPlugin::new()))));
    source.add(|| Ok(PluginUnit::Address(Arc::new(DisabledAddressPlugin))));
}
