//! Configuration types for ddupdate
//!
//! Settings are merged from four layers, lowest precedence first:
//! built-in defaults, the config file `[update]` table, one `[[section]]`
//! table, and command line overrides. Each merged result is a
//! [`SectionConfig`], the input for one engine run.
//!
//! ```toml
//! [update]
//! address-plugin = "default-web-ip"
//! service-plugin = "duckdns.org"
//! hostname = "myhost.duckdns.org"
//!
//! [[section]]
//! name = "work"
//! hostname = "work.example.net"
//! service-plugin = "dynv6.com"
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::address::IpVersion;
use crate::error::{Error, Result};
use crate::options::PluginOptions;

/// Name of the section built from `[update]` alone
pub const DEFAULT_SECTION: &str = "update";

/// Hostname used when none is configured
pub const DEFAULT_HOSTNAME: &str = "host.nowhere.net";

/// Levels accepted by `loglevel`
pub const LOG_LEVELS: &[&str] = &["error", "warning", "warn", "info", "debug", "trace"];

/// One layer of settings; unset fields defer to lower layers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Settings {
    /// Section name, only meaningful in `[[section]]` tables
    pub name: Option<String>,
    pub hostname: Option<String>,
    pub address_plugin: Option<String>,
    pub service_plugin: Option<String>,
    pub auth_plugin: Option<String>,
    pub loglevel: Option<String>,
    pub ip_version: Option<IpVersion>,
    #[serde(default, deserialize_with = "option_tokens")]
    pub address_options: Option<Vec<String>>,
    #[serde(default, deserialize_with = "option_tokens")]
    pub service_options: Option<Vec<String>>,
    pub ip_cache: Option<PathBuf>,
    pub force: Option<bool>,
}

impl Settings {
    /// Built-in defaults
    pub fn defaults() -> Self {
        Self {
            name: Some(DEFAULT_SECTION.to_string()),
            hostname: Some(DEFAULT_HOSTNAME.to_string()),
            address_plugin: Some(default_address_plugin()),
            service_plugin: Some(default_service_plugin()),
            auth_plugin: Some(default_auth_plugin()),
            loglevel: Some(default_loglevel()),
            ip_version: Some(IpVersion::V4),
            address_options: None,
            service_options: None,
            ip_cache: Some(default_cache_dir()),
            force: Some(false),
        }
    }

    /// `self` with every field set in `upper` replaced
    pub fn overlay(&self, upper: &Settings) -> Settings {
        Settings {
            name: upper.name.clone().or_else(|| self.name.clone()),
            hostname: upper.hostname.clone().or_else(|| self.hostname.clone()),
            address_plugin: upper
                .address_plugin
                .clone()
                .or_else(|| self.address_plugin.clone()),
            service_plugin: upper
                .service_plugin
                .clone()
                .or_else(|| self.service_plugin.clone()),
            auth_plugin: upper.auth_plugin.clone().or_else(|| self.auth_plugin.clone()),
            loglevel: upper.loglevel.clone().or_else(|| self.loglevel.clone()),
            ip_version: upper.ip_version.or(self.ip_version),
            address_options: upper
                .address_options
                .clone()
                .or_else(|| self.address_options.clone()),
            service_options: upper
                .service_options
                .clone()
                .or_else(|| self.service_options.clone()),
            ip_cache: upper.ip_cache.clone().or_else(|| self.ip_cache.clone()),
            force: upper.force.or(self.force),
        }
    }

    /// Turn fully merged settings into a section config
    pub fn into_section(self) -> Result<SectionConfig> {
        let section = SectionConfig {
            name: self.name.unwrap_or_else(|| DEFAULT_SECTION.to_string()),
            hostname: self.hostname.unwrap_or_else(|| DEFAULT_HOSTNAME.to_string()),
            address_plugin: self.address_plugin.unwrap_or_else(default_address_plugin),
            service_plugin: self.service_plugin.unwrap_or_else(default_service_plugin),
            auth_plugin: self.auth_plugin.unwrap_or_else(default_auth_plugin),
            ip_version: self.ip_version.unwrap_or_default(),
            address_options: PluginOptions::parse(self.address_options.unwrap_or_default()),
            service_options: PluginOptions::parse(self.service_options.unwrap_or_default()),
            force: self.force.unwrap_or(false),
            ip_cache: self.ip_cache.unwrap_or_else(default_cache_dir),
        };
        section.validate()?;
        Ok(section)
    }
}

// Options are a whitespace separated string in config files; a list also works.
fn option_tokens<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Tokens {
        Text(String),
        List(Vec<String>),
    }

    Ok(Option::<Tokens>::deserialize(deserializer)?.map(|tokens| match tokens {
        Tokens::Text(text) => text.split_whitespace().map(str::to_string).collect(),
        Tokens::List(list) => list,
    }))
}

/// Effective settings for one section
#[derive(Debug, Clone, PartialEq)]
pub struct SectionConfig {
    pub name: String,
    pub hostname: String,
    pub address_plugin: String,
    pub service_plugin: String,
    pub auth_plugin: String,
    pub ip_version: IpVersion,
    pub address_options: PluginOptions,
    pub service_options: PluginOptions,
    /// Ignore the address cache for this run
    pub force: bool,
    /// Directory holding the address cache
    pub ip_cache: PathBuf,
}

impl SectionConfig {
    /// Section with defaults for everything except the three plugin names
    pub fn new(
        hostname: impl Into<String>,
        address_plugin: impl Into<String>,
        service_plugin: impl Into<String>,
    ) -> Self {
        Self {
            name: DEFAULT_SECTION.to_string(),
            hostname: hostname.into(),
            address_plugin: address_plugin.into(),
            service_plugin: service_plugin.into(),
            auth_plugin: default_auth_plugin(),
            ip_version: IpVersion::V4,
            address_options: PluginOptions::new(),
            service_options: PluginOptions::new(),
            force: false,
            ip_cache: default_cache_dir(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_ip_version(mut self, ip_version: IpVersion) -> Self {
        self.ip_version = ip_version;
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_service_options(mut self, options: PluginOptions) -> Self {
        self.service_options = options;
        self
    }

    pub fn with_address_options(mut self, options: PluginOptions) -> Self {
        self.address_options = options;
        self
    }

    /// Validate the section
    pub fn validate(&self) -> Result<()> {
        if self.hostname.trim().is_empty() {
            return Err(Error::config(format!("Section {}: empty hostname", self.name)));
        }
        for (key, value) in [
            ("address-plugin", &self.address_plugin),
            ("service-plugin", &self.service_plugin),
            ("auth-plugin", &self.auth_plugin),
        ] {
            if value.trim().is_empty() {
                return Err(Error::config(format!("Section {}: empty {}", self.name, key)));
            }
        }
        Ok(())
    }

    /// Key of this section's address cache entry
    ///
    /// The lone `update` section uses the bare service name. Named sections
    /// get `<service>@<section>` so hosts on one service never share an entry.
    pub fn cache_key(&self) -> String {
        if self.name == DEFAULT_SECTION {
            self.service_plugin.clone()
        } else {
            format!("{}@{}", self.service_plugin, self.name)
        }
    }
}

/// Parsed configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Settings shared by all sections
    #[serde(default)]
    pub update: Settings,

    /// Named sections, each run as its own update
    #[serde(default, rename = "section")]
    pub sections: Vec<Settings>,
}

impl ConfigFile {
    /// Parse TOML configuration text
    pub fn parse(text: &str) -> Result<Self> {
        let config: ConfigFile =
            toml::from_str(text).map_err(|e| Error::config(format!("Bad config file: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        Self::parse(&text).map_err(|e| Error::config(format!("{}: {}", path.display(), e)))
    }

    /// Load the first readable file among `candidates`
    ///
    /// Unreadable or broken files are logged and skipped. Without any usable
    /// file the defaults apply.
    pub fn load_first(candidates: &[PathBuf]) -> (Self, Option<PathBuf>) {
        for path in candidates {
            if !path.exists() {
                debug!("No config file at {}", path.display());
                continue;
            }
            match Self::load(path) {
                Ok(config) => {
                    debug!("Using config file {}", path.display());
                    return (config, Some(path.clone()));
                }
                Err(e) => warn!("Ignoring config file: {}", e),
            }
        }
        warn!("No usable config file found, using defaults");
        (Self::default(), None)
    }

    /// Validate the file contents
    pub fn validate(&self) -> Result<()> {
        if let Some(level) = &self.update.loglevel {
            validate_loglevel(level)?;
        }
        let mut seen = std::collections::HashSet::new();
        for section in &self.sections {
            let name = section
                .name
                .as_deref()
                .filter(|n| !n.trim().is_empty())
                .ok_or_else(|| Error::config("[[section]] entry without a name"))?;
            if !seen.insert(name) {
                return Err(Error::config(format!("Duplicate section name: {name}")));
            }
        }
        Ok(())
    }

    /// Merge defaults, file and `overrides` into one config per section
    ///
    /// Without `[[section]]` tables a single section named `update` results.
    /// `only` restricts the result to the named sections.
    pub fn resolve(&self, overrides: &Settings, only: &[String]) -> Result<Vec<SectionConfig>> {
        let base = Settings::defaults().overlay(&self.update);

        let layers: Vec<Settings> = if self.sections.is_empty() {
            vec![Settings {
                name: Some(DEFAULT_SECTION.to_string()),
                ..Settings::default()
            }]
        } else {
            self.sections.clone()
        };

        for name in only {
            let known = layers.iter().any(|s| s.name.as_deref() == Some(name.as_str()));
            if !known {
                return Err(Error::config(format!("No such section: {name}")));
            }
        }

        layers
            .iter()
            .filter(|layer| {
                only.is_empty()
                    || layer
                        .name
                        .as_deref()
                        .is_some_and(|n| only.iter().any(|o| o == n))
            })
            .map(|layer| {
                let mut merged = base.overlay(layer).overlay(overrides);
                // Overrides never rename a section
                merged.name = layer.name.clone();
                merged.into_section()
            })
            .collect()
    }

    /// Log level after applying `overrides`
    pub fn loglevel(&self, overrides: &Settings) -> String {
        Settings::defaults()
            .overlay(&self.update)
            .overlay(overrides)
            .loglevel
            .unwrap_or_else(default_loglevel)
    }
}

/// Reject unknown log level names
pub fn validate_loglevel(level: &str) -> Result<()> {
    if LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
        Ok(())
    } else {
        Err(Error::config(format!(
            "Invalid loglevel {level}, expected one of error, warning, info, debug"
        )))
    }
}

fn default_address_plugin() -> String {
    "default-if".to_string()
}

fn default_service_plugin() -> String {
    "dry-run".to_string()
}

fn default_auth_plugin() -> String {
    "netrc".to_string()
}

fn default_loglevel() -> String {
    "info".to_string()
}

fn env_lookup(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.is_empty())
}

fn home_relative(rel: &str) -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("/")).join(rel)
}

/// `$XDG_CACHE_HOME/ddupdate`, defaulting to `~/.cache/ddupdate`
pub fn default_cache_dir() -> PathBuf {
    cache_dir_from(env_lookup)
}

pub fn cache_dir_from(lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
    lookup("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| home_relative(".cache"))
        .join("ddupdate")
}

/// Config files to try when none is given on the command line
pub fn config_file_candidates() -> Vec<PathBuf> {
    config_candidates_from(env_lookup)
}

pub fn config_candidates_from(lookup: impl Fn(&str) -> Option<String>) -> Vec<PathBuf> {
    let user = lookup("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| home_relative(".config"));
    vec![user.join("ddupdate.toml"), PathBuf::from("/etc/ddupdate.toml")]
}

/// Plugin definition directories, highest precedence first
pub fn plugin_dirs() -> Vec<PathBuf> {
    plugin_dirs_from(env_lookup)
}

pub fn plugin_dirs_from(lookup: impl Fn(&str) -> Option<String>) -> Vec<PathBuf> {
    let data_home = lookup("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| home_relative(".local/share"));
    let data_dirs =
        lookup("XDG_DATA_DIRS").unwrap_or_else(|| "/usr/local/share:/usr/share".to_string());

    std::iter::once(data_home)
        .chain(data_dirs.split(':').filter(|d| !d.is_empty()).map(PathBuf::from))
        .map(|dir| dir.join("ddupdate").join("plugins"))
        .collect()
}
