// # Plugin Sources
//
// A plugin source is one entry of the plugin search path. Sources are scanned
// in order and the registry keeps the first plugin seen for each name.
//
// - `BuiltinSource`: plugins compiled into the binary
// - `DirectorySource`: `*.toml` plugin definition files in a directory

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use super::{Capability, PluginUnit};
use crate::error::{Error, Result};

/// One entry of the plugin search path
pub trait PluginSource: Send + Sync {
    /// Human readable origin, used in diagnostics and help output
    fn origin(&self) -> String;

    /// Load every unit this source provides
    ///
    /// The outer error means the whole source is unusable. Inner errors are
    /// single units that failed and are skipped by the registry.
    fn load(&self) -> Result<Vec<Result<PluginUnit>>>;
}

type UnitFactory = Box<dyn Fn() -> Result<PluginUnit> + Send + Sync>;

/// Plugins compiled into the binary
///
/// Plugin crates add themselves through their `register` function.
#[derive(Default)]
pub struct BuiltinSource {
    factories: Vec<UnitFactory>,
}

impl BuiltinSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plugin factory
    pub fn add<F>(&mut self, factory: F)
    where
        F: Fn() -> Result<PluginUnit> + Send + Sync + 'static,
    {
        self.factories.push(Box::new(factory));
    }

    /// Add an already constructed plugin
    pub fn add_unit(&mut self, unit: PluginUnit) {
        self.add(move || Ok(unit.clone()));
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for BuiltinSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltinSource")
            .field("factories", &self.factories.len())
            .finish()
    }
}

impl PluginSource for BuiltinSource {
    fn origin(&self) -> String {
        "builtin".to_string()
    }

    fn load(&self) -> Result<Vec<Result<PluginUnit>>> {
        Ok(self.factories.iter().map(|factory| factory()).collect())
    }
}

/// Turns one plugin definition file into a plugin
pub trait DefinitionLoader: Send + Sync {
    fn load_definition(&self, path: &Path) -> Result<PluginUnit>;
}

/// Directory of plugin definition files
///
/// Every `*.toml` file in the directory is one unit. Files are visited in
/// name order. A directory that does not exist provides nothing.
pub struct DirectorySource {
    dir: PathBuf,
    loader: Arc<dyn DefinitionLoader>,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>, loader: Arc<dyn DefinitionLoader>) -> Self {
        Self {
            dir: dir.into(),
            loader,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl PluginSource for DirectorySource {
    fn origin(&self) -> String {
        self.dir.display().to_string()
    }

    fn load(&self) -> Result<Vec<Result<PluginUnit>>> {
        if !self.dir.is_dir() {
            debug!("Plugin directory {} not present", self.dir.display());
            return Ok(Vec::new());
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
            .collect();
        paths.sort();

        Ok(paths
            .iter()
            .map(|path| {
                self.loader
                    .load_definition(path)
                    .map_err(|e| Error::config(format!("{}: {}", path.display(), e)))
            })
            .collect())
    }
}

/// Plugin definition header shared by every definition file
#[derive(Debug, Clone, serde::Deserialize)]
pub struct DefinitionHeader {
    pub name: String,
    #[serde(default)]
    pub oneliner: String,
    #[serde(default)]
    pub help: String,
    pub capability: Capability,
}

impl DefinitionHeader {
    /// Parse the header fields of a definition file
    pub fn parse(text: &str) -> Result<Self> {
        let header: DefinitionHeader =
            toml::from_str(text).map_err(|e| Error::config(format!("Bad plugin definition: {e}")))?;
        if header.name.trim().is_empty() {
            return Err(Error::config("Plugin definition without a name"));
        }
        Ok(header)
    }
}
