//! Plugin options
//!
//! Options reach plugins as opaque tokens from the config file or the
//! command line. A `key=value` token sets a value, a bare `key` sets a flag.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};

/// Parsed plugin options, keyed by option name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginOptions {
    values: BTreeMap<String, Option<String>>,
}

impl PluginOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a list of tokens. Later tokens override earlier ones.
    pub fn parse<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut options = Self::new();
        for token in tokens {
            let token = token.as_ref().trim();
            if token.is_empty() {
                continue;
            }
            match token.split_once('=') {
                Some((key, value)) => options.set(key.trim(), Some(value.trim().to_string())),
                None => options.set(token, None),
            }
        }
        options
    }

    /// Parse a whitespace separated option string as found in config files.
    pub fn parse_str(text: &str) -> Self {
        Self::parse(text.split_whitespace())
    }

    pub fn set(&mut self, key: impl Into<String>, value: Option<String>) {
        self.values.insert(key.into(), value);
    }

    /// Value of `key`, if it was given with a value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(|v| v.as_deref())
    }

    /// True if `key` was given, with or without a value.
    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Value of `key`, failing if it is missing or has no value.
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::invalid_option(format!("Required option {key}=<value> missing")))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Merge `other` on top of `self`.
    pub fn extend(&mut self, other: &PluginOptions) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
    }
}

impl fmt::Display for PluginOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, value) in &self.values {
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            match value {
                Some(value) => write!(f, "{key}={value}")?,
                None => f.write_str(key)?,
            }
        }
        Ok(())
    }
}
