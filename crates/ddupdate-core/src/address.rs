//! Resolved host addresses
//!
//! An [`IpAddress`] carries at most one IPv4 and one IPv6 address. The empty
//! value (both absent) is meaningful: it asks the service to use the address
//! the update request arrives from.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use crate::error::{Error, Result};

/// A host address pair as produced by an address plugin
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IpAddress {
    /// IPv4 address, if any
    pub v4: Option<Ipv4Addr>,
    /// IPv6 address, if any
    pub v6: Option<Ipv6Addr>,
}

impl IpAddress {
    pub fn new(v4: Option<Ipv4Addr>, v6: Option<Ipv6Addr>) -> Self {
        Self { v4, v6 }
    }

    pub fn from_v4(v4: Ipv4Addr) -> Self {
        Self::new(Some(v4), None)
    }

    pub fn from_v6(v6: Ipv6Addr) -> Self {
        Self::new(None, Some(v6))
    }

    /// True when neither address is present.
    pub fn is_empty(&self) -> bool {
        self.v4.is_none() && self.v6.is_none()
    }

    /// Keep only the address families allowed by `version`.
    ///
    /// Fails with an address resolution error when nothing remains.
    pub fn filter(self, version: IpVersion) -> Result<IpAddress> {
        let filtered = match version {
            IpVersion::V4 => IpAddress::new(self.v4, None),
            IpVersion::V6 => IpAddress::new(None, self.v6),
            IpVersion::All => self,
        };
        if filtered.is_empty() {
            return Err(Error::address(format!(
                "No usable address (ip-version {version}, resolved {self})"
            )));
        }
        Ok(filtered)
    }

    /// Build an address from one or two whitespace separated address words.
    ///
    /// Anything that is not an IPv4 or IPv6 literal is rejected, as is more
    /// than one address of the same family.
    pub fn from_words(text: &str) -> Result<IpAddress> {
        let mut address = IpAddress::default();
        for word in text.split_whitespace() {
            if let Ok(v4) = Ipv4Addr::from_str(word) {
                if address.v4.replace(v4).is_some() {
                    return Err(Error::address(format!("More than one IPv4 address in: {text}")));
                }
            } else if let Ok(v6) = Ipv6Addr::from_str(word) {
                if address.v6.replace(v6).is_some() {
                    return Err(Error::address(format!("More than one IPv6 address in: {text}")));
                }
            } else {
                return Err(Error::address(format!("Not an ip address: {word}")));
            }
        }
        Ok(address)
    }

    /// Parse `ip address show dev <if>` or `ifconfig <if>` output.
    ///
    /// Takes the first `inet` address and the first `inet6` address that is
    /// neither link-local nor deprecated. Fails if neither is found.
    pub fn parse_ip_output(text: &str) -> Result<IpAddress> {
        let mut address = IpAddress::default();
        for line in text.lines() {
            let words: Vec<&str> = line.split_whitespace().collect();
            let Some((&kind, rest)) = words.split_first() else {
                continue;
            };
            let Some(value) = rest.first().map(|w| strip_prefix_len(w)) else {
                continue;
            };
            match kind {
                "inet" if address.v4.is_none() => {
                    let value = value.strip_prefix("addr:").unwrap_or(value);
                    address.v4 = Ipv4Addr::from_str(value).ok();
                }
                "inet6" if address.v6.is_none() => {
                    let flags = &rest[1..];
                    let link_local = flags.iter().any(|w| *w == "link" || *w == "0x20<link>");
                    if link_local || flags.contains(&"deprecated") {
                        continue;
                    }
                    address.v6 = Ipv6Addr::from_str(value).ok();
                }
                _ => {}
            }
        }
        if address.is_empty() {
            return Err(Error::address(format!(
                "Cannot find address in: {}",
                text.trim()
            )));
        }
        Ok(address)
    }
}

fn strip_prefix_len(word: &str) -> &str {
    word.split('/').next().unwrap_or(word)
}

impl fmt::Display for IpAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v4 = self.v4.map(|a| a.to_string());
        let v6 = self.v6.map(|a| a.to_string());
        write!(
            f,
            "[{}, {}]",
            v4.as_deref().unwrap_or("None"),
            v6.as_deref().unwrap_or("None")
        )
    }
}

/// Address families to register
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpVersion {
    /// IPv4 only
    #[default]
    V4,
    /// IPv6 only
    V6,
    /// Both IPv4 and IPv6
    All,
}

impl FromStr for IpVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "v4" => Ok(IpVersion::V4),
            "v6" => Ok(IpVersion::V6),
            "all" => Ok(IpVersion::All),
            other => Err(Error::config(format!(
                "Invalid ip-version {other}, expected one of v4, v6, all"
            ))),
        }
    }
}

impl fmt::Display for IpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IpVersion::V4 => "v4",
            IpVersion::V6 => "v6",
            IpVersion::All => "all",
        })
    }
}
