//! Update engine
//!
//! The UpdateEngine is responsible for:
//! - Resolving the address through the selected address plugin
//! - Filtering it to the configured ip-version
//! - Checking the address cache to skip needless updates
//! - Registering through the selected service plugin
//! - Recording successful registrations in the cache
//!
//! ## Flow per section
//!
//! ```text
//! RESOLVE ──> FILTER ──> CHECK_CACHE ──┬──> INHIBITED (fresh and unchanged)
//!                                      └──> REGISTER ──> CACHE_UPDATE ──> UPDATED
//! ```
//!
//! Any step may fail; the failure ends that section only. Sections run one
//! after another, never concurrently.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::address::IpAddress;
use crate::cache::AddressCache;
use crate::config::SectionConfig;
use crate::credentials::Credentials;
use crate::error::{Error, Result};
use crate::registry::PluginRegistry;
use crate::traits::{AddressPlugin, ServiceContext, ServicePlugin};

/// How a section run ended when it did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionOutcome {
    /// The service was called and accepted the update
    Updated {
        /// Address that was registered, `None` if the service picked it
        address: Option<IpAddress>,
    },
    /// The cache was fresh and the address unchanged
    Inhibited {
        /// Cached address
        cached: IpAddress,
        /// Age of the cache entry in minutes
        age_minutes: u64,
        /// Service cache lifetime in minutes
        ttl_minutes: u64,
    },
}

/// Result of one section
#[derive(Debug)]
pub struct SectionReport {
    pub section: String,
    pub service: String,
    pub result: Result<SectionOutcome>,
}

/// Results of a whole run, in section order
#[derive(Debug, Default)]
pub struct RunReport {
    pub sections: Vec<SectionReport>,
}

impl RunReport {
    /// True if every section ended without error
    pub fn all_ok(&self) -> bool {
        self.sections.iter().all(|s| s.result.is_ok())
    }

    /// Errors in section order
    pub fn errors(&self) -> impl Iterator<Item = &Error> {
        self.sections.iter().filter_map(|s| s.result.as_ref().err())
    }

    pub fn updated(&self) -> usize {
        self.sections
            .iter()
            .filter(|s| matches!(s.result, Ok(SectionOutcome::Updated { .. })))
            .count()
    }
}

/// A section with its plugins looked up
pub struct PreparedSection {
    config: SectionConfig,
    address_plugin: Arc<dyn AddressPlugin>,
    service_plugin: Arc<dyn ServicePlugin>,
}

impl PreparedSection {
    pub fn config(&self) -> &SectionConfig {
        &self.config
    }
}

/// Core update engine
///
/// ## Lifecycle
///
/// 1. Create with [`UpdateEngine::new()`]
/// 2. Run sections with [`UpdateEngine::run()`]
///
/// The engine owns no schedule. It performs exactly one pass per call and
/// never retries; the next scheduled invocation is the retry.
pub struct UpdateEngine {
    registry: Arc<PluginRegistry>,
    cache: Arc<dyn AddressCache>,
    context: ServiceContext,
}

impl UpdateEngine {
    /// Create a new update engine
    ///
    /// # Parameters
    ///
    /// - `registry`: plugins available for selection
    /// - `cache`: address cache shared by all sections
    /// - `credentials`: credential facade handed to service plugins
    pub fn new(
        registry: Arc<PluginRegistry>,
        cache: Arc<dyn AddressCache>,
        credentials: Credentials,
    ) -> Self {
        Self {
            registry,
            cache,
            context: ServiceContext::new(credentials),
        }
    }

    /// Look up the plugins a section needs
    ///
    /// # Returns
    ///
    /// - `Err(Error::UnknownPlugin)` when a plugin name is not registered
    /// - `Err(Error::Config)` when the section is invalid
    pub fn prepare(&self, config: &SectionConfig) -> Result<PreparedSection> {
        config.validate()?;
        let address_plugin = self.registry.address(&config.address_plugin)?;
        let service_plugin = self.registry.service(&config.service_plugin)?;
        Ok(PreparedSection {
            config: config.clone(),
            address_plugin,
            service_plugin,
        })
    }

    /// Run every section in order
    ///
    /// All sections are prepared first, so a configuration error stops the
    /// run before any plugin is called. After that a failing section is
    /// recorded and the next one runs.
    pub async fn run(&self, sections: &[SectionConfig]) -> Result<RunReport> {
        let prepared = sections
            .iter()
            .map(|s| self.prepare(s))
            .collect::<Result<Vec<_>>>()?;

        let mut report = RunReport::default();
        for section in &prepared {
            let name = section.config.name.clone();
            let result = self.run_section(section).await;
            if let Err(e) = &result {
                error!("Section {}: {}", name, e);
            }
            report.sections.push(SectionReport {
                section: name,
                service: section.config.service_plugin.clone(),
                result,
            });
        }
        Ok(report)
    }

    /// Run a single prepared section
    pub async fn run_section(&self, section: &PreparedSection) -> Result<SectionOutcome> {
        let config = &section.config;
        let service_name = config.service_plugin.as_str();
        let cache_key = config.cache_key();

        let address = self.resolve(section).await?;

        if config.force {
            debug!("Forced update, clearing cache entry {}", cache_key);
            self.cache.clear(&cache_key).await?;
        }

        let cached = self.cache.read(&cache_key).await?;
        let ttl = section.service_plugin.cache_ttl_minutes();
        let unchanged = match &address {
            None => true,
            Some(address) => *address == cached.address,
        };
        if cached.age_minutes < ttl && unchanged {
            info!(
                "Update inhibited, cache is fresh ({}/{} min)",
                cached.age_minutes, ttl
            );
            return Ok(SectionOutcome::Inhibited {
                cached: cached.address,
                age_minutes: cached.age_minutes,
                ttl_minutes: ttl,
            });
        }

        section
            .service_plugin
            .register(
                &self.context,
                &config.hostname,
                address.as_ref(),
                &config.service_options,
            )
            .await
            .map_err(|e| match e {
                Error::Registration { .. } | Error::InvalidOption(_) | Error::Config(_) => e,
                other => Error::registration(service_name, other.to_string()),
            })?;

        match &address {
            Some(address) => info!("Update OK: {} -> {}", config.hostname, address),
            None => info!("Update OK: {} (address chosen by service)", config.hostname),
        }

        // DNS is already updated; a stale cache only costs an extra update
        let stored = address.unwrap_or_default();
        if let Err(e) = self.cache.write(&cache_key, &stored).await {
            warn!("Cannot record {} in the address cache: {}", cache_key, e);
        }
        Ok(SectionOutcome::Updated { address })
    }

    // RESOLVE and FILTER. `None` means the service should pick the address.
    async fn resolve(&self, section: &PreparedSection) -> Result<Option<IpAddress>> {
        let config = &section.config;
        let resolved = section
            .address_plugin
            .get_ip(&config.address_options)
            .await
            .map_err(|e| match e {
                Error::AddressResolution(_) | Error::InvalidOption(_) | Error::Config(_) => e,
                other => Error::address(format!(
                    "{}: {}",
                    section.address_plugin.name(),
                    other
                )),
            })?;

        if resolved.is_empty() {
            info!("Using ip address provided by update service");
            return Ok(None);
        }

        let filtered = resolved.filter(config.ip_version)?;
        debug!("Resolved address {} (ip-version {})", filtered, config.ip_version);
        Ok(Some(filtered))
    }
}
