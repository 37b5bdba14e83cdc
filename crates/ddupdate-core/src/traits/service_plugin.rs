// # Service Plugin Trait
//
// Defines the interface for pushing an address to a dynamic DNS service.
//
// ## Implementations
//
// - Template driven services and `dry-run`: `ddupdate-services` crate
// - Cloudflare API: `ddupdate-service-cloudflare` crate

use async_trait::async_trait;

use super::Plugin;
use crate::address::IpAddress;
use crate::credentials::Credentials;
use crate::error::Result;
use crate::options::PluginOptions;

/// Cache lifetime used by services that do not override it
pub const DEFAULT_CACHE_TTL_MINUTES: u64 = 120;

/// Run context handed to service plugins
///
/// Carries the credential facade for the active credential store.
#[derive(Clone)]
pub struct ServiceContext {
    credentials: Credentials,
}

impl ServiceContext {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }
}

/// Trait for service plugins
///
/// A service plugin makes one registration attempt per call. It does not
/// retry, does not read or write the address cache, and does not decide
/// whether an update is needed.
#[async_trait]
pub trait ServicePlugin: Plugin {
    /// Minutes a successful registration stays fresh in the address cache
    fn cache_ttl_minutes(&self) -> u64 {
        DEFAULT_CACHE_TTL_MINUTES
    }

    /// Register `address` for `hostname`
    ///
    /// # Parameters
    ///
    /// - `ctx`: run context with the credential facade
    /// - `hostname`: fully qualified name to update
    /// - `address`: address to register, `None` to let the service use the
    ///   address the request comes from
    /// - `options`: service options from config and command line
    async fn register(
        &self,
        ctx: &ServiceContext,
        hostname: &str,
        address: Option<&IpAddress>,
        options: &PluginOptions,
    ) -> Result<()>;
}
