//! Error types for ddupdate
//!
//! Every plugin, the cache and the engine report failures through [`Error`].
//! The variants mirror the failure classes the command line maps to exit
//! codes.

use thiserror::Error;

use crate::registry::Capability;

/// Result type alias for ddupdate operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for ddupdate
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or inconsistent configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A configured plugin name is not present in the registry
    #[error("No such {capability} plugin: {name}")]
    UnknownPlugin {
        /// Which plugin collection was searched
        capability: Capability,
        /// The name that was asked for
        name: String,
    },

    /// The address plugin could not produce a usable address
    #[error("Cannot obtain ip address: {0}")]
    AddressResolution(String),

    /// The service plugin failed to update the DNS data
    #[error("Cannot update DNS data ({service}): {message}")]
    Registration {
        /// Service plugin name
        service: String,
        /// Failure description
        message: String,
    },

    /// Credentials are missing or cannot be read or stored
    #[error("Credential error: {0}")]
    Credential(String),

    /// The address cache could not be read or written
    #[error("Address cache error: {0}")]
    Cache(String),

    /// Plugin options are malformed or a required option is missing
    #[error("Invalid plugin option: {0}")]
    InvalidOption(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an unknown plugin error
    pub fn unknown_plugin(capability: Capability, name: impl Into<String>) -> Self {
        Self::UnknownPlugin {
            capability,
            name: name.into(),
        }
    }

    /// Create an address resolution error
    pub fn address(msg: impl Into<String>) -> Self {
        Self::AddressResolution(msg.into())
    }

    /// Create a registration error for a service plugin
    pub fn registration(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Registration {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Create a credential error
    pub fn credential(msg: impl Into<String>) -> Self {
        Self::Credential(msg.into())
    }

    /// Create an address cache error
    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }

    /// Create an invalid option error
    pub fn invalid_option(msg: impl Into<String>) -> Self {
        Self::InvalidOption(msg.into())
    }

    /// True for failures that may succeed on the next scheduled run.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::AddressResolution(_) | Self::Registration { .. })
    }

    /// True for errors only a configuration change can fix.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::UnknownPlugin { .. } | Self::InvalidOption(_)
        )
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_message_names_service() {
        let err = Error::registration("duckdns.org", "bad reply: KO");
        assert_eq!(
            err.to_string(),
            "Cannot update DNS data (duckdns.org): bad reply: KO"
        );
        assert!(err.is_retryable());
    }

    #[test]
    fn unknown_plugin_is_configuration_error() {
        let err = Error::unknown_plugin(Capability::Service, "nope");
        assert!(err.is_configuration());
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "No such service plugin: nope");
    }
}
