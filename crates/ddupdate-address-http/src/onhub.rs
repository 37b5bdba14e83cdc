//! `onhub`: WAN address reported by an OnHub / Google Wifi / Nest router

use async_trait::async_trait;
use ddupdate_core::{AddressPlugin, Error, IpAddress, Plugin, PluginOptions, Result};
use serde::Deserialize;
use std::net::IpAddr;
use std::time::Duration;
use tracing::debug;

use crate::web::{DEFAULT_HTTP_TIMEOUT, fetch_text, http_client};

const STATUS_URL: &str = "http://onhub.here/api/v1/status";

#[derive(Debug, Deserialize)]
struct RouterStatus {
    wan: WanStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WanStatus {
    #[serde(default)]
    online: bool,
    local_ip_address: String,
}

/// Reads the router status API on the local network
#[derive(Debug, Clone)]
pub struct OnHubAddressPlugin {
    url: String,
    client: reqwest::Client,
}

impl OnHubAddressPlugin {
    pub fn new() -> Self {
        Self::with_url(STATUS_URL)
    }

    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: http_client(DEFAULT_HTTP_TIMEOUT),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = http_client(timeout);
        self
    }
}

impl Default for OnHubAddressPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for OnHubAddressPlugin {
    fn name(&self) -> &str {
        "onhub"
    }

    fn oneliner(&self) -> &str {
        "Obtain external address from OnHub / Google / Nest router"
    }

    fn help(&self) -> &str {
        "\
Asks the router at onhub.here for its WAN address using the local status
API. Only works from inside the router's network. IPv4 only."
    }
}

#[async_trait]
impl AddressPlugin for OnHubAddressPlugin {
    async fn get_ip(&self, _options: &PluginOptions) -> Result<IpAddress> {
        debug!("Trying {}", self.url);
        let body = fetch_text(&self.client, &self.url).await?;
        let status: RouterStatus = serde_json::from_str(&body)
            .map_err(|e| Error::address(format!("Bad status reply from {}: {}", self.url, e)))?;
        debug!("WAN online: {}", status.wan.online);

        match status.wan.local_ip_address.trim().parse::<IpAddr>() {
            Ok(IpAddr::V4(v4)) => Ok(IpAddress::from_v4(v4)),
            Ok(IpAddr::V6(v6)) => Ok(IpAddress::from_v6(v6)),
            Err(_) => Err(Error::address(format!(
                "Router reported no usable WAN address: {:?}",
                status.wan.local_ip_address
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use wiremock::matchers::path;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn reads_wan_address() {
        let server = MockServer::start().await;
        Mock::given(path("/api/v1/status"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"software":{"softwareVersion":"14150.43.80"},
                    "wan":{"online":true,"localIpAddress":"203.0.113.77","ipMethod":"dhcp"}}"#,
            ))
            .mount(&server)
            .await;

        let plugin = OnHubAddressPlugin::with_url(format!("{}/api/v1/status", server.uri()));
        let address = plugin.get_ip(&PluginOptions::new()).await.unwrap();
        assert_eq!(address, IpAddress::from_v4(Ipv4Addr::new(203, 0, 113, 77)));
    }

    #[tokio::test]
    async fn offline_or_garbled_status_is_resolution_error() {
        let server = MockServer::start().await;
        Mock::given(path("/empty"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"wan":{"online":false,"localIpAddress":""}}"#),
            )
            .mount(&server)
            .await;
        Mock::given(path("/html"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        for route in ["/empty", "/html", "/missing"] {
            let plugin = OnHubAddressPlugin::with_url(format!("{}{}", server.uri(), route));
            assert!(
                matches!(
                    plugin.get_ip(&PluginOptions::new()).await,
                    Err(Error::AddressResolution(_))
                ),
                "{route}"
            );
        }
    }
}
