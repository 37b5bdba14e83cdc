//! `ip.dnshome.de`: both address families from dnshome.de

use async_trait::async_trait;
use ddupdate_core::{AddressPlugin, Error, IpAddress, Plugin, PluginOptions, Result};
use std::net::IpAddr;
use std::time::Duration;
use tracing::debug;

use crate::web::{DEFAULT_HTTP_TIMEOUT, fetch_text, http_client};

const IP4_URL: &str = "https://ip4.dnshome.de";
const IP6_URL: &str = "https://ip6.dnshome.de";

/// Asks the IPv4-only and IPv6-only dnshome.de resolvers and merges the
/// answers
#[derive(Debug, Clone)]
pub struct DnsHomeAddressPlugin {
    urls: [String; 2],
    client: reqwest::Client,
}

impl DnsHomeAddressPlugin {
    pub fn new() -> Self {
        Self::with_urls(IP4_URL, IP6_URL)
    }

    pub fn with_urls(ip4_url: impl Into<String>, ip6_url: impl Into<String>) -> Self {
        Self {
            urls: [ip4_url.into(), ip6_url.into()],
            client: http_client(DEFAULT_HTTP_TIMEOUT),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = http_client(timeout);
        self
    }

    async fn load(&self, url: &str) -> Option<IpAddress> {
        debug!("Loading ip from {}", url);
        let body = fetch_text(&self.client, url)
            .await
            .inspect_err(|e| debug!("{} (ignored)", e))
            .ok()?;
        match body.trim().parse::<IpAddr>() {
            Ok(IpAddr::V4(v4)) => Some(IpAddress::from_v4(v4)),
            Ok(IpAddr::V6(v6)) => Some(IpAddress::from_v6(v6)),
            Err(_) => {
                debug!("Cannot parse address from {}: {}", url, body.trim());
                None
            }
        }
    }
}

impl Default for DnsHomeAddressPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for DnsHomeAddressPlugin {
    fn name(&self) -> &str {
        "ip.dnshome.de"
    }

    fn oneliner(&self) -> &str {
        "Obtain IPv4 and/or IPv6 address as seen by dnshome.de"
    }

    fn help(&self) -> &str {
        "\
Asks ip4.dnshome.de and ip6.dnshome.de for the external addresses.
Depending on the connection either one may be missing. An IPv4 address
does not guarantee reachability from outside (DS-Lite, tunnels)."
    }
}

#[async_trait]
impl AddressPlugin for DnsHomeAddressPlugin {
    async fn get_ip(&self, _options: &PluginOptions) -> Result<IpAddress> {
        let mut address = IpAddress::default();
        for url in &self.urls {
            if let Some(found) = self.load(url).await {
                address.v4 = address.v4.or(found.v4);
                address.v6 = address.v6.or(found.v6);
            }
        }
        debug!("dnshome.de address: {}", address);
        if address.is_empty() {
            return Err(Error::address("No address from ip4.dnshome.de or ip6.dnshome.de"));
        }
        Ok(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};
    use wiremock::matchers::path;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn merges_both_families() {
        let server = MockServer::start().await;
        Mock::given(path("/4"))
            .respond_with(ResponseTemplate::new(200).set_body_string("198.51.100.20\n"))
            .mount(&server)
            .await;
        Mock::given(path("/6"))
            .respond_with(ResponseTemplate::new(200).set_body_string("2001:db8::20"))
            .mount(&server)
            .await;

        let plugin = DnsHomeAddressPlugin::with_urls(
            format!("{}/4", server.uri()),
            format!("{}/6", server.uri()),
        );
        let address = plugin.get_ip(&PluginOptions::new()).await.unwrap();
        assert_eq!(address.v4, Some(Ipv4Addr::new(198, 51, 100, 20)));
        assert_eq!(address.v6, Some("2001:db8::20".parse::<Ipv6Addr>().unwrap()));
    }

    #[tokio::test]
    async fn one_family_is_enough_none_is_error() {
        let server = MockServer::start().await;
        Mock::given(path("/4"))
            .respond_with(ResponseTemplate::new(200).set_body_string("198.51.100.20"))
            .mount(&server)
            .await;
        Mock::given(path("/6"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let plugin = DnsHomeAddressPlugin::with_urls(
            format!("{}/4", server.uri()),
            format!("{}/6", server.uri()),
        );
        let address = plugin.get_ip(&PluginOptions::new()).await.unwrap();
        assert_eq!(address, IpAddress::from_v4(Ipv4Addr::new(198, 51, 100, 20)));

        let plugin = DnsHomeAddressPlugin::with_urls(
            format!("{}/6", server.uri()),
            format!("{}/6", server.uri()),
        );
        assert!(matches!(
            plugin.get_ip(&PluginOptions::new()).await,
            Err(Error::AddressResolution(_))
        ));
    }
}
