//! Address as seen from the internet
//!
//! A [`WebAddressPlugin`] fetches a list of URLs in turn and scrapes the
//! first address of the wanted family out of the reply body. Any failure
//! on one URL moves on to the next one.

use async_trait::async_trait;
use ddupdate_core::{AddressPlugin, Error, IpAddress, Plugin, PluginOptions, Result};
use regex::Regex;
use serde::Deserialize;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info};

/// Time limit for one lookup request
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(20);

static V4_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}").expect("valid IPv4 pattern")
});

static V6_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([:0-9a-fA-F]{12,})(?:\s|$)").expect("valid IPv6 pattern"));

/// Address family a lookup reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    #[default]
    V4,
    V6,
    /// First IPv4 and first IPv6 address found
    Any,
}

fn first_v4(body: &str) -> Option<Ipv4Addr> {
    V4_PATTERN
        .find_iter(body)
        .find_map(|m| m.as_str().parse().ok())
}

fn first_v6(body: &str) -> Option<Ipv6Addr> {
    V6_PATTERN
        .captures_iter(body)
        .find_map(|c| c.get(1).and_then(|m| m.as_str().parse().ok()))
}

/// Scrape an address of `family` from a reply body
pub fn extract_address(family: AddressFamily, body: &str) -> Option<IpAddress> {
    let address = match family {
        AddressFamily::V4 => IpAddress::new(first_v4(body), None),
        AddressFamily::V6 => IpAddress::new(None, first_v6(body)),
        AddressFamily::Any => IpAddress::new(first_v4(body), first_v6(body)),
    };
    (!address.is_empty()).then_some(address)
}

/// HTTP client shared by the web lookups
pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("ddupdate/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_default()
}

/// GET `url` and return the body of a 2xx reply
pub(crate) async fn fetch_text(client: &reqwest::Client, url: &str) -> Result<String> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::address(format!("Request to {url} failed: {e}")))?;

    if !response.status().is_success() {
        return Err(Error::address(format!(
            "HTTP error from {}: {}",
            url,
            response.status()
        )));
    }

    response
        .text()
        .await
        .map_err(|e| Error::address(format!("Failed to read response from {url}: {e}")))
}

/// Address plugin scraping web replies
#[derive(Debug, Clone)]
pub struct WebAddressPlugin {
    name: String,
    oneliner: String,
    help: String,
    urls: Vec<String>,
    family: AddressFamily,
    client: reqwest::Client,
}

impl WebAddressPlugin {
    /// Create a plugin trying `urls` in order
    pub fn new(
        name: impl Into<String>,
        oneliner: impl Into<String>,
        help: impl Into<String>,
        urls: Vec<String>,
        family: AddressFamily,
    ) -> Self {
        Self {
            name: name.into(),
            oneliner: oneliner.into(),
            help: help.into(),
            urls,
            family,
            client: http_client(DEFAULT_HTTP_TIMEOUT),
        }
    }

    /// `default-web-ip`
    pub fn default_web_ip() -> Self {
        Self::new(
            "default-web-ip",
            "Obtain external address as seen from the net",
            "\
Asks http://checkip.dyndns.org/ for the external IPv4 address, falling
back to https://api.ipify.org and https://ifconfig.co. Works behind NAT.",
            vec![
                "http://checkip.dyndns.org/".to_string(),
                "https://api.ipify.org?format=json".to_string(),
                "https://ifconfig.co".to_string(),
            ],
            AddressFamily::V4,
        )
    }

    /// `default-web-ip6`
    pub fn default_web_ip6() -> Self {
        Self::new(
            "default-web-ip6",
            "Obtain external ipv6 address as seen from the net",
            "\
Asks https://now-dns.com/ip for the external IPv6 address, falling back
to http://ipv6.whatismyip.akamai.com and https://ifcfg.me/.",
            vec![
                "https://now-dns.com/ip".to_string(),
                "http://ipv6.whatismyip.akamai.com".to_string(),
                "https://ifcfg.me/".to_string(),
            ],
            AddressFamily::V6,
        )
    }

    /// Replace the lookup URLs
    pub fn with_urls(mut self, urls: Vec<String>) -> Self {
        self.urls = urls;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = http_client(timeout);
        self
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    async fn check_url(&self, url: &str) -> Option<IpAddress> {
        debug!("Trying {}", url);
        let body = match fetch_text(&self.client, url).await {
            Ok(body) => body,
            Err(e) => {
                debug!("Bad response (ignored): {}", e);
                return None;
            }
        };
        let address = extract_address(self.family, &body);
        if address.is_none() {
            debug!("Cannot parse address reply from {}", url);
        }
        address
    }
}

impl Plugin for WebAddressPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn oneliner(&self) -> &str {
        &self.oneliner
    }

    fn help(&self) -> &str {
        &self.help
    }
}

#[async_trait]
impl AddressPlugin for WebAddressPlugin {
    async fn get_ip(&self, _options: &PluginOptions) -> Result<IpAddress> {
        for (ix, url) in self.urls.iter().enumerate() {
            if let Some(address) = self.check_url(url).await {
                return Ok(address);
            }
            if let Some(next) = self.urls.get(ix + 1) {
                info!("Falling back to {}", next);
            }
        }
        Err(Error::address(format!(
            "No address found ({} tried)",
            self.urls.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn scrapes_addresses_from_html_and_json() {
        let html = "<html><body>Current IP Address: 203.0.113.9</body></html>";
        assert_eq!(
            extract_address(AddressFamily::V4, html),
            Some(IpAddress::from_v4(Ipv4Addr::new(203, 0, 113, 9)))
        );
        assert_eq!(
            extract_address(AddressFamily::V4, r#"{"ip":"198.51.100.2"}"#)
                .and_then(|a| a.v4),
            Some(Ipv4Addr::new(198, 51, 100, 2))
        );
        assert_eq!(extract_address(AddressFamily::V4, "no address"), None);
        assert_eq!(extract_address(AddressFamily::V4, "999.1.1.1"), None);
    }

    #[test]
    fn scrapes_v6_literal() {
        let address = extract_address(AddressFamily::V6, "2001:db8:85a3::8a2e:370:7334\n").unwrap();
        assert_eq!(address.v6, Some("2001:db8:85a3::8a2e:370:7334".parse().unwrap()));
        assert_eq!(extract_address(AddressFamily::V6, "::1"), None);
    }

    #[tokio::test]
    async fn falls_back_to_next_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/garbage"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_string("192.0.2.33\n"))
            .expect(1)
            .mount(&server)
            .await;

        let plugin = WebAddressPlugin::default_web_ip().with_urls(vec![
            format!("{}/broken", server.uri()),
            format!("{}/garbage", server.uri()),
            format!("{}/ok", server.uri()),
        ]);
        let address = plugin.get_ip(&PluginOptions::new()).await.unwrap();
        assert_eq!(address, IpAddress::from_v4(Ipv4Addr::new(192, 0, 2, 33)));
    }

    #[tokio::test]
    async fn all_urls_failing_is_resolution_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let plugin = WebAddressPlugin::default_web_ip6()
            .with_urls(vec![format!("{}/a", server.uri()), format!("{}/b", server.uri())]);
        let err = plugin.get_ip(&PluginOptions::new()).await.unwrap_err();
        assert!(matches!(err, Error::AddressResolution(_)));
    }
}
