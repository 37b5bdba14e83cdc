//! Template driven service plugin
//!
//! Most dynamic DNS services take a single HTTP request carrying the
//! hostname, the address and some credentials, and answer with a short
//! text reply. A [`ServiceTemplate`] describes such a service as data:
//!
//! - a URL with `{hostname}`, `{host}`, `{subdomain}`, `{domain}`,
//!   `{username}` and `{password}` placeholders
//! - the credential key and how credentials are sent
//! - the parameter names carrying the address
//! - the replies that mean success or failure
//!
//! Templates are used for the builtin services and for services defined
//! in plugin definition files.

use async_trait::async_trait;
use ddupdate_core::traits::DEFAULT_CACHE_TTL_MINUTES;
use ddupdate_core::{
    Credential, Error, IpAddress, Plugin, PluginOptions, Result, ServiceContext, ServicePlugin,
};
use md5::{Digest, Md5};
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::{Url, form_urlencoded};

/// Time limit for one update request
pub const DEFAULT_SERVICE_TIMEOUT: Duration = Duration::from_secs(120);

/// Credential key value meaning "no credentials"
const NO_CREDENTIALS: &str = "none";

/// How credentials reach the service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthScheme {
    /// No credentials at all
    None,
    /// HTTP basic authentication
    #[default]
    Basic,
    /// Only through `{username}`/`{password}` placeholders
    Query,
    /// `Authorization: Token <password>`
    Token,
}

/// How a reply is compared to the success list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReplyMatch {
    #[default]
    Equals,
    StartsWith,
    Contains,
    /// First whitespace separated word equals an entry
    FirstWord,
    /// Entries are regular expressions searched in the reply
    Regex,
}

/// Digest sent in place of the stored password
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PasswordHash {
    /// Lowercase hex MD5
    Md5,
}

impl PasswordHash {
    pub fn apply(self, password: &str) -> String {
        match self {
            PasswordHash::Md5 => format!("{:x}", Md5::digest(password.as_bytes())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

/// Request and reply rules of a template service
///
/// This is also the `[service]` table of a plugin definition file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct TemplateConfig {
    /// Update URL, placeholders are percent-encoded on expansion
    pub url: String,

    /// Credential lookup key. Defaults to the URL host, `none` disables
    /// credentials. May contain `{hostname}`.
    #[serde(default)]
    pub credentials: Option<String>,

    /// Try `<hostname>.<key>.ddupdate` before the key itself
    #[serde(default)]
    pub per_host_credentials: bool,

    #[serde(default)]
    pub auth: AuthScheme,

    #[serde(default)]
    pub password_hash: Option<PasswordHash>,

    /// Fixed parameters, placeholders allowed in values
    #[serde(default)]
    pub params: BTreeMap<String, String>,

    /// Parameter carrying the IPv4 address
    #[serde(default)]
    pub ipv4_param: Option<String>,

    /// Parameter carrying the IPv6 address
    #[serde(default)]
    pub ipv6_param: Option<String>,

    /// Single parameter carrying the IPv6 address if present, else IPv4
    #[serde(default)]
    pub address_param: Option<String>,

    /// Value sent for an absent family, instead of leaving it out
    #[serde(default)]
    pub auto_value: Option<String>,

    /// Fail when no address is given instead of letting the service pick
    #[serde(default)]
    pub requires_address: bool,

    /// Suffix removed from the hostname to form `{host}`
    #[serde(default)]
    pub strip_suffix: Option<String>,

    #[serde(default)]
    pub method: HttpMethod,

    /// Send parameters as a form body. Requires `method = "post"`.
    #[serde(default)]
    pub form: bool,

    /// Replies meaning success; empty accepts any 2xx reply
    #[serde(default)]
    pub success: Vec<String>,

    #[serde(default, rename = "match")]
    pub reply_match: ReplyMatch,

    /// Reply substrings meaning failure, checked before `success`
    #[serde(default)]
    pub failure: Vec<String>,

    /// Address cache lifetime in minutes
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl: u64,

    /// Repeat the request once after a timeout
    #[serde(default)]
    pub retry_on_timeout: bool,
}

fn default_cache_ttl() -> u64 {
    DEFAULT_CACHE_TTL_MINUTES
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            credentials: None,
            per_host_credentials: false,
            auth: AuthScheme::default(),
            password_hash: None,
            params: BTreeMap::new(),
            ipv4_param: None,
            ipv6_param: None,
            address_param: None,
            auto_value: None,
            requires_address: false,
            strip_suffix: None,
            method: HttpMethod::default(),
            form: false,
            success: Vec::new(),
            reply_match: ReplyMatch::default(),
            failure: Vec::new(),
            cache_ttl: default_cache_ttl(),
            retry_on_timeout: false,
        }
    }
}

impl TemplateConfig {
    /// Check the template for contradictions
    pub fn validate(&self) -> Result<()> {
        let sample = Credential::new(Some("user".into()), "pw");
        let values = Placeholders::new("host.example.net", "host", Some(&sample));
        let url = expand(&self.url, &values, true)?;
        Url::parse(&url).map_err(|e| Error::config(format!("Bad service url {}: {}", self.url, e)))?;

        let uses_secrets = std::iter::once(&self.url)
            .chain(self.params.values())
            .any(|t| t.contains("{username}") || t.contains("{password}"));
        if self.auth == AuthScheme::None && uses_secrets {
            return Err(Error::config(
                "auth = \"none\" conflicts with {username}/{password} placeholders",
            ));
        }
        if self.auth != AuthScheme::None && self.credential_template().is_none() {
            return Err(Error::config("credentials = \"none\" requires auth = \"none\""));
        }
        if self.address_param.is_some() && (self.ipv4_param.is_some() || self.ipv6_param.is_some()) {
            return Err(Error::config(
                "address-param cannot be combined with ipv4-param or ipv6-param",
            ));
        }
        if self.form && self.method != HttpMethod::Post {
            return Err(Error::config("form = true requires method = \"post\""));
        }
        if self.cache_ttl == 0 {
            return Err(Error::config("cache-ttl must be at least one minute"));
        }
        if self.reply_match == ReplyMatch::Regex {
            for pattern in &self.success {
                Regex::new(pattern).map_err(|e| {
                    Error::config(format!("Bad success pattern {pattern}: {e}"))
                })?;
            }
        }
        Ok(())
    }

    fn credential_template(&self) -> Option<&str> {
        match self.credentials.as_deref() {
            Some(NO_CREDENTIALS) => None,
            Some(key) => Some(key),
            None => Some(""),
        }
    }

    /// Parameters carrying the address, in request order
    pub fn address_params(&self, address: Option<&IpAddress>) -> Vec<(String, String)> {
        let v4 = address.and_then(|a| a.v4).map(|a| a.to_string());
        let v6 = address.and_then(|a| a.v6).map(|a| a.to_string());
        let mut params = Vec::new();

        if let Some(name) = &self.address_param {
            if let Some(value) = v6.or(v4).or_else(|| self.auto_value.clone()) {
                params.push((name.clone(), value));
            }
            return params;
        }
        if let Some(name) = &self.ipv4_param {
            if let Some(value) = v4.or_else(|| self.auto_value.clone()) {
                params.push((name.clone(), value));
            }
        }
        if let Some(name) = &self.ipv6_param {
            if let Some(value) = v6.or_else(|| self.auto_value.clone()) {
                params.push((name.clone(), value));
            }
        }
        params
    }

    /// True if `reply` is a success reply
    pub fn reply_ok(&self, reply: &str) -> bool {
        let reply = reply.trim();
        if self.failure.iter().any(|f| reply.contains(f.as_str())) {
            return false;
        }
        if self.success.is_empty() {
            return true;
        }
        let first_word = reply.split_whitespace().next().unwrap_or_default();
        self.success.iter().any(|expected| match self.reply_match {
            ReplyMatch::Equals => reply == expected,
            ReplyMatch::StartsWith => reply.starts_with(expected.as_str()),
            ReplyMatch::Contains => reply.contains(expected.as_str()),
            ReplyMatch::FirstWord => first_word == expected,
            ReplyMatch::Regex => Regex::new(expected).is_ok_and(|re| re.is_match(reply)),
        })
    }
}

/// Split `hostname` below its registered domain
///
/// The domain is the last two labels, three under `co.uk`. A hostname that
/// is a bare domain has an empty subdomain.
pub fn split_domain(hostname: &str) -> (&str, &str) {
    let hostname = hostname.trim_end_matches('.');
    let labels = if hostname.ends_with(".co.uk") { 3 } else { 2 };
    let dots: Vec<usize> = hostname.match_indices('.').map(|(i, _)| i).collect();
    if dots.len() < labels {
        return ("", hostname);
    }
    let cut = dots[dots.len() - labels];
    (&hostname[..cut], &hostname[cut + 1..])
}

/// Values substituted into URL and parameter templates
struct Placeholders<'a> {
    hostname: &'a str,
    host: &'a str,
    subdomain: &'a str,
    domain: &'a str,
    credential: Option<&'a Credential>,
}

impl<'a> Placeholders<'a> {
    fn new(hostname: &'a str, host: &'a str, credential: Option<&'a Credential>) -> Self {
        let (subdomain, domain) = split_domain(hostname);
        Self {
            hostname,
            host,
            subdomain,
            domain,
            credential,
        }
    }

    fn lookup(&self, key: &str) -> Result<&str> {
        match key {
            "hostname" => Ok(self.hostname),
            "host" => Ok(self.host),
            "subdomain" => Ok(self.subdomain),
            "domain" => Ok(self.domain),
            "username" => self
                .credential
                .ok_or_else(|| Error::credential("No credentials for {username}"))?
                .username
                .as_deref()
                .ok_or_else(|| Error::credential("No username stored for this service")),
            "password" => self
                .credential
                .map(|c| c.password.as_str())
                .ok_or_else(|| Error::credential("No credentials for {password}")),
            other => Err(Error::config(format!("Unknown placeholder {{{other}}}"))),
        }
    }
}

fn expand(template: &str, values: &Placeholders<'_>, encode: bool) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return Ok(out);
        };
        let value = values.lookup(&after[..end])?;
        if encode {
            out.extend(form_urlencoded::byte_serialize(value.as_bytes()));
        } else {
            out.push_str(value);
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// A service plugin driven by a [`TemplateConfig`]
#[derive(Debug, Clone)]
pub struct ServiceTemplate {
    name: String,
    oneliner: String,
    help: String,
    config: TemplateConfig,
    client: reqwest::Client,
}

impl ServiceTemplate {
    /// Create a template service, validating `config`
    pub fn new(
        name: impl Into<String>,
        oneliner: impl Into<String>,
        help: impl Into<String>,
        config: TemplateConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            name: name.into(),
            oneliner: oneliner.into(),
            help: help.into(),
            config,
            client: reqwest::Client::builder()
                .timeout(DEFAULT_SERVICE_TIMEOUT)
                .user_agent(concat!("ddupdate/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_default(),
        })
    }

    pub fn config(&self) -> &TemplateConfig {
        &self.config
    }

    /// Replace the update URL, keeping the credential key
    ///
    /// The credential key is pinned to the old URL host if it was derived
    /// from it.
    pub fn with_url(mut self, url: impl Into<String>) -> Result<Self> {
        if self.config.credentials.is_none() {
            self.config.credentials = Some(self.url_host()?);
        }
        self.config.url = url.into();
        self.config.validate()?;
        Ok(self)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        self
    }

    fn url_host(&self) -> Result<String> {
        let sample = Credential::new(Some("u".into()), "p");
        let values = Placeholders::new("h", "h", Some(&sample));
        let url = Url::parse(&expand(&self.config.url, &values, true)?)
            .map_err(|e| Error::config(format!("Bad service url: {e}")))?;
        url.host_str()
            .map(str::to_lowercase)
            .ok_or_else(|| Error::config(format!("No host in url {}", self.config.url)))
    }

    /// Credential key for `hostname`, `None` when no credentials are used
    pub fn credential_key(&self, hostname: &str) -> Result<Option<String>> {
        if self.config.auth == AuthScheme::None {
            return Ok(None);
        }
        match self.config.credential_template() {
            None => Ok(None),
            Some("") => self.url_host().map(Some),
            Some(key) => Ok(Some(key.replace("{hostname}", hostname))),
        }
    }

    async fn credential(&self, ctx: &ServiceContext, hostname: &str) -> Result<Option<Credential>> {
        let Some(key) = self.credential_key(hostname)? else {
            return Ok(None);
        };
        debug!("Using credentials for {}", key);
        let mut credential = if self.config.per_host_credentials {
            ctx.credentials().get_for_host(&key, hostname).await?
        } else {
            ctx.credentials().get(&key).await?
        };
        if let Some(hash) = self.config.password_hash {
            credential.password = hash.apply(&credential.password);
        }
        Ok(Some(credential))
    }

    fn host<'a>(&self, hostname: &'a str) -> &'a str {
        self.config
            .strip_suffix
            .as_deref()
            .and_then(|suffix| hostname.strip_suffix(suffix))
            .unwrap_or(hostname)
    }

    fn request(
        &self,
        hostname: &str,
        credential: Option<&Credential>,
        address: Option<&IpAddress>,
    ) -> Result<reqwest::RequestBuilder> {
        let values = Placeholders::new(hostname, self.host(hostname), credential);
        let mut url = Url::parse(&expand(&self.config.url, &values, true)?)
            .map_err(|e| Error::config(format!("Bad service url: {e}")))?;

        let mut params = Vec::new();
        for (key, template) in &self.config.params {
            params.push((key.clone(), expand(template, &values, false)?));
        }
        params.extend(self.config.address_params(address));

        if !self.config.form && !params.is_empty() {
            url.query_pairs_mut().extend_pairs(&params);
        }

        let mut request = match self.config.method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => self.client.post(url),
        };
        if self.config.form {
            request = request.form(&params);
        }

        match (self.config.auth, credential) {
            (AuthScheme::Basic, Some(credential)) => {
                let username = credential.username.as_deref().unwrap_or_default();
                request = request.basic_auth(username, Some(&credential.password));
            }
            (AuthScheme::Token, Some(credential)) => {
                request = request.header(
                    reqwest::header::AUTHORIZATION,
                    format!("Token {}", credential.password),
                );
            }
            _ => {}
        }
        Ok(request)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String> {
        let retry = if self.config.retry_on_timeout {
            request.try_clone()
        } else {
            None
        };

        let response = match request.send().await {
            Err(e) if e.is_timeout() && retry.is_some() => {
                warn!("{}: request timed out, retrying once", self.name);
                match retry {
                    Some(retry) => retry.send().await,
                    None => Err(e),
                }
            }
            other => other,
        }
        .map_err(|e| {
            if e.is_timeout() {
                Error::registration(&self.name, "Timeout waiting for the service")
            } else {
                Error::registration(&self.name, format!("Request failed: {e}"))
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::registration(&self.name, format!("Failed to read reply: {e}")))?;
        debug!("Got response ({}): {}", status, body.trim());

        if !status.is_success() {
            return Err(Error::registration(
                &self.name,
                format!("Cannot update, response code: {} {}", status, body.trim()),
            ));
        }
        Ok(body)
    }
}

impl Plugin for ServiceTemplate {
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
impl ServicePlugin for ServiceTemplate {
    fn cache_ttl_minutes(&self) -> u64 {
        self.config.cache_ttl
    }

    async fn register(
        &self,
        ctx: &ServiceContext,
        hostname: &str,
        address: Option<&IpAddress>,
        _options: &PluginOptions,
    ) -> Result<()> {
        if self.config.requires_address && address.is_none() {
            return Err(Error::registration(
                &self.name,
                "An address is required, ip-disabled cannot be used",
            ));
        }

        let credential = self.credential(ctx, hostname).await?;
        let request = self.request(hostname, credential.as_ref(), address)?;
        let reply = self.send(request).await?;

        if !self.config.reply_ok(&reply) {
            return Err(Error::registration(
                &self.name,
                format!("Bad update reply: {}", reply.trim()),
            ));
        }
        info!("Server reply: {}", reply.trim());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddupdate_core::{Credentials, MemoryCredentialStore};
    use std::net::{Ipv4Addr, Ipv6Addr};
    use std::sync::Arc;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn both() -> IpAddress {
        IpAddress::new(
            Some(Ipv4Addr::new(192, 0, 2, 1)),
            Some("2001:db8::1".parse::<Ipv6Addr>().unwrap()),
        )
    }

    async fn context(entries: &[(&str, &str, &str)]) -> ServiceContext {
        let mut store = MemoryCredentialStore::new();
        for (key, user, pw) in entries {
            store = store.with(key, user, pw).await;
        }
        ServiceContext::new(Credentials::new(Arc::new(store)))
    }

    #[test]
    fn address_param_modes() {
        let split = TemplateConfig {
            ipv4_param: Some("ip".into()),
            ipv6_param: Some("ip6".into()),
            ..TemplateConfig::default()
        };
        assert_eq!(
            split.address_params(Some(&both())),
            vec![
                ("ip".to_string(), "192.0.2.1".to_string()),
                ("ip6".to_string(), "2001:db8::1".to_string())
            ]
        );
        assert!(split.address_params(None).is_empty());

        let single = TemplateConfig {
            address_param: Some("myip".into()),
            ..TemplateConfig::default()
        };
        assert_eq!(single.address_params(Some(&both()))[0].1, "2001:db8::1");

        let auto = TemplateConfig {
            ipv4_param: Some("ipv4".into()),
            ipv6_param: Some("ipv6".into()),
            auto_value: Some("auto".into()),
            ..TemplateConfig::default()
        };
        let v4_only = IpAddress::from_v4(Ipv4Addr::new(192, 0, 2, 1));
        assert_eq!(auto.address_params(Some(&v4_only))[1].1, "auto");
        assert_eq!(auto.address_params(None).len(), 2);
    }

    #[test]
    fn reply_rules() {
        let mut config = TemplateConfig {
            success: vec!["good".into(), "nochg".into()],
            ..TemplateConfig::default()
        };
        assert!(config.reply_ok(" good\n"));
        assert!(!config.reply_ok("good 1.2.3.4"));

        config.reply_match = ReplyMatch::FirstWord;
        assert!(config.reply_ok("nochg 1.2.3.4"));
        assert!(!config.reply_ok("badauth"));

        config.reply_match = ReplyMatch::Contains;
        assert!(config.reply_ok("all good here"));

        config.success.clear();
        assert!(config.reply_ok("anything"));
    }

    #[test]
    fn validation_rejects_contradictions() {
        let config = TemplateConfig {
            url: "https://x.example/u?p={password}".into(),
            auth: AuthScheme::None,
            ..TemplateConfig::default()
        };
        assert!(config.validate().is_err());

        let config = TemplateConfig {
            url: "https://x.example/u".into(),
            form: true,
            ..TemplateConfig::default()
        };
        assert!(config.validate().is_err());

        let config = TemplateConfig {
            url: "https://x.example/u?h={nope}".into(),
            ..TemplateConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn placeholders_are_encoded_in_url_only() {
        let credential = Credential::new(Some("me".into()), "p&w d");
        let values = Placeholders::new("h.example.net", "h", Some(&credential));
        assert_eq!(
            expand("https://x/?p={password}&h={host}", &values, true).unwrap(),
            "https://x/?p=p%26w+d&h=h"
        );
        assert_eq!(expand("{password}", &values, false).unwrap(), "p&w d");
        assert_eq!(
            expand("{subdomain}|{domain}", &values, false).unwrap(),
            "h|example.net"
        );
    }

    #[test]
    fn domain_split() {
        assert_eq!(split_domain("www.example.com"), ("www", "example.com"));
        assert_eq!(split_domain("a.b.example.com."), ("a.b", "example.com"));
        assert_eq!(split_domain("example.com"), ("", "example.com"));
        assert_eq!(split_domain("home.example.co.uk"), ("home", "example.co.uk"));
        assert_eq!(split_domain("example.co.uk"), ("", "example.co.uk"));
    }

    #[test]
    fn failure_and_regex_replies() {
        let config = TemplateConfig {
            success: vec![r#""code"\s*:\s*[012]\b"#.into()],
            reply_match: ReplyMatch::Regex,
            failure: vec!["Couldn't ".into()],
            ..TemplateConfig::default()
        };
        assert!(config.reply_ok(r#"{"code": 0, "msg": "updated"}"#));
        assert!(config.reply_ok(r#"{"code":2,"msg":"unchanged"}"#));
        assert!(!config.reply_ok(r#"{"code": 13, "msg": "bad token"}"#));
        assert!(!config.reply_ok(r#"Couldn't find host, {"code": 0}"#));

        let anything = TemplateConfig {
            failure: vec!["Couldn't ".into()],
            ..TemplateConfig::default()
        };
        assert!(anything.reply_ok("Updated 1 host(s)"));
        assert!(!anything.reply_ok("Couldn't authenticate"));

        let broken = TemplateConfig {
            url: "https://x.example/u".into(),
            success: vec!["(unclosed".into()],
            reply_match: ReplyMatch::Regex,
            ..TemplateConfig::default()
        };
        assert!(broken.validate().is_err());
    }

    #[test]
    fn md5_password_hash() {
        assert_eq!(
            PasswordHash::Md5.apply("secret"),
            "5ebe2294ecd0e0f08eab7690d2a6ee69"
        );
    }

    #[tokio::test]
    async fn basic_auth_get_with_address_params() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/nic/update"))
            .and(query_param("hostname", "home.example.net"))
            .and(query_param("myip", "192.0.2.1"))
            .and(header("authorization", "Basic dXNlcjpzZWNyZXQ="))
            .respond_with(ResponseTemplate::new(200).set_body_string("good 192.0.2.1"))
            .expect(1)
            .mount(&server)
            .await;

        let service = ServiceTemplate::new(
            "test",
            "",
            "",
            TemplateConfig {
                url: format!("{}/nic/update?hostname={{hostname}}", server.uri()),
                credentials: Some("updates.example.net".into()),
                ipv4_param: Some("myip".into()),
                success: vec!["good".into(), "nochg".into()],
                reply_match: ReplyMatch::FirstWord,
                ..TemplateConfig::default()
            },
        )
        .unwrap();
        let ctx = context(&[("updates.example.net", "user", "secret")]).await;

        let v4 = IpAddress::from_v4(Ipv4Addr::new(192, 0, 2, 1));
        service
            .register(&ctx, "home.example.net", Some(&v4), &PluginOptions::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn post_form_and_bad_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/request"))
            .and(body_string_contains("host=home"))
            .and(body_string_contains("password=pw"))
            .and(body_string_contains("value=192.0.2.1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ERROR: nope"))
            .mount(&server)
            .await;

        let service = ServiceTemplate::new(
            "form",
            "",
            "",
            TemplateConfig {
                url: format!("{}/request", server.uri()),
                credentials: Some("form.example".into()),
                auth: AuthScheme::Query,
                params: BTreeMap::from([
                    ("host".to_string(), "{host}".to_string()),
                    ("password".to_string(), "{password}".to_string()),
                ]),
                ipv4_param: Some("value".into()),
                strip_suffix: Some(".form.example".into()),
                method: HttpMethod::Post,
                form: true,
                success: vec!["OK".into()],
                ..TemplateConfig::default()
            },
        )
        .unwrap();
        let ctx = context(&[("form.example", "api-key", "pw")]).await;

        let v4 = IpAddress::from_v4(Ipv4Addr::new(192, 0, 2, 1));
        let err = service
            .register(&ctx, "home.form.example", Some(&v4), &PluginOptions::new())
            .await
            .unwrap_err();
        match err {
            Error::Registration { service, message } => {
                assert_eq!(service, "form");
                assert!(message.contains("ERROR: nope"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn http_error_and_missing_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("badauth"))
            .mount(&server)
            .await;

        let service = ServiceTemplate::new(
            "svc",
            "",
            "",
            TemplateConfig {
                url: format!("{}/u", server.uri()),
                credentials: Some("svc.example".into()),
                ..TemplateConfig::default()
            },
        )
        .unwrap();

        let err = service
            .register(&context(&[]).await, "h", None, &PluginOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Credential(_)));

        let ctx = context(&[("svc.example", "u", "p")]).await;
        let err = service
            .register(&ctx, "h", None, &PluginOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Registration { .. }));
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn requires_address_rejects_null() {
        let service = ServiceTemplate::new(
            "strict",
            "",
            "",
            TemplateConfig {
                url: "https://strict.example/u".into(),
                auth: AuthScheme::None,
                credentials: Some("none".into()),
                requires_address: true,
                ..TemplateConfig::default()
            },
        )
        .unwrap();
        let err = service
            .register(&context(&[]).await, "h", None, &PluginOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Registration { .. }));
    }

    #[test]
    fn credential_key_rules() {
        let derived = ServiceTemplate::new(
            "d",
            "",
            "",
            TemplateConfig {
                url: "https://Nic.Example.COM/update?h={hostname}".into(),
                ..TemplateConfig::default()
            },
        )
        .unwrap();
        assert_eq!(derived.credential_key("x").unwrap().as_deref(), Some("nic.example.com"));

        let per_target = ServiceTemplate::new(
            "p",
            "",
            "",
            TemplateConfig {
                url: "https://dyn.example/".into(),
                credentials: Some("{hostname}".into()),
                ..TemplateConfig::default()
            },
        )
        .unwrap();
        assert_eq!(
            per_target.credential_key("a.example.net").unwrap().as_deref(),
            Some("a.example.net")
        );

        let moved = derived.with_url("http://127.0.0.1:9/update").unwrap();
        assert_eq!(moved.credential_key("x").unwrap().as_deref(), Some("nic.example.com"));
    }

    #[test]
    fn definition_table_deserializes() {
        let config: TemplateConfig = toml::from_str(
            r#"
            url = "https://example.net/nic/update?hostname={hostname}"
            credentials = "example.net"
            auth = "basic"
            ipv4-param = "myip"
            success = ["good", "nochg"]
            match = "starts-with"
            failure = ["badauth"]
            password-hash = "md5"
            cache-ttl = 60
            "#,
        )
        .unwrap();
        assert_eq!(config.reply_match, ReplyMatch::StartsWith);
        assert_eq!(config.password_hash, Some(PasswordHash::Md5));
        assert_eq!(config.failure, vec!["badauth".to_string()]);
        assert_eq!(config.cache_ttl, 60);
        config.validate().unwrap();
    }
}
