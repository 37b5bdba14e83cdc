// # Cloudflare Service Plugin
//
// Updates A and AAAA records through the Cloudflare API v4.
//
// ## Flow
//
// 1. Find the zone id (`GET /zones?name=<zone>`) unless `zone_id=` is given
// 2. List the records of the host (`GET /zones/:zone_id/dns_records?name=..`)
// 3. For each address family present:
//    - record with the same content: nothing to do
//    - record with other content: `PUT /zones/:zone_id/dns_records/:id`
//    - no record: `POST /zones/:zone_id/dns_records`
//
// ## Credentials
//
// Looked up under `api.cloudflare.com`: the login is the account email,
// the password the global API key. They are sent as `X-Auth-Email` and
// `X-Auth-Key` and never logged.
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/

use async_trait::async_trait;
use ddupdate_core::{
    Credential, Error, IpAddress, Plugin, PluginOptions, Result, ServiceContext, ServicePlugin,
};
use ddupdate_core::registry::{BuiltinSource, PluginUnit};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Cloudflare API base URL
const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Credential key for the API
pub const CREDENTIALS_KEY: &str = "api.cloudflare.com";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const SERVICE: &str = "cloudflare.com";

const HELP: &str = "\
Updates A and AAAA records on cloudflare.com, creating them when
missing. An address is required; ip-disabled cannot be used.

Credentials (netrc):
    machine api.cloudflare.com login <account email> password <API key>

Options:
    zone=<zone name>   Zone holding the host, required
    zone_id=<id>       Zone id, skips the zone lookup";

/// An existing DNS record
#[derive(Debug, Clone, PartialEq, Eq)]
struct DnsRecord {
    id: String,
    record_type: String,
    content: String,
}

/// Cloudflare service plugin
pub struct CloudflareService {
    api_base: String,
    client: reqwest::Client,
}

impl CloudflareService {
    pub fn new() -> Self {
        Self::with_api_base(CLOUDFLARE_API_BASE)
    }

    /// Use another API endpoint
    pub fn with_api_base(api_base: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    async fn call(
        &self,
        auth: &ApiAuth<'_>,
        request: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<Value> {
        let response = request
            .header("X-Auth-Email", auth.email)
            .header("X-Auth-Key", auth.key)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| Error::registration(SERVICE, format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(status_error(status, what, &error_text));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| Error::registration(SERVICE, format!("Failed to parse response: {e}")))?;

        if json["success"].as_bool() != Some(true) {
            return Err(Error::registration(
                SERVICE,
                format!("{} failed: {}", what, json["errors"]),
            ));
        }
        Ok(json["result"].clone())
    }

    async fn zone_id(&self, auth: &ApiAuth<'_>, zone: &str) -> Result<String> {
        debug!("Looking up zone ID for {}", zone);
        let request = self
            .client
            .get(format!("{}/zones", self.api_base))
            .query(&[("name", zone), ("per_page", "1")]);
        let result = self.call(auth, request, "Zone lookup").await?;

        let zone_id = result
            .as_array()
            .and_then(|zones| zones.first())
            .and_then(|z| z["id"].as_str())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::registration(SERVICE, format!("Zone {zone} not found")))?;

        debug!("Found zone ID: {}", zone_id);
        Ok(zone_id.to_string())
    }

    async fn records(&self, auth: &ApiAuth<'_>, zone_id: &str, hostname: &str) -> Result<Vec<DnsRecord>> {
        let request = self
            .client
            .get(format!("{}/zones/{}/dns_records", self.api_base, zone_id))
            .query(&[("name", hostname), ("match", "all")]);
        let result = self.call(auth, request, "Record lookup").await?;

        let records = result.as_array().ok_or_else(|| {
            Error::registration(SERVICE, "Invalid response format: result is not an array")
        })?;
        Ok(records
            .iter()
            .filter_map(|r| {
                Some(DnsRecord {
                    id: r["id"].as_str()?.to_string(),
                    record_type: r["type"].as_str()?.to_string(),
                    content: r["content"].as_str()?.to_string(),
                })
            })
            .collect())
    }

    async fn sync_record(
        &self,
        auth: &ApiAuth<'_>,
        zone_id: &str,
        hostname: &str,
        record_type: &str,
        wanted: String,
        existing: Option<&DnsRecord>,
    ) -> Result<()> {
        let payload = json!({
            "type": record_type,
            "name": hostname,
            "content": wanted,
        });

        match existing {
            Some(record) if record.content == wanted => {
                info!("Existing {} record matches, skipping update", record_type);
                return Ok(());
            }
            Some(record) => {
                debug!(
                    "Updating {} record {}: {} -> {}",
                    record_type, hostname, record.content, wanted
                );
                let request = self
                    .client
                    .put(format!(
                        "{}/zones/{}/dns_records/{}",
                        self.api_base, zone_id, record.id
                    ))
                    .json(&payload);
                self.call(auth, request, "Record update").await?;
            }
            None => {
                debug!("Creating {} record {} -> {}", record_type, hostname, wanted);
                let request = self
                    .client
                    .post(format!("{}/zones/{}/dns_records", self.api_base, zone_id))
                    .json(&payload);
                self.call(auth, request, "Record creation").await?;
            }
        }
        info!("{} record updated: {} -> {}", record_type, hostname, wanted);
        Ok(())
    }
}

impl Default for CloudflareService {
    fn default() -> Self {
        Self::new()
    }
}

// Custom Debug implementation, nothing secret is held but keep it explicit
impl std::fmt::Debug for CloudflareService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareService")
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Email and API key for one run
struct ApiAuth<'a> {
    email: &'a str,
    key: &'a str,
}

impl<'a> ApiAuth<'a> {
    fn from_credential(credential: &'a Credential) -> Result<Self> {
        Ok(Self {
            email: credential.require_username(CREDENTIALS_KEY)?,
            key: &credential.password,
        })
    }
}

impl std::fmt::Debug for ApiAuth<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiAuth")
            .field("email", &self.email)
            .field("key", &"<REDACTED>")
            .finish()
    }
}

/// Map a non-2xx status to a registration error
fn status_error(status: reqwest::StatusCode, what: &str, error_text: &str) -> Error {
    let message = match status.as_u16() {
        401 | 403 => format!(
            "Authentication failed: Invalid API key or insufficient permissions. Status: {status}"
        ),
        404 => format!("{what}: not found. Status: {status}"),
        409 => format!("Conflict: Record is being updated by another process. Status: {status}"),
        429 => format!("Rate limit exceeded. Please retry later. Status: {status}"),
        500..=599 => format!("Cloudflare server error (transient): {status} - {error_text}"),
        _ => format!("{what} failed: {status} - {error_text}"),
    };
    Error::registration(SERVICE, message)
}

impl Plugin for CloudflareService {
    fn name(&self) -> &str {
        SERVICE
    }

    fn oneliner(&self) -> &str {
        "Updates on https://cloudflare.com"
    }

    fn help(&self) -> &str {
        HELP
    }
}

#[async_trait]
impl ServicePlugin for CloudflareService {
    async fn register(
        &self,
        ctx: &ServiceContext,
        hostname: &str,
        address: Option<&IpAddress>,
        options: &PluginOptions,
    ) -> Result<()> {
        let address =
            address.ok_or_else(|| Error::registration(SERVICE, "An ip address must be defined"))?;
        let zone = options.require("zone")?;

        let credential = ctx.credentials().get(CREDENTIALS_KEY).await?;
        let auth = ApiAuth::from_credential(&credential)?;

        let zone_id = match options.get("zone_id") {
            Some(zone_id) => {
                debug!("Using pre-configured zone ID");
                zone_id.to_string()
            }
            None => self.zone_id(&auth, zone).await?,
        };

        let records = self.records(&auth, &zone_id, hostname).await?;
        let find = |record_type: &str| records.iter().find(|r| r.record_type == record_type);
        debug!(
            "host={} existing_a={:?} existing_aaaa={:?}",
            hostname,
            find("A").map(|r| &r.content),
            find("AAAA").map(|r| &r.content)
        );

        if let Some(v4) = address.v4 {
            self.sync_record(&auth, &zone_id, hostname, "A", v4.to_string(), find("A"))
                .await?;
        }
        if let Some(v6) = address.v6 {
            self.sync_record(&auth, &zone_id, hostname, "AAAA", v6.to_string(), find("AAAA"))
                .await?;
        }
        Ok(())
    }
}

/// Add the Cloudflare service to `source`
pub fn register(source: &mut BuiltinSource) {
    source.add(|| Ok(PluginUnit::Service(Arc::new(CloudflareService::new()))));
}
