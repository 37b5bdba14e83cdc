//! Builtin service table

use ddupdate_core::{Plugin, Result};
use std::collections::BTreeMap;

use crate::template::{
    AuthScheme, HttpMethod, PasswordHash, ReplyMatch, ServiceTemplate, TemplateConfig,
};

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn params(list: &[(&str, &str)]) -> BTreeMap<String, String> {
    list.iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Netrc line shown in help texts
fn netrc_help(intro: &str, machine: &str, login: bool, extra: &str) -> String {
    let login = if login { " login <username>" } else { "" };
    format!(
        "{intro}\n\nCredentials (netrc):\n    machine {machine}{login} password <password>{extra}"
    )
}

/// Every builtin template service, in name order
pub fn builtin_templates() -> Result<Vec<ServiceTemplate>> {
    let templates = vec![
        ServiceTemplate::new(
            "changeip.com",
            "Updates on http://changeip.com/",
            netrc_help(
                "Updates a host on changeip.com. Works without an address, the\n\
                 ip-disabled plugin can be used. IPv6 is not supported.",
                "nic.changeip.com",
                true,
                "",
            ),
            TemplateConfig {
                url: "https://nic.changeip.com/nic/update?hostname={hostname}".into(),
                credentials: Some("nic.changeip.com".into()),
                ipv4_param: Some("ip".into()),
                success: words(&["uccessful"]),
                reply_match: ReplyMatch::Contains,
                ..TemplateConfig::default()
            },
        )?,
        ServiceTemplate::new(
            "desec.io",
            "Updates on http://desec.io/",
            netrc_help(
                "Updates a host on desec.io using a token per host. IPv6 is\n\
                 supported.",
                "<hostname>",
                false,
                "",
            ),
            TemplateConfig {
                url: "https://update.dedyn.io/?hostname={hostname}".into(),
                credentials: Some("{hostname}".into()),
                auth: AuthScheme::Token,
                ipv4_param: Some("myipv4".into()),
                ipv6_param: Some("myipv6".into()),
                success: words(&["good", "throttled"]),
                reply_match: ReplyMatch::Contains,
                ..TemplateConfig::default()
            },
        )?,
        ServiceTemplate::new(
            "dns-o-matic.com",
            "Updates on http://dnsomatic.com",
            netrc_help(
                "Updates hosts configured on dnsomatic.com. hostname =\n\
                 all.dnsomatic.com updates all of them. Only the address seen by\n\
                 the service or a web lookup makes sense. IPv6 is not supported.",
                "updates.dnsomatic.com",
                true,
                "",
            ),
            TemplateConfig {
                url: "https://updates.dnsomatic.com/nic/update?hostname={hostname}".into(),
                credentials: Some("updates.dnsomatic.com".into()),
                ipv4_param: Some("myip".into()),
                success: words(&["good", "nochg"]),
                reply_match: ReplyMatch::Contains,
                ..TemplateConfig::default()
            },
        )?,
        ServiceTemplate::new(
            "dnsdynamic.org",
            "Updates on http://dnsdynamic.org/",
            netrc_help(
                "Updates a host on dnsdynamic.org. The service registers the\n\
                 address it sees; use ip-disabled. IPv6 is not supported.",
                "www.dnsdynamic.org",
                true,
                "",
            ),
            TemplateConfig {
                url: "https://www.dnsdynamic.org/api?hostname={hostname}".into(),
                credentials: Some("www.dnsdynamic.org".into()),
                success: words(&["nochg", "good"]),
                reply_match: ReplyMatch::FirstWord,
                ..TemplateConfig::default()
            },
        )?,
        ServiceTemplate::new(
            "dnsexit.com",
            "Updates on https://www.dnsexit.com",
            netrc_help(
                "Updates a host on dnsexit.com. It is not known whether the\n\
                 service can pick the address itself, so avoid ip-disabled.\n\
                 The service recommends a separate password for updates.\n\
                 IPv6 is not supported.",
                "update.dnsexit.com",
                true,
                "",
            ),
            TemplateConfig {
                url: "https://update.dnsexit.com/RemoteUpdate.sv\
                      ?login={username}&password={password}&host={hostname}"
                    .into(),
                credentials: Some("update.dnsexit.com".into()),
                auth: AuthScheme::Query,
                ipv4_param: Some("myip".into()),
                success: words(&[r"(?m)^\s*[01]="]),
                reply_match: ReplyMatch::Regex,
                ..TemplateConfig::default()
            },
        )?,
        ServiceTemplate::new(
            "dnshome.de",
            "Updates on https://www.dnshome.de/",
            netrc_help(
                "Updates a host on dnshome.de. The host is selected by the\n\
                 username (like sub.dnshome.de), the hostname is ignored by\n\
                 the service. Both address families are supported; use\n\
                 ip-version to pick them.",
                "www.dnshome.de",
                true,
                "",
            ),
            TemplateConfig {
                url: "https://www.dnshome.de/dyndns.php?hostname={hostname}".into(),
                credentials: Some("www.dnshome.de".into()),
                ipv4_param: Some("ip".into()),
                ipv6_param: Some("ip6".into()),
                success: words(&["good", "nochg"]),
                reply_match: ReplyMatch::StartsWith,
                ..TemplateConfig::default()
            },
        )?,
        ServiceTemplate::new(
            "dnspark.com",
            "Updates on https://dnspark.com/",
            netrc_help(
                "Updates a host in a domain delegated to dnspark.com. The dynamic\n\
                 DNS username and password are created in the web interface.\n\
                 IPv6 is not supported.",
                "control.dnspark.com",
                true,
                "",
            ),
            TemplateConfig {
                url: "https://control.dnspark.com/api/dynamic/update.php?hostname={hostname}"
                    .into(),
                credentials: Some("control.dnspark.com".into()),
                ipv4_param: Some("ip".into()),
                success: words(&["ok", "nochange"]),
                ..TemplateConfig::default()
            },
        )?,
        ServiceTemplate::new(
            "domains.google.com",
            "Updates on https://domains.google.com",
            netrc_help(
                "Updates a synthetic record on domains.google.com. Each host\n\
                 has its own generated credentials; they are looked up as\n\
                 <hostname>.domains.google.com.ddupdate first.",
                "domains.google.com",
                true,
                "\n    machine <hostname>.domains.google.com.ddupdate login <username> password <password>",
            ),
            TemplateConfig {
                url: "https://domains.google.com/nic/update".into(),
                credentials: Some("domains.google.com".into()),
                per_host_credentials: true,
                params: params(&[("hostname", "{hostname}")]),
                address_param: Some("myip".into()),
                method: HttpMethod::Post,
                success: words(&["good", "nochg"]),
                reply_match: ReplyMatch::FirstWord,
                ..TemplateConfig::default()
            },
        )?,
        ServiceTemplate::new(
            "dtdns.com",
            "Updates on https://www.dtdns.com",
            netrc_help(
                "Updates a host on dtdns.com. IPv6 is not supported. A request\n\
                 that times out is repeated once.",
                "www.dtdns.com",
                true,
                "",
            ),
            TemplateConfig {
                url: "https://www.dtdns.com/api/autodns.cfm?id={hostname}&pw={password}".into(),
                credentials: Some("www.dtdns.com".into()),
                auth: AuthScheme::Query,
                ipv4_param: Some("ip".into()),
                success: words(&["points to"]),
                reply_match: ReplyMatch::Contains,
                retry_on_timeout: true,
                ..TemplateConfig::default()
            },
        )?,
        ServiceTemplate::new(
            "duckdns.org",
            "Updates on http://duckdns.org",
            netrc_help(
                "Updates a host on duckdns.org using the account API token.\n\
                 IPv6 is supported.",
                "www.duckdns.org",
                false,
                "",
            ),
            TemplateConfig {
                url: "https://www.duckdns.org/update?domains={host}&token={password}".into(),
                credentials: Some("www.duckdns.org".into()),
                auth: AuthScheme::Query,
                strip_suffix: Some(".duckdns.org".into()),
                ipv4_param: Some("ip".into()),
                ipv6_param: Some("ipv6".into()),
                success: words(&["OK"]),
                ..TemplateConfig::default()
            },
        )?,
        ServiceTemplate::new(
            "duiadns.net",
            "Updates on https://www.duiadns.net",
            netrc_help(
                "Updates a host on duiadns.net using the API token from the\n\
                 account page. The host must exist in the web interface. An\n\
                 address is required, ip-disabled cannot be used. IPv6 is\n\
                 supported.",
                "ip.duiadns.net",
                false,
                "",
            ),
            TemplateConfig {
                url: "https://ip.duiadns.net/dynamic.duia?host={hostname}&password={password}"
                    .into(),
                credentials: Some("ip.duiadns.net".into()),
                auth: AuthScheme::Query,
                ipv4_param: Some("ip4".into()),
                ipv6_param: Some("ip6".into()),
                requires_address: true,
                success: words(&["Ipv4", "Ipv6"]),
                reply_match: ReplyMatch::Contains,
                ..TemplateConfig::default()
            },
        )?,
        ServiceTemplate::new(
            "dy.fi",
            "Updates on https://www.dy.fi/",
            netrc_help(
                "Updates a host on dy.fi. The service registers the address it\n\
                 sees; use ip-disabled. Updates are needed only every few days.",
                "www.dy.fi",
                true,
                "",
            ),
            TemplateConfig {
                url: "https://www.dy.fi/nic/update?hostname={hostname}".into(),
                credentials: Some("www.dy.fi".into()),
                success: words(&["nochg", "good"]),
                reply_match: ReplyMatch::FirstWord,
                cache_ttl: 7200,
                ..TemplateConfig::default()
            },
        )?,
        ServiceTemplate::new(
            "dynu.com",
            "Updates on https://www.dynu.com/en-US/DynamicDNS",
            netrc_help(
                "Updates a host on dynu.com. The password is sent as its MD5\n\
                 digest. Works with ip-disabled. IPv6 is supported.",
                "api.dynu.com",
                true,
                "",
            ),
            TemplateConfig {
                url: "https://api.dynu.com/nic/update\
                      ?hostname={hostname}&username={username}&password={password}"
                    .into(),
                credentials: Some("api.dynu.com".into()),
                auth: AuthScheme::Query,
                password_hash: Some(PasswordHash::Md5),
                ipv4_param: Some("myip".into()),
                ipv6_param: Some("myipv6".into()),
                success: words(&["good", "nochg"]),
                reply_match: ReplyMatch::FirstWord,
                ..TemplateConfig::default()
            },
        )?,
        ServiceTemplate::new(
            "dynv6.com",
            "Updates on http://dynv6.com",
            netrc_help(
                "Updates a host on dynv6.com using the account API token. IPv6\n\
                 is supported. A missing address family is sent as \"auto\".",
                "dynv6.com",
                false,
                "",
            ),
            TemplateConfig {
                url: "https://dynv6.com/api/update".into(),
                credentials: Some("dynv6.com".into()),
                auth: AuthScheme::Query,
                params: params(&[("hostname", "{hostname}"), ("token", "{password}")]),
                ipv4_param: Some("ipv4".into()),
                ipv6_param: Some("ipv6".into()),
                auto_value: Some("auto".into()),
                success: words(&["updated", "unchanged"]),
                reply_match: ReplyMatch::Contains,
                ..TemplateConfig::default()
            },
        )?,
        ServiceTemplate::new(
            "freedns.afraid.org",
            "Updates on https://freedns.afraid.org",
            netrc_help(
                "Updates a host on freedns.afraid.org. Works with a given\n\
                 address or the address seen by the service. IPv6 is preferred\n\
                 when both families are present.",
                "freedns.afraid.org",
                true,
                "",
            ),
            TemplateConfig {
                url: "https://sync.afraid.org/u/?u={username}&p={password}&h={hostname}".into(),
                credentials: Some("freedns.afraid.org".into()),
                auth: AuthScheme::Query,
                address_param: Some("ip".into()),
                success: words(&["Updated", "skipping"]),
                reply_match: ReplyMatch::Contains,
                ..TemplateConfig::default()
            },
        )?,
        ServiceTemplate::new(
            "freedns.io",
            "Updates on https://freedns.io",
            netrc_help(
                "Updates the A record of a host on freedns.io.",
                "freedns.io",
                true,
                "",
            ),
            TemplateConfig {
                url: "https://freedns.io/request".into(),
                credentials: Some("freedns.io".into()),
                auth: AuthScheme::Query,
                params: params(&[
                    ("username", "{username}"),
                    ("password", "{password}"),
                    ("host", "{host}"),
                    ("record", "A"),
                ]),
                strip_suffix: Some(".freedns.io".into()),
                ipv4_param: Some("value".into()),
                method: HttpMethod::Post,
                form: true,
                ..TemplateConfig::default()
            },
        )?,
        ServiceTemplate::new(
            "hurricane_electric",
            "Updates on https://he.com",
            netrc_help(
                "Updates a host on dns.he.net. Each host has its own key,\n\
                 generated in the web interface. IPv6 is used when present,\n\
                 else IPv4.",
                "<hostname>",
                false,
                "",
            ),
            TemplateConfig {
                url: "https://dyn.dns.he.net/nic/update".into(),
                credentials: Some("{hostname}".into()),
                auth: AuthScheme::Query,
                params: params(&[("hostname", "{hostname}"), ("password", "{password}")]),
                address_param: Some("myip".into()),
                method: HttpMethod::Post,
                form: true,
                ..TemplateConfig::default()
            },
        )?,
        ServiceTemplate::new(
            "myonlineportal.net",
            "Updates on http://myonlineportal.net/",
            netrc_help(
                "Updates a host on myonlineportal.net. IPv6 is supported.",
                "myonlineportal.net",
                true,
                "",
            ),
            TemplateConfig {
                url: "https://myonlineportal.net/updateddns?hostname={hostname}".into(),
                credentials: Some("myonlineportal.net".into()),
                ipv4_param: Some("ip".into()),
                ipv6_param: Some("ip6".into()),
                success: words(&["OK", "good", "nochg"]),
                reply_match: ReplyMatch::FirstWord,
                ..TemplateConfig::default()
            },
        )?,
        ServiceTemplate::new(
            "namecheap.com",
            "Updates on http://namecheap.com",
            netrc_help(
                "Updates a host on namecheap.com with the dynamic DNS password\n\
                 from the account page. The host must exist in the web\n\
                 interface. The hostname is split into host and domain, the\n\
                 domain being the last two labels (three under co.uk). One\n\
                 address is sent, IPv6 when present.",
                "namecheap.com",
                false,
                "",
            ),
            TemplateConfig {
                url: "https://dynamicdns.park-your-domain.com/update\
                      ?host={subdomain}&domain={domain}&password={password}"
                    .into(),
                credentials: Some("namecheap.com".into()),
                auth: AuthScheme::Query,
                address_param: Some("ip".into()),
                success: words(&["<ErrCount>0</ErrCount>"]),
                reply_match: ReplyMatch::Contains,
                ..TemplateConfig::default()
            },
        )?,
        ServiceTemplate::new(
            "no-ip.com",
            "Updates on http://no-ip.com/",
            netrc_help(
                "Updates a host on no-ip.com. IPv6 is not supported.",
                "dynupdate.no-ip.com",
                true,
                "",
            ),
            TemplateConfig {
                url: "http://dynupdate.no-ip.com/nic/update?hostname={hostname}".into(),
                credentials: Some("dynupdate.no-ip.com".into()),
                ipv4_param: Some("myip".into()),
                success: words(&["good", "nochg"]),
                reply_match: ReplyMatch::FirstWord,
                ..TemplateConfig::default()
            },
        )?,
        ServiceTemplate::new(
            "now-dns.com",
            "Updates on http://now-dns.com",
            netrc_help(
                "Updates a host on now-dns.com. Credentials are sent without\n\
                 waiting for a challenge. IPv6 is not supported.",
                "now-dns.com",
                true,
                "",
            ),
            TemplateConfig {
                url: "https://now-dns.com/update?hostname={hostname}".into(),
                credentials: Some("now-dns.com".into()),
                ipv4_param: Some("myip".into()),
                success: words(&["good", "nochg"]),
                ..TemplateConfig::default()
            },
        )?,
        ServiceTemplate::new(
            "sync.afraid.org",
            "Updates on https://sync.afraid.org/u/{API-v2-token}/",
            "Updates a host on freedns.afraid.org with the randomized token of\n\
             the v2 API. Switch the host to v2 in the web interface and copy the\n\
             token from its update url https://sync.afraid.org/u/<token>/.\n\
             Works with ip-disabled. IPv6 is supported.\n\
             \n\
             Credentials (netrc), one line per host:\n    \
             machine <hostname>@sync.afraid.org password <token>",
            TemplateConfig {
                url: "https://sync.afraid.org/u/{password}/".into(),
                credentials: Some("{hostname}@sync.afraid.org".into()),
                auth: AuthScheme::Query,
                address_param: Some("address".into()),
                failure: words(&["Couldn't "]),
                ..TemplateConfig::default()
            },
        )?,
        ServiceTemplate::new(
            "system-ns.com",
            "Updates on https://system-ns.com",
            netrc_help(
                "Updates a host on system-ns.com using the API token from the\n\
                 account page. The host must exist in the web interface. Works\n\
                 with ip-disabled. IPv6 is not supported.",
                "system-ns.com",
                false,
                "",
            ),
            TemplateConfig {
                url: "https://system-ns.com/api\
                      ?type=dynamic&domain={hostname}&command=set&token={password}"
                    .into(),
                credentials: Some("system-ns.com".into()),
                auth: AuthScheme::Query,
                ipv4_param: Some("ip".into()),
                success: words(&[r#""code"\s*:\s*[012]\b"#]),
                reply_match: ReplyMatch::Regex,
                ..TemplateConfig::default()
            },
        )?,
    ];
    Ok(templates)
}

/// Look up one builtin template by name
pub fn builtin_template(name: &str) -> Result<Option<ServiceTemplate>> {
    Ok(builtin_templates()?.into_iter().find(|t| t.name() == name))
}
