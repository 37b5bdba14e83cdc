// # ddupdate - Dynamic DNS Updater
//
// One shot command: find the current address, and when it differs from the
// cached one (or the cache is stale) register it with a dynamic DNS service.
// Meant to be run by a timer or a network hook.
//
// The binary is a thin layer over ddupdate-core:
// 1. Parse the command line and the TOML config file
// 2. Set up logging
// 3. Discover plugins (builtin, then definition file directories)
// 4. Run every configured section through the update engine
//
// ## Configuration
//
// `--config-file`, else `$XDG_CONFIG_HOME/ddupdate.toml`, else
// `/etc/ddupdate.toml`. Command line options override the file.
//
// ## Example
//
// ```bash
// ddupdate -H myhost.duckdns.org -s duckdns.org -a default-web-ip
// ddupdate --set-credentials duckdns.org
// ddupdate --list-services
// ```

mod definitions;

use anyhow::{Context, Result};
use clap::Parser;
use clap::builder::PossibleValuesParser;
use ddupdate_core::config::{config_file_candidates, plugin_dirs};
use ddupdate_core::registry::{BuiltinSource, DefinitionLoader, DirectorySource, PluginSource};
use ddupdate_core::{
    Capability, ConfigFile, Credentials, Error, FileAddressCache, IpVersion, PluginRegistry,
    RunReport, Settings, UpdateEngine,
};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, reload, util::SubscriberInitExt};

use crate::definitions::PluginDefinitionLoader;

/// Exit codes
///
/// - 0: Success, nothing to do, or an informational command
/// - 1: Configuration error or failed registration
/// - 2: Unknown plugin selected
/// - 3: No address could be obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DdupdateExitCode {
    Success = 0,
    Failure = 1,
    UnknownPlugin = 2,
    AddressError = 3,
}

impl From<DdupdateExitCode> for ExitCode {
    fn from(code: DdupdateExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

#[derive(Debug, Parser)]
#[command(name = "ddupdate")]
#[command(about = "Tool to update DNS data for dynamic ip addresses")]
#[command(version)]
struct Cli {
    /// Hostname to update [host.nowhere.net]
    #[arg(short = 'H', long, value_name = "host")]
    hostname: Option<String>,

    /// Plugin updating a dns hostname address [dry-run]
    #[arg(short = 's', long, value_name = "plugin")]
    service_plugin: Option<String>,

    /// Plugin providing ip address to use [default-if]
    #[arg(short = 'a', long, value_name = "plugin")]
    address_plugin: Option<String>,

    /// Plugin storing credentials [netrc]
    #[arg(short = 'A', long, value_name = "plugin")]
    auth_plugin: Option<String>,

    /// Config file with default values for all options
    #[arg(short = 'c', long, value_name = "path")]
    config_file: Option<PathBuf>,

    /// Amount of printed diagnostics [info]
    #[arg(
        short = 'l',
        long,
        value_name = "level",
        value_parser = PossibleValuesParser::new(["error", "warning", "info", "debug"])
    )]
    loglevel: Option<String>,

    /// Ip address version(s) to register (v6, v4, all) [v4]
    #[arg(short = 'v', long, value_name = "version", value_parser = parse_ip_version)]
    ip_version: Option<IpVersion>,

    /// Service plugin option (enter multiple times if required)
    #[arg(short = 'o', long = "service-option", value_name = "plugin option")]
    service_options: Vec<String>,

    /// Address plugin option (enter multiple times if required)
    #[arg(short = 'O', long = "address-option", value_name = "plugin option")]
    address_options: Vec<String>,

    /// Force run even if the cache is fresh
    #[arg(short = 'f', long)]
    force: bool,

    /// Only run the named config file section (enter multiple times if required)
    #[arg(short = 'e', long = "execute-section", value_name = "section")]
    sections: Vec<String>,

    /// Directory holding the address cache [~/.cache/ddupdate]
    #[arg(long, value_name = "dir")]
    ip_cache: Option<PathBuf>,

    /// List service provider plugins
    #[arg(long)]
    list_services: bool,

    /// List plugins providing ip address
    #[arg(long)]
    list_addressers: bool,

    /// List credential store plugins
    #[arg(long)]
    list_auth: bool,

    /// Print help for given plugin
    #[arg(long, value_name = "plugin")]
    help_plugin: Option<String>,

    /// Prompt for and store credentials for a machine, e.g. duckdns.org
    #[arg(long, value_name = "machine")]
    set_credentials: Option<String>,
}

fn parse_ip_version(value: &str) -> std::result::Result<IpVersion, String> {
    value.parse().map_err(|e: Error| e.to_string())
}

// Options given as one quoted argument are split like config file values.
fn option_tokens(values: &[String]) -> Option<Vec<String>> {
    if values.is_empty() {
        return None;
    }
    Some(
        values
            .iter()
            .flat_map(|v| v.split_whitespace())
            .map(str::to_string)
            .collect(),
    )
}

impl Cli {
    /// Settings layer formed by the command line
    fn overrides(&self) -> Settings {
        Settings {
            name: None,
            hostname: self.hostname.clone(),
            address_plugin: self.address_plugin.clone(),
            service_plugin: self.service_plugin.clone(),
            auth_plugin: self.auth_plugin.clone(),
            loglevel: self.loglevel.clone(),
            ip_version: self.ip_version,
            address_options: option_tokens(&self.address_options),
            service_options: option_tokens(&self.service_options),
            ip_cache: self.ip_cache.clone(),
            force: self.force.then_some(true),
        }
    }

    fn config_candidates(&self) -> Vec<PathBuf> {
        match &self.config_file {
            Some(path) => vec![path.clone()],
            None => config_file_candidates(),
        }
    }
}

type LogHandle = reload::Handle<EnvFilter, Registry>;

/// `RUST_LOG` wins over the configured level
fn log_filter(level: &str) -> EnvFilter {
    let directive = match level.to_ascii_lowercase().as_str() {
        "warning" => "warn".to_string(),
        other => other.to_string(),
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive))
}

fn init_logging(level: &str) -> Result<LogHandle> {
    let (filter, handle) = reload::Layer::new(log_filter(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .context("Failed to set tracing subscriber")?;
    Ok(handle)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let overrides = cli.overrides();

    // The config file may change the level, start with what the command line says
    let log_handle = match init_logging(cli.loglevel.as_deref().unwrap_or("info")) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Fatal error: {e:#}");
            return DdupdateExitCode::Failure.into();
        }
    };

    let (config, config_path) = ConfigFile::load_first(&cli.config_candidates());
    let loglevel = config.loglevel(&overrides);
    if let Err(e) = log_handle.reload(log_filter(&loglevel)) {
        warn!("Cannot apply loglevel {}: {}", loglevel, e);
    }
    match &config_path {
        Some(path) => debug!("Using config file: {}", path.display()),
        None => debug!("Using builtin defaults"),
    }

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdupdateExitCode::Failure.into();
        }
    };

    let code = rt.block_on(async {
        match run(&cli, &config, &overrides).await {
            Ok(code) => code,
            Err(e) => {
                error!("{:#}", e);
                exit_code_for(&e)
            }
        }
    });
    code.into()
}

/// Plugin search path, highest precedence first
fn plugin_sources() -> Vec<Box<dyn PluginSource>> {
    let mut builtin = BuiltinSource::new();
    ddupdate_address_local::register(&mut builtin);
    ddupdate_address_http::register(&mut builtin);
    ddupdate_services::register(&mut builtin);
    ddupdate_service_cloudflare::register(&mut builtin);
    ddupdate_auth::register(&mut builtin);

    let loader: Arc<dyn DefinitionLoader> = Arc::new(PluginDefinitionLoader);
    let mut sources: Vec<Box<dyn PluginSource>> = vec![Box::new(builtin)];
    for dir in plugin_dirs() {
        sources.push(Box::new(DirectorySource::new(dir, loader.clone())));
    }
    sources
}

fn list_plugins(registry: &PluginRegistry, capability: Capability) {
    for plugin in registry.list(capability) {
        println!("{:<20} {}", plugin.name, plugin.oneliner);
    }
}

async fn run(cli: &Cli, config: &ConfigFile, overrides: &Settings) -> Result<DdupdateExitCode> {
    let registry = Arc::new(PluginRegistry::discover(&plugin_sources()));

    let listing = [
        (cli.list_services, Capability::Service),
        (cli.list_addressers, Capability::Address),
        (cli.list_auth, Capability::Auth),
    ];
    if let Some((_, capability)) = listing.iter().find(|(wanted, _)| *wanted) {
        list_plugins(&registry, *capability);
        return Ok(DdupdateExitCode::Success);
    }

    if let Some(name) = &cli.help_plugin {
        let plugin = registry
            .help(name)
            .ok_or_else(|| Error::config(format!("No help found (no such plugin?): {name}")))?;
        println!("Name: {}", plugin.name);
        println!("Source: {}\n", plugin.origin);
        println!("{}", plugin.help);
        return Ok(DdupdateExitCode::Success);
    }

    // Credential store and cache are shared by all sections
    let global = Settings::defaults()
        .overlay(&config.update)
        .overlay(overrides)
        .into_section()?;
    let credentials = Credentials::new(registry.auth(&global.auth_plugin)?);

    if let Some(machine) = &cli.set_credentials {
        set_credentials(&credentials, machine).await?;
        return Ok(DdupdateExitCode::Success);
    }

    let sections = config.resolve(overrides, &cli.sections)?;
    for section in &sections {
        if section.auth_plugin != global.auth_plugin || section.ip_cache != global.ip_cache {
            warn!(
                "Section {}: auth-plugin and ip-cache apply to all sections, using {} and {}",
                section.name,
                global.auth_plugin,
                global.ip_cache.display()
            );
        }
        info!(
            "Section {}: hostname {}, address plugin {}, service plugin {}",
            section.name, section.hostname, section.address_plugin, section.service_plugin
        );
        debug!(
            "Section {}: service options [{}], address options [{}]",
            section.name, section.service_options, section.address_options
        );
    }

    let cache = Arc::new(FileAddressCache::new(&global.ip_cache));
    let engine = UpdateEngine::new(registry, cache, credentials);
    let report = engine.run(&sections).await?;
    info!(
        "{} of {} section(s) updated",
        report.updated(),
        report.sections.len()
    );
    Ok(exit_code_for_report(&report))
}

async fn set_credentials(credentials: &Credentials, machine: &str) -> Result<()> {
    print!("Username (empty for an API key): ");
    std::io::stdout().flush()?;
    let mut username = String::new();
    std::io::stdin().read_line(&mut username)?;
    let username = username.trim();

    let password = rpassword::prompt_password("Password: ")?;
    if password.is_empty() {
        anyhow::bail!("Empty password, nothing stored");
    }

    credentials
        .set(machine, (!username.is_empty()).then_some(username), &password)
        .await
        .with_context(|| format!("Cannot store credentials for {machine}"))?;
    println!(
        "Credentials stored for {} ({})",
        machine,
        credentials.store_name()
    );
    Ok(())
}

fn exit_code_for(err: &anyhow::Error) -> DdupdateExitCode {
    match err.downcast_ref::<Error>() {
        Some(Error::UnknownPlugin { .. }) => DdupdateExitCode::UnknownPlugin,
        Some(Error::AddressResolution(_)) => DdupdateExitCode::AddressError,
        _ => DdupdateExitCode::Failure,
    }
}

/// Address failures outrank registration failures. Bad plugin options are
/// configuration failures and never map to the address exit code.
fn exit_code_for_report(report: &RunReport) -> DdupdateExitCode {
    let mut code = DdupdateExitCode::Success;
    for err in report.errors() {
        match err {
            Error::AddressResolution(_) => return DdupdateExitCode::AddressError,
            _ => code = DdupdateExitCode::Failure,
        }
    }
    code
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddupdate_core::{SectionOutcome, SectionReport};

    #[test]
    fn command_line_overrides_only_given_values() {
        let cli = Cli::parse_from([
            "ddupdate",
            "-H",
            "home.example.net",
            "-s",
            "duckdns.org",
            "-v",
            "all",
            "-O",
            "if=eth0",
            "-o",
            "zone=example.net zone_id=abc",
            "-f",
        ]);
        let overrides = cli.overrides();
        assert_eq!(overrides.hostname.as_deref(), Some("home.example.net"));
        assert_eq!(overrides.service_plugin.as_deref(), Some("duckdns.org"));
        assert_eq!(overrides.address_plugin, None);
        assert_eq!(overrides.ip_version, Some(IpVersion::All));
        assert_eq!(overrides.address_options, Some(vec!["if=eth0".to_string()]));
        assert_eq!(
            overrides.service_options,
            Some(vec!["zone=example.net".to_string(), "zone_id=abc".to_string()])
        );
        assert_eq!(overrides.force, Some(true));

        let bare = Cli::parse_from(["ddupdate"]).overrides();
        assert_eq!(bare, Settings::default());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(Cli::try_parse_from(["ddupdate", "-v", "v5"]).is_err());
        assert!(Cli::try_parse_from(["ddupdate", "-l", "chatty"]).is_err());
    }

    #[test]
    fn command_line_beats_config_file() {
        let config = ConfigFile::parse(
            "[update]\nhostname = \"file.example.net\"\nservice-plugin = \"dynv6.com\"\nloglevel = \"debug\"\n",
        )
        .unwrap();
        let cli = Cli::parse_from(["ddupdate", "-H", "cli.example.net", "-l", "warning"]);
        let sections = config.resolve(&cli.overrides(), &[]).unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].hostname, "cli.example.net");
        assert_eq!(sections[0].service_plugin, "dynv6.com");
        assert_eq!(config.loglevel(&cli.overrides()), "warning");
    }

    #[test]
    fn builtin_plugins_are_discovered() {
        let mut builtin = BuiltinSource::new();
        ddupdate_address_local::register(&mut builtin);
        ddupdate_address_http::register(&mut builtin);
        ddupdate_services::register(&mut builtin);
        ddupdate_service_cloudflare::register(&mut builtin);
        ddupdate_auth::register(&mut builtin);
        let registry = PluginRegistry::discover(&[Box::new(builtin) as Box<dyn PluginSource>]);

        for name in ["default-if", "hardcoded-ip", "default-web-ip", "ip.dnshome.de", "onhub"] {
            assert!(registry.has(Capability::Address, name), "{name}");
        }
        for name in ["dry-run", "duckdns.org", "cloudflare.com", "dy.fi", "nsupdate", "dynu.com"] {
            assert!(registry.has(Capability::Service, name), "{name}");
        }
        assert!(registry.has(Capability::Auth, "netrc"));
        assert!(registry.has(Capability::Auth, "secrets-file"));
        assert!(registry.conflicts().is_empty());
    }

    fn report(results: Vec<ddupdate_core::Result<SectionOutcome>>) -> RunReport {
        RunReport {
            sections: results
                .into_iter()
                .enumerate()
                .map(|(i, result)| SectionReport {
                    section: format!("s{i}"),
                    service: "dry-run".into(),
                    result,
                })
                .collect(),
        }
    }

    #[test]
    fn exit_codes() {
        let ok = || Ok(SectionOutcome::Updated { address: None });
        assert_eq!(
            exit_code_for_report(&report(vec![ok()])),
            DdupdateExitCode::Success
        );
        assert_eq!(
            exit_code_for_report(&report(vec![
                Err(Error::registration("dry-run", "refused")),
                ok()
            ])),
            DdupdateExitCode::Failure
        );
        assert_eq!(
            exit_code_for_report(&report(vec![
                Err(Error::registration("dry-run", "refused")),
                Err(Error::address("no route")),
            ])),
            DdupdateExitCode::AddressError
        );
        assert_eq!(
            exit_code_for_report(&report(vec![Err(Error::invalid_option(
                "Required option if=<value> missing"
            ))])),
            DdupdateExitCode::Failure
        );
        assert_eq!(
            exit_code_for(&anyhow::Error::from(Error::config("bad section"))),
            DdupdateExitCode::Failure
        );

        let unknown = anyhow::Error::from(Error::unknown_plugin(Capability::Service, "nope"))
            .context("Preparing sections");
        assert_eq!(exit_code_for(&unknown), DdupdateExitCode::UnknownPlugin);
        assert_eq!(
            exit_code_for(&anyhow::anyhow!("anything else")),
            DdupdateExitCode::Failure
        );
    }
}
