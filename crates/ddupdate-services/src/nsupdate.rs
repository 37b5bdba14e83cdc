//! `nsupdate`: dynamic updates (RFC 2136) through nsupdate(1)

use async_trait::async_trait;
use ddupdate_core::{
    Error, IpAddress, Plugin, PluginOptions, Result, ServiceContext, ServicePlugin,
};
use std::fmt::Write as _;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Time limit for one nsupdate run
pub const NSUPDATE_TIMEOUT: Duration = Duration::from_secs(30);

/// TTL of the records written
const RECORD_TTL: u32 = 60;

const HELP: &str = "\
Updates the A and AAAA records of the host on a DNS server accepting
dynamic updates, using nsupdate(1). Existing records of the updated
families are replaced. An address is required, ip-disabled cannot be
used.

Options (see nsupdate(1)):
    server=<host>   Server to send the update to, required
    zone=<zone>     Zone to update, default lets nsupdate find it
    key=<file>      TSIG key file, passed as -k";

/// Service plugin driving nsupdate(1)
#[derive(Debug, Clone)]
pub struct NsupdateService {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl NsupdateService {
    pub fn new() -> Self {
        Self::with_program("nsupdate", &[])
    }

    /// Run `program args..` instead of `nsupdate`
    pub fn with_program(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            timeout: NSUPDATE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::registration(self.name(), message)
    }

    async fn run(&self, key: Option<&str>, script: &str) -> Result<()> {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(key) = key {
            command.arg("-k").arg(key);
        }
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.error(format!("Cannot run {}: {}", self.program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(script.as_bytes())
                .await
                .map_err(|e| self.error(format!("Cannot write to {}: {}", self.program, e)))?;
        }

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                self.error(format!(
                    "{} timed out after {} s",
                    self.program,
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| self.error(format!("{} failed: {}", self.program, e)))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() || !stderr.trim().is_empty() {
            return Err(self.error(format!(
                "Bad update reply ({}): {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

impl Default for NsupdateService {
    fn default() -> Self {
        Self::new()
    }
}

/// nsupdate input replacing the records of `hostname` with `address`
pub fn nsupdate_script(
    hostname: &str,
    address: &IpAddress,
    server: &str,
    zone: Option<&str>,
) -> String {
    let mut script = format!("server {server}\n");
    if let Some(zone) = zone {
        let _ = writeln!(script, "zone {zone}");
    }
    if let Some(v4) = address.v4 {
        let _ = writeln!(script, "update delete {hostname} A");
        let _ = writeln!(script, "update add {hostname} {RECORD_TTL} A {v4}");
    }
    if let Some(v6) = address.v6 {
        let _ = writeln!(script, "update delete {hostname} AAAA");
        let _ = writeln!(script, "update add {hostname} {RECORD_TTL} AAAA {v6}");
    }
    script.push_str("send\n");
    script
}

impl Plugin for NsupdateService {
    fn name(&self) -> &str {
        "nsupdate"
    }

    fn oneliner(&self) -> &str {
        "Update address via nsupdate"
    }

    fn help(&self) -> &str {
        HELP
    }
}

#[async_trait]
impl ServicePlugin for NsupdateService {
    async fn register(
        &self,
        _ctx: &ServiceContext,
        hostname: &str,
        address: Option<&IpAddress>,
        options: &PluginOptions,
    ) -> Result<()> {
        let server = options.require("server")?;
        let address =
            address.ok_or_else(|| self.error("An address is required, ip-disabled cannot be used"))?;

        let script = nsupdate_script(hostname, address, server, options.get("zone"));
        debug!("nsupdate input:\n{}", script);
        self.run(options.get("key"), &script).await
    }
}
