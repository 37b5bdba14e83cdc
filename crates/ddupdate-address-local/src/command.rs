//! Running external commands with a time limit

use async_trait::async_trait;
use ddupdate_core::{AddressPlugin, Error, IpAddress, Plugin, PluginOptions, Result};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Time limit for one external command
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Run `program args..` and return its stdout.
///
/// A non-zero exit, a spawn failure or a timeout is an address resolution
/// error. The child is killed when the timeout hits.
pub async fn run_command(program: &str, args: &[&str], timeout: Duration) -> Result<String> {
    debug!("Running {} {}", program, args.join(" "));
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    let output = tokio::time::timeout(timeout, child)
        .await
        .map_err(|_| {
            Error::address(format!(
                "{} timed out after {} s",
                program,
                timeout.as_secs()
            ))
        })?
        .map_err(|e| Error::address(format!("Cannot run {program}: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::address(format!(
            "{} failed ({}): {}",
            program,
            output.status,
            stderr.trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Run a shell command line through `sh -c`
pub async fn run_shell(command: &str, timeout: Duration) -> Result<String> {
    run_command("sh", &["-c", command], timeout).await
}

const HELP: &str = "\
Runs the command given by the cmd= option through sh -c. The command
should print one IPv4 address, one IPv6 address, or one of each,
separated by whitespace. Printing nothing lets the update service use the
address the request comes from. Anything else is an error.

Options:
    cmd=<command>   Command line to run, required";

/// `ip-from-command`: address words printed by a shell command
#[derive(Debug, Clone)]
pub struct CommandAddressPlugin {
    name: String,
    oneliner: String,
    help: String,
    command: Option<String>,
    timeout: Duration,
}

impl CommandAddressPlugin {
    /// The builtin plugin, taking its command from the `cmd=` option
    pub fn new() -> Self {
        Self {
            name: "ip-from-command".to_string(),
            oneliner: "Obtain address from a command".to_string(),
            help: HELP.to_string(),
            command: None,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// A named plugin with a fixed command, as used by definition files
    pub fn with_command(
        name: impl Into<String>,
        oneliner: impl Into<String>,
        help: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            oneliner: oneliner.into(),
            help: help.into(),
            command: Some(command.into()),
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for CommandAddressPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for CommandAddressPlugin {
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
impl AddressPlugin for CommandAddressPlugin {
    async fn get_ip(&self, options: &PluginOptions) -> Result<IpAddress> {
        let command = match &self.command {
            Some(command) => command.as_str(),
            None => options.require("cmd")?,
        };
        let output = run_shell(command, self.timeout).await?;
        let address = IpAddress::from_words(&output)?;
        if address.is_empty() {
            debug!("No address printed by {}, leaving it to the service", command);
        }
        Ok(address)
    }
}
