//! `dry-run`: print what would be registered

use async_trait::async_trait;
use ddupdate_core::{IpAddress, Plugin, PluginOptions, Result, ServiceContext, ServicePlugin};
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Service plugin that only prints the update it would make
///
/// Output goes to stdout unless a capture buffer is set.
#[derive(Debug, Clone, Default)]
pub struct DryRunService {
    capture: Option<Arc<Mutex<Vec<u8>>>>,
}

impl DryRunService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write the report into `buffer` instead of stdout
    pub fn capturing(buffer: Arc<Mutex<Vec<u8>>>) -> Self {
        Self {
            capture: Some(buffer),
        }
    }
}

/// Report printed for one update
pub fn dry_run_report(hostname: &str, address: Option<&IpAddress>) -> String {
    let show = |value: Option<String>| value.unwrap_or_else(|| "None".to_string());
    format!(
        "dry-run: Using\n    v4 address: {}\n    v6 address: {}\n    hostname: {}\n",
        show(address.and_then(|a| a.v4).map(|a| a.to_string())),
        show(address.and_then(|a| a.v6).map(|a| a.to_string())),
        hostname
    )
}

impl Plugin for DryRunService {
    fn name(&self) -> &str {
        "dry-run"
    }

    fn oneliner(&self) -> &str {
        "Debug dummy update plugin"
    }

    fn help(&self) -> &str {
        "\
Prints the address obtained and the hostname to update. Makes no
request and never fails. Its cache entry expires after one minute, so
consecutive runs print again."
    }
}

#[async_trait]
impl ServicePlugin for DryRunService {
    fn cache_ttl_minutes(&self) -> u64 {
        1
    }

    async fn register(
        &self,
        _ctx: &ServiceContext,
        hostname: &str,
        address: Option<&IpAddress>,
        _options: &PluginOptions,
    ) -> Result<()> {
        let report = dry_run_report(hostname, address);
        match &self.capture {
            Some(buffer) => {
                if let Ok(mut buffer) = buffer.lock() {
                    buffer.extend_from_slice(report.as_bytes());
                }
            }
            None => {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(report.as_bytes())?;
                stdout.flush()?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddupdate_core::{Credentials, MemoryCredentialStore};
    use std::net::Ipv4Addr;

    #[tokio::test]
    async fn prints_both_families_and_hostname() {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let service = DryRunService::capturing(buffer.clone());
        let ctx = ServiceContext::new(Credentials::new(Arc::new(MemoryCredentialStore::new())));
        let address = IpAddress::from_v4(Ipv4Addr::new(192, 0, 2, 5));

        service
            .register(&ctx, "host.example.com", Some(&address), &PluginOptions::new())
            .await
            .unwrap();

        let text = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(text.contains("v4 address: 192.0.2.5"));
        assert!(text.contains("v6 address: None"));
        assert!(text.contains("hostname: host.example.com"));
        assert_eq!(service.cache_ttl_minutes(), 1);
    }
}
