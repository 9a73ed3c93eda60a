//! Hostname update
//!
//! Gives this machine its new name:
//!
//! 1. read the current hostname
//! 2. back up the hosts file to `<hosts>.bak.<stamp>` (never overwriting)
//! 3. detect the primary IPv4 address (route probe, then `hostname -I`)
//! 4. rewrite the hosts file (see [`hosts`]) and replace it atomically
//! 5. apply the FQDN with `hostnamectl set-hostname`, or `hostname` if that fails
//!
//! Every failure here is fatal; the backup is the only recovery path.

pub mod hosts;

pub use hosts::{HostsFileEntry, HostsRewrite, line_mentions, mapping_ip};

use anyhow::{Context, Result};
use regex::Regex;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use crate::config::{HostIdentity, HostMatchMode};
use crate::constants::ROUTE_PROBE_TARGET;
use crate::process::{CommandRunner, SystemCommand};
use crate::utils::{atomic_write, backup_file};

/// What the hostname step changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostnameChange {
    pub previous: String,
    pub fqdn: String,
    /// Address used in the mapping line
    pub mapped_ip: String,
    pub backup: PathBuf,
}

/// Rewrites the hosts file and applies the new hostname.
pub struct HostnameUpdater<'a, R> {
    runner: &'a R,
    hosts_file: &'a Path,
    mode: HostMatchMode,
    stamp: &'a str,
}

impl<'a, R: CommandRunner> HostnameUpdater<'a, R> {
    pub const fn new(runner: &'a R, hosts_file: &'a Path, mode: HostMatchMode, stamp: &'a str) -> Self {
        Self {
            runner,
            hosts_file,
            mode,
            stamp,
        }
    }

    /// Run the whole update.
    ///
    /// # Errors
    ///
    /// Fails if the hosts file cannot be read, backed up or replaced, or if
    /// neither `hostnamectl` nor `hostname` can set the new name.
    pub async fn update(&self, identity: &HostIdentity) -> Result<HostnameChange> {
        let fqdn = identity.fqdn();
        let previous = self.current_hostname().await;
        tracing::info!("Changing hostname from '{}' to '{}'", previous, fqdn);

        let original = std::fs::read_to_string(self.hosts_file)
            .with_context(|| format!("Failed to read {}", self.hosts_file.display()))?;
        let backup = backup_file(self.hosts_file, self.stamp)?;
        tracing::info!("Backed up {} to {}", self.hosts_file.display(), backup.display());

        let detected = self.detect_primary_ipv4().await;
        match detected {
            Some(ip) => tracing::info!("Primary IPv4 address: {}", ip),
            None => tracing::warn!("Could not detect a primary IPv4 address"),
        }
        let mapped_ip = mapping_ip(detected);

        let rewrite = HostsRewrite {
            old_hostname: &previous,
            fqdn: &fqdn,
            short_name: &identity.short_name,
            ip: &mapped_ip,
            mode: self.mode,
        };
        let updated = rewrite.apply(&original);
        atomic_write(self.hosts_file, updated.as_bytes())?;
        tracing::info!("Updated {}: {}", self.hosts_file.display(), rewrite.mapping_line());

        self.apply(&fqdn).await?;

        Ok(HostnameChange {
            previous,
            fqdn,
            mapped_ip,
            backup,
        })
    }

    /// Current hostname, or `""` if it cannot be determined.
    pub async fn current_hostname(&self) -> String {
        match self.runner.run(SystemCommand::new("hostname")).await {
            Ok(output) if output.success() => output.stdout.trim().to_string(),
            Ok(output) => {
                tracing::warn!("'hostname' failed: {}", output.stderr.trim());
                String::new()
            }
            Err(e) => {
                tracing::warn!("Could not read current hostname: {e:#}");
                String::new()
            }
        }
    }

    /// Primary outbound IPv4 address, best effort.
    pub async fn detect_primary_ipv4(&self) -> Option<Ipv4Addr> {
        let route = SystemCommand::new("ip").args(["-4", "route", "get", ROUTE_PROBE_TARGET]);
        if let Ok(output) = self.runner.run(route).await {
            if output.success() {
                if let Some(ip) = parse_route_src(&output.stdout) {
                    return Some(ip);
                }
            }
        }

        let addresses = SystemCommand::new("hostname").arg("-I");
        match self.runner.run(addresses).await {
            Ok(output) if output.success() => first_ipv4(&output.stdout),
            _ => None,
        }
    }

    async fn apply(&self, fqdn: &str) -> Result<()> {
        let hostnamectl = SystemCommand::new("hostnamectl").args(["set-hostname", fqdn]);
        let failure = match self.runner.run(hostnamectl).await {
            Ok(output) if output.success() => {
                tracing::info!("Hostname set to {} (hostnamectl)", fqdn);
                return Ok(());
            }
            Ok(output) => output.stderr.trim().to_string(),
            Err(e) => format!("{e:#}"),
        };
        tracing::warn!("hostnamectl failed ({}), falling back to 'hostname'", failure);

        let command = SystemCommand::new("hostname").arg(fqdn);
        let line = command.display_line();
        self.runner.run(command).await?.into_result(&line)?;
        tracing::info!("Hostname set to {} (hostname)", fqdn);
        Ok(())
    }
}

/// Source address from `ip -4 route get` output.
fn parse_route_src(output: &str) -> Option<Ipv4Addr> {
    let re = Regex::new(r"\bsrc\s+(\d{1,3}(?:\.\d{1,3}){3})\b").ok()?;
    re.captures(output)?.get(1)?.as_str().parse().ok()
}

/// First IPv4 address in `hostname -I` output.
fn first_ipv4(output: &str) -> Option<Ipv4Addr> {
    output.split_whitespace().find_map(|token| token.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_route_src() {
        let out = "1.1.1.1 via 192.168.1.1 dev eth0 src 192.168.1.42 uid 0 \n    cache \n";
        assert_eq!(parse_route_src(out), Some(Ipv4Addr::new(192, 168, 1, 42)));
        assert_eq!(parse_route_src("unreachable"), None);
        assert_eq!(parse_route_src("1.1.1.1 dev eth0 src 999.1.1.1"), None);
    }

    #[test]
    fn test_first_ipv4_skips_ipv6() {
        assert_eq!(first_ipv4("fe80::1 10.0.0.4 10.0.0.5\n"), Some(Ipv4Addr::new(10, 0, 0, 4)));
        assert_eq!(first_ipv4(""), None);
    }

    use crate::process::CommandOutput;
    use crate::test_utils::{RecordingRunner, TestHost};

    #[tokio::test]
    async fn test_update_without_detected_ip_maps_fallback() {
        let host = TestHost::new().unwrap();
        let runner = RecordingRunner::new()
            .respond("hostname -I", CommandOutput::ok("\n"))
            .respond("ip -4 route", CommandOutput::failed(2, "RTNETLINK answers: Network is unreachable"))
            .respond_once("hostname", CommandOutput::ok("oldbox\n"));
        let identity = HostIdentity::new("zion", "").unwrap();

        let updater = HostnameUpdater::new(&runner, host.hosts_file(), HostMatchMode::Token, "20261018_090000");
        let change = updater.update(&identity).await.unwrap();

        assert_eq!(change.fqdn, "zion");
        assert_eq!(change.previous, "oldbox");
        assert_eq!(change.mapped_ip, "127.0.1.1");
        assert_eq!(
            host.hosts_content().unwrap(),
            "127.0.0.1 localhost\n10.0.0.5 oldboxdb\n127.0.1.1 zion zion\n"
        );
        assert_eq!(std::fs::read_to_string(&change.backup).unwrap(), crate::test_utils::DEFAULT_HOSTS);
        assert_eq!(runner.count("hostnamectl set-hostname zion"), 1);
    }

    #[tokio::test]
    async fn test_update_uses_route_source_and_falls_back_to_hostname() {
        let host = TestHost::new().unwrap();
        let runner = RecordingRunner::new()
            .respond("ip -4 route", CommandOutput::ok("1.1.1.1 via 10.0.0.1 dev ens3 src 10.0.0.7 uid 0\n"))
            .fail_to_spawn("hostnamectl")
            .respond_once("hostname", CommandOutput::ok("oldbox\n"));
        let identity = HostIdentity::new("erp01", "corp.local").unwrap();

        let updater = HostnameUpdater::new(&runner, host.hosts_file(), HostMatchMode::Token, "s");
        updater.update(&identity).await.unwrap();

        assert!(host.hosts_content().unwrap().contains("10.0.0.7 erp01.corp.local erp01\n"));
        assert_eq!(runner.count("hostname -I"), 0);
        assert_eq!(runner.lines().last().map(String::as_str), Some("hostname erp01.corp.local"));
    }

    #[tokio::test]
    async fn test_update_fails_when_hostname_cannot_be_applied() {
        let host = TestHost::new().unwrap();
        let runner = RecordingRunner::new()
            .respond("hostnamectl", CommandOutput::failed(1, "denied"))
            .respond("hostname zion", CommandOutput::failed(1, "denied"));
        let identity = HostIdentity::new("zion", "").unwrap();

        let updater = HostnameUpdater::new(&runner, host.hosts_file(), HostMatchMode::Token, "s");
        assert!(updater.update(&identity).await.is_err());
        assert_eq!(host.hosts_backups().unwrap().len(), 1);
    }
}
