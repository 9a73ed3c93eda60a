//! Hosts-file model and rewrite.
//!
//! The rewrite keeps every original line that mentions neither the previous
//! hostname nor the new FQDN, appends one mapping line for the new name and
//! makes sure exactly one `127.0.0.1 localhost` line remains.

use std::net::Ipv4Addr;

use crate::config::HostMatchMode;
use crate::constants::{FALLBACK_HOST_IP, LOOPBACK_IP};

/// One mapping line of a hosts file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostsFileEntry {
    pub ip_address: String,
    pub canonical_name: String,
    pub aliases: Vec<String>,
}

impl HostsFileEntry {
    /// Parse a line. Blank lines, comments and lines without a name yield `None`.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let content = line.split('#').next().unwrap_or_default();
        let mut fields = content.split_whitespace();
        let ip_address = fields.next()?.to_string();
        let canonical_name = fields.next()?.to_string();
        Some(Self {
            ip_address,
            canonical_name,
            aliases: fields.map(ToString::to_string).collect(),
        })
    }

    /// Canonical name followed by the aliases.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.canonical_name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    /// True for a `127.0.0.1 ... localhost ...` entry.
    #[must_use]
    pub fn is_localhost(&self) -> bool {
        self.ip_address == LOOPBACK_IP && self.names().any(|n| n == "localhost")
    }
}

impl std::fmt::Display for HostsFileEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.ip_address, self.canonical_name)?;
        for alias in &self.aliases {
            write!(f, " {alias}")?;
        }
        Ok(())
    }
}

/// Address for the new mapping line: the detected address, or `127.0.1.1`
/// when none was found or it is `127.0.0.1`.
#[must_use]
pub fn mapping_ip(detected: Option<Ipv4Addr>) -> String {
    match detected {
        Some(ip) if ip != Ipv4Addr::LOCALHOST => ip.to_string(),
        _ => FALLBACK_HOST_IP.to_string(),
    }
}

/// True if `line` refers to `name`.
///
/// [`HostMatchMode::Token`] compares whole hostname fields (ignoring ASCII
/// case and comments); [`HostMatchMode::Substring`] matches anywhere in the
/// raw line. An empty name never matches.
#[must_use]
pub fn line_mentions(line: &str, name: &str, mode: HostMatchMode) -> bool {
    if name.is_empty() {
        return false;
    }
    match mode {
        HostMatchMode::Substring => line.contains(name),
        HostMatchMode::Token => HostsFileEntry::parse(line)
            .is_some_and(|entry| entry.names().any(|n| n.eq_ignore_ascii_case(name))),
    }
}

/// Inputs of a hosts-file rewrite.
#[derive(Debug, Clone, Copy)]
pub struct HostsRewrite<'a> {
    /// Hostname before the change; may be empty
    pub old_hostname: &'a str,
    pub fqdn: &'a str,
    pub short_name: &'a str,
    /// Address for the mapping line, see [`mapping_ip`]
    pub ip: &'a str,
    pub mode: HostMatchMode,
}

impl HostsRewrite<'_> {
    /// The line mapping the new name.
    #[must_use]
    pub fn mapping_line(&self) -> String {
        format!("{} {} {}", self.ip, self.fqdn, self.short_name)
    }

    /// Produce the new hosts-file content from `original`.
    ///
    /// Lines are kept byte for byte unless they mention the old hostname or
    /// the new FQDN. Only the first `127.0.0.1 localhost` entry is kept; one
    /// is appended if none survives.
    #[must_use]
    pub fn apply(&self, original: &str) -> String {
        let mut out = String::with_capacity(original.len() + 64);
        let mut has_localhost = false;

        for line in original.lines() {
            if line_mentions(line, self.old_hostname, self.mode)
                || line_mentions(line, self.fqdn, self.mode)
            {
                tracing::debug!("Dropping hosts entry: {}", line);
                continue;
            }
            if HostsFileEntry::parse(line).is_some_and(|e| e.is_localhost()) {
                if has_localhost {
                    tracing::debug!("Dropping duplicate localhost entry: {}", line);
                    continue;
                }
                has_localhost = true;
            }
            out.push_str(line);
            out.push('\n');
        }

        out.push_str(&self.mapping_line());
        out.push('\n');
        if !has_localhost {
            out.push_str(LOOPBACK_IP);
            out.push_str(" localhost\n");
        }
        out
    }
}
