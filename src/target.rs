//! Provides the scan targets: parsing of `address:port` entries, list file
//! reading and the lazy expansion of entries and virtual hosts.
use std::fmt;
use std::path::Path;

use tokio::fs::File;
use tokio::io::{self, AsyncBufReadExt, BufReader};

/// The scheme a target is probed with, picked from its port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// Port 80.
    Http,
    /// Port 443, certificates are not verified.
    Https,
}

impl Scheme {
    /// Only the literal ports "80" and "443" map to a scheme.
    pub fn from_port(port: &str) -> Result<Self, UnsupportedPort> {
        match port {
            "80" => Ok(Self::Http),
            "443" => Ok(Self::Https),
            other => Err(UnsupportedPort(other.to_owned())),
        }
    }

    /// The URL scheme prefix, without `://`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

/// Returned when a target's port does not select a scheme.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported port {0:?}: only 80 (http) and 443 (https) can be probed")]
pub struct UnsupportedPort(pub String);

/// One unit of scan work.
///
/// `virtual_host` is sent as the `Host` header, independently of the
/// address the connection is made to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// IP address or name the connection is made to.
    pub address: String,
    /// Port as written in the entry, only "80" and "443" are probed.
    pub port: String,
    /// Value of the `Host` header.
    pub virtual_host: String,
}

impl Target {
    /// Builds a target from borrowed parts.
    pub fn new(address: &str, port: &str, virtual_host: &str) -> Self {
        Self {
            address: address.to_owned(),
            port: port.to_owned(),
            virtual_host: virtual_host.to_owned(),
        }
    }

    /// A target whose `Host` header is its own address.
    pub fn bare(address: String, port: String) -> Self {
        Self {
            virtual_host: address.clone(),
            address,
            port,
        }
    }

    /// Splits an `address:port` entry.
    ///
    /// Anything that is not exactly two `:`-separated fields is rejected,
    /// which also rules out bare IPv6 literals.
    ///
    /// ```rust
    /// # use webscan::target::Target;
    /// assert_eq!(
    ///     Target::split_entry("203.0.113.1:443"),
    ///     Some(("203.0.113.1".to_owned(), "443".to_owned()))
    /// );
    /// assert_eq!(Target::split_entry("203.0.113.1"), None);
    /// ```
    pub fn split_entry(entry: &str) -> Option<(String, String)> {
        let mut fields = entry.split(':');
        match (fields.next(), fields.next(), fields.next()) {
            (Some(address), Some(port), None) => Some((address.to_owned(), port.to_owned())),
            _ => None,
        }
    }

    /// Builds the request URL, `http://address` or `https://address`.
    pub fn url(&self) -> Result<String, UnsupportedPort> {
        let scheme = Scheme::from_port(&self.port)?;
        Ok(format!("{}://{}", scheme.as_str(), self.address))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ({})", self.address, self.port, self.virtual_host)
    }
}

/// Lazily expands `address:port` entries and a host list into targets.
///
/// For every valid entry, one target per host is yielded (in host order),
/// followed by one bare target whose virtual host is the address itself.
/// The bare target is always yielded when the host list is empty; with
/// hosts present it can be switched off.
#[derive(Debug)]
pub struct TargetIterator {
    entries: std::vec::IntoIter<String>,
    hosts: Box<[String]>,
    bare_address: bool,
    current: Option<(String, String)>,
    next_host: usize,
}

impl TargetIterator {
    /// `entries` are raw list lines, malformed ones are skipped while
    /// iterating. `bare_address` only matters when `hosts` is not empty.
    pub fn new(entries: Vec<String>, hosts: Vec<String>, bare_address: bool) -> Self {
        Self {
            entries: entries.into_iter(),
            hosts: hosts.into(),
            bare_address,
            current: None,
            next_host: 0,
        }
    }

    /// Number of targets produced by each valid entry.
    pub fn per_entry(&self) -> usize {
        if self.hosts.is_empty() {
            1
        } else {
            self.hosts.len() + usize::from(self.bare_address)
        }
    }

    /// Number of targets still to be yielded by entries not yet started.
    pub fn total(&self) -> usize {
        self.entries
            .as_slice()
            .iter()
            .filter(|entry| Target::split_entry(entry).is_some())
            .count()
            * self.per_entry()
    }
}

impl Iterator for TargetIterator {
    type Item = Target;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((address, port)) = self.current.take() {
                if let Some(host) = self.hosts.get(self.next_host) {
                    self.next_host += 1;
                    let target = Target::new(&address, &port, host);
                    self.current = Some((address, port));
                    return Some(target);
                }
                if self.hosts.is_empty() || self.bare_address {
                    return Some(Target::bare(address, port));
                }
                continue;
            }

            let entry = self.entries.next()?;
            self.current = Target::split_entry(&entry);
            self.next_host = 0;
        }
    }
}

/// Reads a newline-delimited list file.
///
/// Line endings (`\n` and `\r\n`) are stripped and empty lines skipped.
pub async fn read_lines(path: &Path) -> io::Result<Vec<String>> {
    let file = File::open(path).await?;
    let mut lines = BufReader::new(file).lines();
    let mut out = Vec::new();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim_end_matches('\r');
        if !line.is_empty() {
            out.push(line.to_owned());
        }
    }
    Ok(out)
}
