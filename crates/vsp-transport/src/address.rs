//! Session addresses
//!
//! Accepted spellings: `host:port`, `:port`, `port`, `[v6]:port`.
//! The split happens on the last colon so numeric IPv6 hosts survive.

use std::fmt;
use std::str::FromStr;

use vsp_core::{VspError, VspResult};

/// Host used when an address names only a port
pub const DEFAULT_HOST: &str = "localhost";

/// Simulator endpoint
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Address {
    pub host: String,
    pub port: u16,
}

impl Address {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Address {
            host: host.into(),
            port,
        }
    }

    /// Parse an operator-supplied address
    pub fn parse(s: &str) -> VspResult<Self> {
        let s = s.trim();
        let (host, port) = match s.rsplit_once(':') {
            Some((host, port)) => (host, port),
            None => ("", s),
        };

        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        let host = if host.is_empty() { DEFAULT_HOST } else { host };

        let port = port
            .parse::<u16>()
            .ok()
            .filter(|&p| p != 0)
            .ok_or_else(|| VspError::InvalidAddress(s.to_string()))?;

        Ok(Address::new(host, port))
    }
}

impl FromStr for Address {
    type Err = VspError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
