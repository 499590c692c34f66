//! Remote endpoint addressing.
//!
//! An [`Endpoint`] is a validated `(host, port)` pair. Hosts are either IP
//! literals (IPv4 or IPv6) or RFC 1123 hostnames; ports are in `1..=65535`.
//! Once constructed an endpoint is immutable.

use std::fmt;
use std::net::IpAddr;

use thiserror::Error;

/// Default remote host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default remote port.
pub const DEFAULT_PORT: u16 = 6013;

/// Maximum length of a hostname, excluding an optional trailing dot.
const MAX_HOSTNAME_LENGTH: usize = 253;

/// Maximum length of a single hostname label.
const MAX_LABEL_LENGTH: usize = 63;

/// Endpoint validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EndpointError {
    /// The host is blank.
    #[error("host cannot be empty")]
    EmptyHost,

    /// The host is neither an IP literal nor a valid hostname.
    #[error("invalid host: {0}")]
    InvalidHost(String),

    /// The port is zero, negative, non-numeric, or above 65535.
    #[error("port must be between 1 and 65535, got {0}")]
    InvalidPort(String),
}

/// A validated remote address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Create an endpoint from a host and a port.
    ///
    /// Surrounding whitespace is ignored and IPv6 literals may be given with
    /// or without brackets.
    pub fn new(host: &str, port: u16) -> Result<Self, EndpointError> {
        let host = normalize_host(host)?;
        if port == 0 {
            return Err(EndpointError::InvalidPort(port.to_string()));
        }
        Ok(Self { host, port })
    }

    /// The remote host, without IPv6 brackets.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The remote port.
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Parse a port number, rejecting zero and anything outside `u16`.
pub fn parse_port(s: &str) -> Result<u16, EndpointError> {
    match s.trim().parse::<u16>() {
        Ok(0) | Err(_) => Err(EndpointError::InvalidPort(s.trim().to_string())),
        Ok(port) => Ok(port),
    }
}

fn normalize_host(raw: &str) -> Result<String, EndpointError> {
    let host = raw.trim();
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);

    if host.is_empty() {
        return Err(EndpointError::EmptyHost);
    }

    if host.parse::<IpAddr>().is_ok() || is_valid_hostname(host) {
        Ok(host.to_string())
    } else {
        Err(EndpointError::InvalidHost(host.to_string()))
    }
}

/// RFC 1123 hostname check.
///
/// A numeric final label is rejected so that malformed dotted quads such as
/// `256.1.1.1` are not mistaken for names.
fn is_valid_hostname(host: &str) -> bool {
    let host = host.strip_suffix('.').unwrap_or(host);
    if host.is_empty() || host.len() > MAX_HOSTNAME_LENGTH {
        return false;
    }

    let labels_ok = host.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= MAX_LABEL_LENGTH
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
    });

    let last_is_numeric = host
        .rsplit('.')
        .next()
        .is_some_and(|label| label.bytes().all(|b| b.is_ascii_digit()));

    labels_ok && !last_is_numeric
}
