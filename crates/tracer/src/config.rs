// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Protocol constants and distribution server configuration.
//!
//! All ports, limits and segment names live here. **Never hardcode elsewhere!**

use crate::error::{Error, Result};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Default scene distribution port (request/response channel).
pub const DEFAULT_DISTRIBUTION_PORT: u16 = 5565;

/// Default bind address for the distribution server.
pub const DEFAULT_BIND_ADDRESS: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

/// Upper bound for a request frame. Requests are segment names, so anything
/// larger is a protocol violation and the peer is dropped.
pub const MAX_REQUEST_SIZE: usize = 1024;

/// Upper bound for a response frame accepted by [`crate::SceneClient`] (256 MB).
pub const MAX_RESPONSE_SIZE: usize = 256 * 1024 * 1024;

/// Longest wait of one server poll; bounds how often deadlines are checked.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Time allowed to write one complete response frame.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum number of simultaneously connected peers.
pub const DEFAULT_MAX_PEERS: usize = 64;

/// Segment names served by the distribution server, in fetch order.
pub const SEGMENT_NAMES: [&str; 6] = [
    "header",
    "nodes",
    "objects",
    "characters",
    "textures",
    "materials",
];

/// Distribution server configuration.
///
/// # Example
///
/// ```
/// use tracer::config::DistributionConfig;
/// use std::time::Duration;
///
/// let config = DistributionConfig::new("127.0.0.1", 0)
///     .unwrap()
///     .with_poll_interval(Duration::from_millis(1));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionConfig {
    /// Address the responder binds to.
    pub bind_address: IpAddr,
    /// Port the responder binds to (0 = ephemeral).
    pub port: u16,
    /// Longest wait of one poll of the server loop.
    pub poll_interval: Duration,
    /// Deadline for writing one complete response frame.
    pub write_timeout: Duration,
    /// Maximum accepted request frame size.
    pub max_request_size: usize,
    /// Maximum simultaneously connected peers.
    pub max_peers: usize,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS,
            port: DEFAULT_DISTRIBUTION_PORT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            max_request_size: MAX_REQUEST_SIZE,
            max_peers: DEFAULT_MAX_PEERS,
        }
    }
}

impl DistributionConfig {
    /// Create a configuration bound to `address:port` with default limits.
    pub fn new(address: &str, port: u16) -> Result<Self> {
        let bind_address = parse_ip(address)?;
        Ok(Self {
            bind_address,
            port,
            ..Default::default()
        })
    }

    /// Override the idle poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Override the response write timeout.
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Override the maximum number of connected peers.
    #[must_use]
    pub fn with_max_peers(mut self, max_peers: usize) -> Self {
        self.max_peers = max_peers;
        self
    }

    /// Socket address the server binds to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    /// Validate limits.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(Error::InvalidState(
                "poll_interval must be non-zero".to_string(),
            ));
        }
        if self.write_timeout.is_zero() {
            return Err(Error::InvalidState(
                "write_timeout must be non-zero".to_string(),
            ));
        }
        if self.max_request_size == 0 {
            return Err(Error::InvalidState(
                "max_request_size must be non-zero".to_string(),
            ));
        }
        if self.max_peers == 0 {
            return Err(Error::InvalidState("max_peers must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Parse a bind/connect IP address, accepting `localhost` and `*`.
pub fn parse_ip(address: &str) -> Result<IpAddr> {
    match address.trim() {
        "localhost" => Ok(IpAddr::V4(Ipv4Addr::LOCALHOST)),
        "*" | "" => Ok(DEFAULT_BIND_ADDRESS),
        other => other
            .parse()
            .map_err(|e| Error::InvalidAddress(format!("{}: {}", other, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = DistributionConfig::default();
        assert_eq!(config.port, DEFAULT_DISTRIBUTION_PORT);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_ip_aliases() {
        assert_eq!(
            parse_ip("localhost").unwrap(),
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        );
        assert_eq!(parse_ip("*").unwrap(), DEFAULT_BIND_ADDRESS);
        assert!(matches!(
            parse_ip("not-an-ip"),
            Err(Error::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let config = DistributionConfig::default().with_poll_interval(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_socket_addr() {
        let config = DistributionConfig::new("127.0.0.1", 6000).unwrap();
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:6000");
    }
}
