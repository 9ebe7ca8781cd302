//! Device addressing and the framed TCP transport.

pub mod transport;

use std::fmt;

pub use transport::{Transport, TransportEvent};

/// Host and port of the streaming device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceAddress {
    host: String,
    port: u16,
}

impl DeviceAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl std::str::FromStr for DeviceAddress {
    type Err = crate::error::ArpError;

    /// Parses `host:port`; the port is taken after the last colon.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| crate::error::ArpError::Other(format!("missing port in {s:?}")))?;
        if host.is_empty() {
            return Err(crate::error::ArpError::Other(format!("missing host in {s:?}")));
        }
        let port = port
            .parse::<u16>()
            .map_err(|e| crate::error::ArpError::Other(format!("bad port in {s:?}: {e}")))?;
        Ok(Self::new(host, port))
    }
}
