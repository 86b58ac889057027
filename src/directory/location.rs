//! Backend location records.

use std::fmt;
use serde::Serialize;

/// A concrete network location for one backend instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendLocation {
    /// Backend name the location belongs to.
    pub name: String,
    /// Host name or IP address.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Whether the instance may receive traffic.
    pub healthy: bool,
}

impl BackendLocation {
    /// Create a healthy location.
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            healthy: true,
        }
    }

    /// `host:port` suitable for a URI authority. IPv6 hosts are bracketed.
    pub fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for BackendLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.authority())
    }
}
