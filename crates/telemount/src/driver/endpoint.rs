//! Remote endpoint identity.

use std::fmt;

/// A `(host, port)` pair identifying one remote filesystem source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Create an endpoint.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Remote host name or address.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Remote port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Host in the form sshfs expects before the `:` separator.
    #[must_use]
    pub fn sshfs_host(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.sshfs_host(), self.port)
    }
}
