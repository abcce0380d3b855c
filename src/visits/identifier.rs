//! Client identifier derived from the caller's address.

use std::net::{IpAddr, SocketAddr};

use crate::error::{Result, VisitsError};

/// The key under which a client's visits are counted.
///
/// Derived from the peer address with the port stripped. Any non-empty string
/// is accepted as an opaque key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentifier(String);

impl ClientIdentifier {
    /// Use `raw` as an identifier. Fails only for an empty string.
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(VisitsError::InvalidIdentifier(raw));
        }
        Ok(Self(raw))
    }

    /// The store key for this client.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<IpAddr> for ClientIdentifier {
    fn from(ip: IpAddr) -> Self {
        Self(ip.to_string())
    }
}

impl From<SocketAddr> for ClientIdentifier {
    fn from(addr: SocketAddr) -> Self {
        addr.ip().into()
    }
}

impl std::fmt::Display for ClientIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
