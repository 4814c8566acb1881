use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Address is the host/port identity of a remote peer (registry or provider). It is
/// immutable and compared by value, so it is used as a map key everywhere.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct Address {
    host: Arc<str>,
    port: u16,
}

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum AddressError {
    #[error("host is empty")]
    EmptyHost,
    #[error("port out of range: {0}")]
    PortOutOfRange(i64),
    #[error("malformed address '{0}', expected 'host:port'")]
    Malformed(String),
}

impl Address {
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, AddressError> {
        let host = host.into();
        if host.is_empty() {
            return Err(AddressError::EmptyHost);
        }

        Ok(Address {
            host: Arc::from(host),
            port,
        })
    }

    /// Same as `new`, but accepts a port of any integer width as it arrives off the wire.
    pub fn with_port(host: impl Into<String>, port: i64) -> Result<Self, AddressError> {
        let port = u16::try_from(port).map_err(|_| AddressError::PortOutOfRange(port))?;
        Self::new(host, port)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = match s.rfind(':') {
            Some(i) => (&s[..i], &s[i + 1..]),
            None => return Err(AddressError::Malformed(s.to_string())),
        };
        let port: i64 = port.parse().map_err(|_| AddressError::Malformed(s.to_string()))?;

        Self::with_port(host, port)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}
