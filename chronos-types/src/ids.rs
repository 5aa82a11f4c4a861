use std::fmt::{self, Display};

/// A timer's 64-bit identifier. Chosen by the client (or the front-end,
/// on `POST`) at random; collisions are a client error, not a store
/// concern (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

impl TimerId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Formats as the fixed-width lowercase hex used in timer URLs.
    pub fn to_hex16(self) -> String {
        format!("{:016x}", self.0)
    }

    pub fn from_hex16(s: &str) -> Option<Self> {
        u64::from_str_radix(s, 16).ok().map(Self)
    }
}

impl Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TimerId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<TimerId> for u64 {
    fn from(id: TimerId) -> Self {
        id.0
    }
}

/// A cluster member's address, `host:port`. Opaque beyond what rendezvous
/// hashing and HTTP dispatch need: equality and hashing on the raw string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeAddress(String);

impl NodeAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for NodeAddress {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for NodeAddress {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<NodeAddress> for String {
    fn from(addr: NodeAddress) -> Self {
        addr.0
    }
}
