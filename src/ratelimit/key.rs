//! Client key generation and handling.

use std::net::IpAddr;

/// A key that uniquely identifies a rate limited client.
///
/// Keys are opaque to the limiter; two requests share rate limit state
/// exactly when their keys compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientKey(String);

impl ClientKey {
    /// Create a key from an arbitrary identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Create a key from a client's IP address.
    ///
    /// IPv4-mapped IPv6 addresses are folded into their IPv4 form so a
    /// dual-stack listener does not split one client across two keys.
    pub fn from_ip(ip: IpAddr) -> Self {
        let ip = match ip {
            IpAddr::V6(v6) => v6
                .to_ipv4_mapped()
                .map(IpAddr::V4)
                .unwrap_or(IpAddr::V6(v6)),
            v4 => v4,
        };
        Self(ip.to_string())
    }

    /// Key used when the client's address cannot be determined.
    pub fn unknown() -> Self {
        Self("unknown".to_string())
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClientKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<IpAddr> for ClientKey {
    fn from(ip: IpAddr) -> Self {
        Self::from_ip(ip)
    }
}

impl From<&str> for ClientKey {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_client_key_from_ipv4() {
        let key = ClientKey::from_ip(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10)));
        assert_eq!(key.as_str(), "192.168.1.10");
        assert_eq!(key.to_string(), "192.168.1.10");
    }

    #[test]
    fn test_client_key_folds_mapped_ipv6() {
        let mapped = IpAddr::V6(Ipv4Addr::new(10, 0, 0, 1).to_ipv6_mapped());
        let plain = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(ClientKey::from_ip(mapped), ClientKey::from_ip(plain));
    }

    #[test]
    fn test_client_key_keeps_native_ipv6() {
        let key = ClientKey::from(IpAddr::V6(Ipv6Addr::LOCALHOST));
        assert_eq!(key.as_str(), "::1");
    }

    #[test]
    fn test_client_key_equality() {
        assert_eq!(ClientKey::from("a"), ClientKey::new("a".to_string()));
        assert_ne!(ClientKey::from("a"), ClientKey::from("b"));
    }
}
