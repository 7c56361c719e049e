//! Client address parsing and classification.
//!
//! Forwarded chains carry bare IP literals. Host names are never resolved at
//! request time, so anything that is not an IPv4 or IPv6 literal is rejected.
//! IPv4-mapped IPv6 addresses (`::ffff:a.b.c.d`) are folded to plain IPv4 so that
//! subnet matching and private-range checks see a single representation.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use crate::error::{Result, TrustGateError};

/// A client or proxy address as seen by the trust walk.
///
/// The port is carried through from the socket peer but plays no part in any
/// trust decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ClientAddr {
    ip: IpAddr,
    port: Option<u16>,
}

impl ClientAddr {
    /// Creates an address, normalizing IPv4-mapped IPv6 to IPv4.
    pub fn new(ip: IpAddr, port: Option<u16>) -> Self {
        Self {
            ip: normalize(ip),
            port,
        }
    }

    /// The IP part of the address.
    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    /// The originating port, if one is known.
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Returns a copy with the IP replaced and the port kept.
    pub fn with_ip(self, ip: IpAddr) -> Self {
        Self::new(ip, self.port)
    }
}

impl From<IpAddr> for ClientAddr {
    fn from(ip: IpAddr) -> Self {
        Self::new(ip, None)
    }
}

impl From<SocketAddr> for ClientAddr {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip(), Some(addr.port()))
    }
}

/// Displays the IP only, which is the form used in headers and notes.
impl fmt::Display for ClientAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.ip.fmt(f)
    }
}

/// Parses one forwarded-chain segment as an IP literal.
///
/// Accepts dotted-decimal IPv4 and colon-form IPv6. Ports, brackets and host
/// names are rejected.
///
/// # Example
///
/// ```
/// use trustgate_core::address::parse_ip;
/// use std::net::{IpAddr, Ipv4Addr};
///
/// assert_eq!(parse_ip("203.0.113.9").unwrap(), IpAddr::V4(Ipv4Addr::new(203, 0, 113, 9)));
/// assert!(parse_ip("proxy.example.com").is_err());
/// ```
pub fn parse_ip(text: &str) -> Result<IpAddr> {
    text.parse::<IpAddr>()
        .map(normalize)
        .map_err(|_| TrustGateError::InvalidIp(text.to_string()))
}

/// Returns whether the address may be claimed as a client by an external proxy.
///
/// IPv4 is routable unless it is in 10.0.0.0/8, 127.0.0.0/8, 169.254.0.0/16,
/// 172.16.0.0/12 or 192.168.0.0/16. IPv6 is routable only inside the Global
/// Unicast range 2000::/3.
pub fn is_globally_routable(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => !is_private_v4(v4),
        IpAddr::V6(v6) => is_global_unicast_v6(v6),
    }
}

fn is_private_v4(ip: &Ipv4Addr) -> bool {
    ip.is_private() || ip.is_loopback() || ip.is_link_local()
}

fn is_global_unicast_v6(ip: &Ipv6Addr) -> bool {
    ip.octets()[0] & 0xe0 == 0x20
}

fn normalize(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .map(IpAddr::V4)
            .unwrap_or(IpAddr::V6(v6)),
        v4 => v4,
    }
}
