//! Trusted proxy subnets and their trust levels.
//!
//! A [`TrustedProxySet`] is built once from operator directives and is read-only
//! afterward. Lookups scan entries in configured order and the first matching
//! subnet decides the trust level.
//!
//! # Directive syntax
//!
//! Each directive is an IP address, an IP network or a host name, optionally
//! prefixed with `internal:`:
//!
//! - `199.83.128.0/21` an external proxy network
//! - `internal:10.0.0.0/255.0.0.0` an internal network using a dotted netmask
//! - `internal:172.16` an abbreviated IPv4 network (`172.16.0.0/16`)
//! - `2001:db8::/32` an IPv6 network
//! - `lb.example.net` every address the name resolves to at load time
//!
//! Internal proxies are fully trusted and may vouch for private client
//! addresses. External proxies are trusted to forward, but a private address
//! they claim as the client is ignored.

use std::collections::HashSet;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, ToSocketAddrs};
use std::str::FromStr;

use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use tracing::debug;

use crate::defaults;
use crate::error::{Result, TrustGateError};

const INTERNAL_PREFIX: &str = "internal:";

/// How far a matching proxy is trusted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TrustLevel {
    /// Fully trusted; may assert private or link-local client addresses.
    Internal,
    /// Trusted to forward, but only for globally routable client addresses.
    External,
}

impl fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal => f.write_str("internal"),
            Self::External => f.write_str("external"),
        }
    }
}

/// One configured trusted proxy as written by the operator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxyDirective {
    /// Address, network or host name, without the trust prefix.
    pub target: String,
    /// Trust level applied to every subnet this directive expands to.
    pub level: TrustLevel,
}

impl ProxyDirective {
    /// An external proxy directive.
    pub fn external(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            level: TrustLevel::External,
        }
    }

    /// An internal proxy directive.
    pub fn internal(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            level: TrustLevel::Internal,
        }
    }
}

impl FromStr for ProxyDirective {
    type Err = TrustGateError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (level, target) = match s.strip_prefix(INTERNAL_PREFIX) {
            Some(rest) => (TrustLevel::Internal, rest.trim()),
            None => (TrustLevel::External, s),
        };

        if target.is_empty() {
            return Err(TrustGateError::InvalidSubnet {
                entry: s.to_string(),
                reason: "empty proxy address".to_string(),
            });
        }

        Ok(Self {
            target: target.to_string(),
            level,
        })
    }
}

impl fmt::Display for ProxyDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.level {
            TrustLevel::Internal => write!(f, "{INTERNAL_PREFIX}{}", self.target),
            TrustLevel::External => f.write_str(&self.target),
        }
    }
}

/// Resolves trusted proxy host names while configuration is loaded.
pub trait HostResolver {
    /// Returns every address `host` resolves to.
    fn resolve(&self, host: &str) -> std::io::Result<Vec<IpAddr>>;
}

/// Host resolver backed by the operating system's resolver.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemResolver;

impl HostResolver for SystemResolver {
    fn resolve(&self, host: &str) -> std::io::Result<Vec<IpAddr>> {
        Ok((host, 0)
            .to_socket_addrs()?
            .map(|addr| addr.ip())
            .collect())
    }
}

/// A subnet with the trust level it grants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrustedProxyEntry {
    subnet: IpNet,
    level: TrustLevel,
}

impl TrustedProxyEntry {
    /// Creates an entry for `subnet`.
    pub fn new(subnet: IpNet, level: TrustLevel) -> Self {
        Self { subnet, level }
    }

    /// The matched network.
    pub fn subnet(&self) -> IpNet {
        self.subnet
    }

    /// The trust level granted to addresses inside the network.
    pub fn level(&self) -> TrustLevel {
        self.level
    }

    fn contains(&self, ip: &IpAddr) -> bool {
        self.subnet.contains(ip)
    }
}

/// Ordered set of trusted proxy subnets.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrustedProxySet {
    entries: Vec<TrustedProxyEntry>,
}

impl TrustedProxySet {
    /// Creates a set from already-built entries, keeping their order.
    pub fn new(entries: Vec<TrustedProxyEntry>) -> Self {
        Self { entries }
    }

    /// The built-in Incapsula edge networks, all external.
    pub fn incapsula_defaults() -> Self {
        let entries = defaults::TRUSTED_PROXIES
            .iter()
            .filter_map(|cidr| cidr.parse::<IpNet>().ok())
            .map(|subnet| TrustedProxyEntry::new(subnet, TrustLevel::External))
            .collect();
        Self { entries }
    }

    /// Builds a set from operator directives.
    ///
    /// Host names expand, in place, to one entry per resolved address.
    ///
    /// # Errors
    ///
    /// Fails on a malformed address or mask, on a host name carrying a mask,
    /// and on a host name that resolves to nothing.
    ///
    /// # Example
    ///
    /// ```
    /// use trustgate_core::trusted_proxies::{
    ///     ProxyDirective, SystemResolver, TrustLevel, TrustedProxySet,
    /// };
    ///
    /// let directives: Vec<ProxyDirective> = ["internal:10.0.0.0/8", "203.0.113.0/24"]
    ///     .iter()
    ///     .map(|d| d.parse().unwrap())
    ///     .collect();
    /// let set = TrustedProxySet::from_directives(&directives, &SystemResolver).unwrap();
    ///
    /// assert_eq!(set.matched_trust_level(&"10.1.2.3".parse().unwrap()), Some(TrustLevel::Internal));
    /// assert_eq!(set.matched_trust_level(&"203.0.113.9".parse().unwrap()), Some(TrustLevel::External));
    /// assert_eq!(set.matched_trust_level(&"192.0.2.1".parse().unwrap()), None);
    /// ```
    pub fn from_directives(
        directives: &[ProxyDirective],
        resolver: &impl HostResolver,
    ) -> Result<Self> {
        let mut entries = Vec::with_capacity(directives.len());

        for directive in directives {
            let (addr, mask) = match directive.target.split_once('/') {
                Some((addr, mask)) => (addr, Some(mask)),
                None => (directive.target.as_str(), None),
            };

            if looks_like_ip(addr) {
                let subnet = parse_subnet(&directive.target, addr, mask)?;
                entries.push(TrustedProxyEntry::new(subnet, directive.level));
                continue;
            }

            if let Some(mask) = mask {
                return Err(TrustGateError::InvalidSubnet {
                    entry: directive.target.clone(),
                    reason: format!("the subnet /{mask} is invalid for a host name"),
                });
            }

            let addrs = resolver
                .resolve(addr)
                .map_err(|err| TrustGateError::UnresolvableHost {
                    host: addr.to_string(),
                    reason: err.to_string(),
                })?;
            if addrs.is_empty() {
                return Err(TrustGateError::UnresolvableHost {
                    host: addr.to_string(),
                    reason: "no addresses".to_string(),
                });
            }

            let mut seen = HashSet::new();
            for ip in addrs {
                let subnet = host_subnet(ip);
                if seen.insert(subnet) {
                    debug!(host = addr, subnet = %subnet, level = %directive.level, "Resolved trusted proxy");
                    entries.push(TrustedProxyEntry::new(subnet, directive.level));
                }
            }
        }

        Ok(Self { entries })
    }

    /// Returns the trust level of the first entry containing `ip`.
    pub fn matched_trust_level(&self, ip: &IpAddr) -> Option<TrustLevel> {
        self.entries
            .iter()
            .find(|entry| entry.contains(ip))
            .map(|entry| entry.level)
    }

    /// Iterates over entries in configured order.
    pub fn iter(&self) -> impl Iterator<Item = &TrustedProxyEntry> {
        self.entries.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no entry is configured.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// An entry is taken as an IP when it contains ':' or only digits and dots.
fn looks_like_ip(text: &str) -> bool {
    text.contains(':') || text.chars().all(|c| c == '.' || c.is_ascii_digit())
}

fn parse_subnet(entry: &str, addr: &str, mask: Option<&str>) -> Result<IpNet> {
    let invalid = |reason: String| TrustGateError::InvalidSubnet {
        entry: entry.to_string(),
        reason,
    };

    if addr.contains(':') {
        let ip: Ipv6Addr = addr
            .parse()
            .map_err(|_| invalid(format!("{addr} is not an IPv6 address")))?;
        let prefix = match mask {
            Some(mask) => parse_prefix(mask, 128).map_err(invalid)?,
            None => 128,
        };

        // IPv4-mapped networks are matched against normalized IPv4 peers.
        if let Some(v4) = ip.to_ipv4_mapped()
            && prefix >= 96
        {
            return Ipv4Net::new(v4, prefix - 96)
                .map(|net| IpNet::V4(net.trunc()))
                .map_err(|err| invalid(err.to_string()));
        }

        return Ipv6Net::new(ip, prefix)
            .map(|net| IpNet::V6(net.trunc()))
            .map_err(|err| invalid(err.to_string()));
    }

    let octets: Vec<&str> = addr.split('.').collect();
    if octets.is_empty() || octets.len() > 4 {
        return Err(invalid(format!("{addr} is not an IPv4 address")));
    }

    let mut bytes = [0u8; 4];
    for (slot, octet) in bytes.iter_mut().zip(&octets) {
        *slot = octet
            .parse()
            .map_err(|_| invalid(format!("{addr} is not an IPv4 address")))?;
    }

    let prefix = match mask {
        Some(mask) if mask.contains('.') => {
            let netmask: Ipv4Addr = mask
                .parse()
                .map_err(|_| invalid(format!("{mask} is not a netmask")))?;
            ipnet::ipv4_mask_to_prefix(netmask)
                .map_err(|_| invalid(format!("{mask} is not a contiguous netmask")))?
        }
        Some(mask) => parse_prefix(mask, 32).map_err(invalid)?,
        // Abbreviated networks cover exactly the octets that were written.
        None => (octets.len() * 8) as u8,
    };

    Ipv4Net::new(Ipv4Addr::from(bytes), prefix)
        .map(|net| IpNet::V4(net.trunc()))
        .map_err(|err| invalid(err.to_string()))
}

fn parse_prefix(mask: &str, max: u8) -> std::result::Result<u8, String> {
    match mask.parse::<u8>() {
        Ok(prefix) if prefix <= max => Ok(prefix),
        _ => Err(format!("the subnet /{mask} is invalid")),
    }
}

fn host_subnet(ip: IpAddr) -> IpNet {
    match ip {
        IpAddr::V4(v4) => IpNet::V4(Ipv4Net::from(v4)),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => IpNet::V4(Ipv4Net::from(v4)),
            None => IpNet::V6(Ipv6Net::from(v6)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::StaticResolver;

    fn ip(text: &str) -> IpAddr {
        text.parse().unwrap()
    }

    fn build(directives: &[&str]) -> Result<TrustedProxySet> {
        let directives: Vec<ProxyDirective> =
            directives.iter().map(|d| d.parse().unwrap()).collect();
        TrustedProxySet::from_directives(&directives, &StaticResolver::default())
    }

    // ===========================================
    // ProxyDirective tests
    // ===========================================

    #[test]
    fn test_directive_parse_external() {
        let directive: ProxyDirective = "199.83.128.0/21".parse().unwrap();
        assert_eq!(directive, ProxyDirective::external("199.83.128.0/21"));
    }

    #[test]
    fn test_directive_parse_internal() {
        let directive: ProxyDirective = " internal:10.0.0.0/8 ".parse().unwrap();
        assert_eq!(directive, ProxyDirective::internal("10.0.0.0/8"));
        assert_eq!(directive.to_string(), "internal:10.0.0.0/8");
    }

    #[test]
    fn test_directive_parse_internal_ipv6() {
        let directive: ProxyDirective = "internal:::1".parse().unwrap();
        assert_eq!(directive, ProxyDirective::internal("::1"));
    }

    #[test]
    fn test_directive_parse_empty() {
        assert!("".parse::<ProxyDirective>().is_err());
        assert!("internal:".parse::<ProxyDirective>().is_err());
    }

    // ===========================================
    // Subnet parsing tests
    // ===========================================

    #[test]
    fn test_single_ipv4_is_host_subnet() {
        let set = build(&["203.0.113.9"]).unwrap();
        assert_eq!(set.iter().next().unwrap().subnet().to_string(), "203.0.113.9/32");
        assert!(set.matched_trust_level(&ip("203.0.113.9")).is_some());
        assert!(set.matched_trust_level(&ip("203.0.113.10")).is_none());
    }

    #[test]
    fn test_cidr_prefix() {
        let set = build(&["199.83.128.0/21"]).unwrap();
        assert!(set.matched_trust_level(&ip("199.83.128.1")).is_some());
        assert!(set.matched_trust_level(&ip("199.83.135.254")).is_some());
        assert!(set.matched_trust_level(&ip("199.83.136.1")).is_none());
    }

    #[test]
    fn test_dotted_netmask() {
        let set = build(&["172.16.0.0/255.240.0.0"]).unwrap();
        assert_eq!(set.iter().next().unwrap().subnet().to_string(), "172.16.0.0/12");
    }

    #[test]
    fn test_abbreviated_ipv4_network() {
        let set = build(&["10", "172.16", "192.168.1"]).unwrap();
        let subnets: Vec<String> = set.iter().map(|e| e.subnet().to_string()).collect();
        assert_eq!(subnets, vec!["10.0.0.0/8", "172.16.0.0/16", "192.168.1.0/24"]);
    }

    #[test]
    fn test_host_bits_are_truncated() {
        let set = build(&["192.168.1.77/24"]).unwrap();
        assert_eq!(set.iter().next().unwrap().subnet().to_string(), "192.168.1.0/24");
    }

    #[test]
    fn test_ipv6_network() {
        let set = build(&["2001:db8::/32"]).unwrap();
        assert!(set.matched_trust_level(&ip("2001:db8:1::1")).is_some());
        assert!(set.matched_trust_level(&ip("2001:db9::1")).is_none());
    }

    #[test]
    fn test_ipv4_mapped_network_matches_ipv4() {
        let set = build(&["::ffff:198.51.100.0/120"]).unwrap();
        assert_eq!(set.iter().next().unwrap().subnet().to_string(), "198.51.100.0/24");
    }

    #[test]
    fn test_invalid_subnets() {
        assert!(build(&["10.0.0.0/33"]).is_err());
        assert!(build(&["2001:db8::/129"]).is_err());
        assert!(build(&["10.0.0.0/abc"]).is_err());
        assert!(build(&["10.0.0.0/255.0.255.0"]).is_err());
        assert!(build(&["256.0.0.1"]).is_err());
        assert!(build(&["10..0.1"]).is_err());
        assert!(build(&["1.2.3.4.5"]).is_err());
        assert!(build(&["2001:zz::1"]).is_err());
    }

    #[test]
    fn test_invalid_subnet_error_names_entry() {
        match build(&["10.0.0.0/40"]) {
            Err(TrustGateError::InvalidSubnet { entry, .. }) => assert_eq!(entry, "10.0.0.0/40"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    // ===========================================
    // Host name tests
    // ===========================================

    #[test]
    fn test_hostname_expands_in_place() {
        let resolver = StaticResolver::default()
            .with_host("lb.example.net", &["198.51.100.1", "198.51.100.2"]);
        let directives = vec![
            ProxyDirective::external("203.0.113.0/24"),
            ProxyDirective::internal("lb.example.net"),
            ProxyDirective::external("192.0.2.0/24"),
        ];

        let set = TrustedProxySet::from_directives(&directives, &resolver).unwrap();
        let entries: Vec<(String, TrustLevel)> = set
            .iter()
            .map(|e| (e.subnet().to_string(), e.level()))
            .collect();

        assert_eq!(
            entries,
            vec![
                ("203.0.113.0/24".to_string(), TrustLevel::External),
                ("198.51.100.1/32".to_string(), TrustLevel::Internal),
                ("198.51.100.2/32".to_string(), TrustLevel::Internal),
                ("192.0.2.0/24".to_string(), TrustLevel::External),
            ]
        );
    }

    #[test]
    fn test_hostname_with_mask_is_rejected() {
        let resolver = StaticResolver::default().with_host("lb.example.net", &["198.51.100.1"]);
        let directives = vec![ProxyDirective::external("lb.example.net/24")];

        assert!(matches!(
            TrustedProxySet::from_directives(&directives, &resolver),
            Err(TrustGateError::InvalidSubnet { .. })
        ));
    }

    #[test]
    fn test_unresolvable_hostname() {
        let directives = vec![ProxyDirective::external("missing.example.net")];
        assert!(matches!(
            TrustedProxySet::from_directives(&directives, &StaticResolver::default()),
            Err(TrustGateError::UnresolvableHost { .. })
        ));
    }

    // ===========================================
    // Matching tests
    // ===========================================

    #[test]
    fn test_first_match_wins() {
        let set = build(&["internal:10.1.0.0/16", "10.0.0.0/8"]).unwrap();
        assert_eq!(set.matched_trust_level(&ip("10.1.2.3")), Some(TrustLevel::Internal));
        assert_eq!(set.matched_trust_level(&ip("10.2.2.3")), Some(TrustLevel::External));

        let set = build(&["10.0.0.0/8", "internal:10.1.0.0/16"]).unwrap();
        assert_eq!(set.matched_trust_level(&ip("10.1.2.3")), Some(TrustLevel::External));
    }

    #[test]
    fn test_ipv4_does_not_match_ipv6_subnet() {
        let set = build(&["::/0"]).unwrap();
        assert!(set.matched_trust_level(&ip("192.0.2.1")).is_none());
        assert!(set.matched_trust_level(&ip("2001:db8::1")).is_some());
    }

    #[test]
    fn test_empty_set_matches_nothing() {
        let set = TrustedProxySet::default();
        assert!(set.is_empty());
        assert!(set.matched_trust_level(&ip("127.0.0.1")).is_none());
    }

    #[test]
    fn test_incapsula_defaults() {
        let set = TrustedProxySet::incapsula_defaults();
        assert_eq!(set.len(), defaults::TRUSTED_PROXIES.len());
        assert!(set.iter().all(|e| e.level() == TrustLevel::External));
        assert_eq!(set.matched_trust_level(&ip("199.83.128.10")), Some(TrustLevel::External));
        assert_eq!(set.matched_trust_level(&ip("192.230.127.1")), Some(TrustLevel::External));
        assert!(set.matched_trust_level(&ip("8.8.8.8")).is_none());
    }
}
