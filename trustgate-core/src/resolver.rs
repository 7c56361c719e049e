//! Forwarded chain resolution.
//!
//! The forwarded header is a comma-separated list of addresses, appended to by
//! each proxy on the way in, so its rightmost entry was written by the proxy
//! closest to us. The walk starts at the socket peer and moves left one entry at
//! a time, for as long as the address it currently stands on is a trusted proxy.
//!
//! # Walk
//!
//! 1. If the current address is not trusted, stop. When denial is enabled and
//!    no hop has been accepted yet, the request is denied.
//! 2. Take the rightmost unconsumed entry, trimmed of surrounding whitespace.
//! 3. Stop if the entry is empty or not an IP literal.
//! 4. Stop if the current proxy is external and the entry is not globally
//!    routable. External proxies cannot vouch for private addresses.
//! 5. Record the current address as a hop unless it is an internal proxy, then
//!    move onto the entry and repeat.
//!
//! The header is never modified; unconsumed text is reported verbatim.

use tracing::debug;

use crate::address::{ClientAddr, is_globally_routable, parse_ip};
use crate::trusted_proxies::TrustLevel;
use crate::types::ResolverConfig;

/// Outcome of a resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrustDecision {
    /// Use the resolved client.
    Accept,
    /// Refuse the request.
    Deny,
}

/// Result of walking one forwarded chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainResolution {
    /// The address to treat as the client.
    pub client: ClientAddr,
    /// External proxies crossed, nearest first.
    pub proxy_hops: Vec<ClientAddr>,
    /// Part of the header left of the last consumed entry, if any.
    pub remainder: Option<String>,
    /// Whether the request may proceed.
    pub decision: TrustDecision,
}

impl ChainResolution {
    fn accept(client: ClientAddr, proxy_hops: Vec<ClientAddr>, remainder: Option<&str>) -> Self {
        Self {
            client,
            proxy_hops,
            remainder: remainder.filter(|r| !r.is_empty()).map(str::to_string),
            decision: TrustDecision::Accept,
        }
    }

    fn deny(peer: ClientAddr) -> Self {
        Self {
            client: peer,
            proxy_hops: Vec::new(),
            remainder: None,
            decision: TrustDecision::Deny,
        }
    }

    /// Returns true when the request must be refused.
    pub fn is_denied(&self) -> bool {
        self.decision == TrustDecision::Deny
    }

    /// External proxies crossed, joined with `", "`, or `None` when there were none.
    pub fn proxy_ip_list(&self) -> Option<String> {
        if self.proxy_hops.is_empty() {
            return None;
        }
        Some(
            self.proxy_hops
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        )
    }
}

/// Resolves the client address from a forwarded chain header.
///
/// `header` is the raw header value, `peer` the socket peer of the connection.
/// An absent or empty header leaves the peer in place, or denies when
/// `deny_untrusted` is set.
///
/// # Example
///
/// ```
/// use trustgate_core::address::ClientAddr;
/// use trustgate_core::resolver::resolve_chain;
/// use trustgate_core::types::ResolverConfig;
///
/// let config = ResolverConfig::default();
/// let peer = ClientAddr::from("199.83.128.10:443".parse::<std::net::SocketAddr>().unwrap());
///
/// let resolution = resolve_chain(Some("203.0.113.9"), peer, &config);
/// assert_eq!(resolution.client.to_string(), "203.0.113.9");
/// assert_eq!(resolution.proxy_ip_list().as_deref(), Some("199.83.128.10"));
/// ```
pub fn resolve_chain(
    header: Option<&str>,
    peer: ClientAddr,
    config: &ResolverConfig,
) -> ChainResolution {
    let raw = match header {
        Some(raw) if !raw.is_empty() => raw,
        _ if config.deny_untrusted => return ChainResolution::deny(peer),
        _ => return ChainResolution::accept(peer, Vec::new(), None),
    };

    let mut current = peer;
    let mut hops = Vec::new();
    let mut accepted_any = false;
    let mut unconsumed = Some(raw);

    loop {
        let Some(level) = config.trusted_proxies.matched_trust_level(&current.ip()) else {
            if config.deny_untrusted && !accepted_any {
                return ChainResolution::deny(peer);
            }
            return ChainResolution::accept(current, hops, unconsumed);
        };

        let Some(remaining) = unconsumed else {
            return ChainResolution::accept(current, hops, None);
        };

        let (rest, segment) = match remaining.rfind(',') {
            Some(idx) => (Some(&remaining[..idx]), &remaining[idx + 1..]),
            None => (None, remaining),
        };

        let candidate = segment.trim();
        if candidate.is_empty() {
            debug!(
                header = config.header_name.as_str(),
                proxy = %current,
                "Empty entry in forwarded chain"
            );
            return ChainResolution::accept(current, hops, Some(remaining));
        }

        let ip = match parse_ip(candidate) {
            Ok(ip) => ip,
            Err(_) => {
                debug!(
                    header = config.header_name.as_str(),
                    proxy = %current,
                    entry = candidate,
                    "Forwarded entry is not an IP address"
                );
                return ChainResolution::accept(current, hops, Some(remaining));
            }
        };

        if level == TrustLevel::External && !is_globally_routable(&ip) {
            debug!(
                header = config.header_name.as_str(),
                proxy = %current,
                entry = %ip,
                "External proxy forwarded a private address"
            );
            return ChainResolution::accept(current, hops, Some(remaining));
        }

        if level == TrustLevel::External {
            hops.push(current);
        }
        current = current.with_ip(ip);
        accepted_any = true;
        unconsumed = rest;
    }
}
