//! Per-connection memo of the last chain resolution.
//!
//! A keep-alive connection usually repeats the same forwarded header on every
//! request, so the cache replays the previous resolution while the header value
//! and the scope stay the same. When either changes, the peer address is first
//! put back to the socket address captured on the first request and the chain
//! is resolved again from there, so a rewrite from one request never leaks into
//! the next.

use crate::address::ClientAddr;
use crate::resolver::{ChainResolution, resolve_chain};
use crate::types::ResolverConfig;

/// Read and write access to a connection's peer address.
pub trait PeerAddress {
    /// Address currently reported as the connection's peer.
    fn peer_addr(&self) -> ClientAddr;

    /// Replace the address reported as the connection's peer.
    fn set_peer_addr(&mut self, addr: ClientAddr);
}

/// State remembered between requests on one connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionTrustRecord {
    original: ClientAddr,
    header: Option<String>,
    scope: String,
    resolution: ChainResolution,
}

impl ConnectionTrustRecord {
    /// Socket peer as seen before the first rewrite.
    pub fn original(&self) -> ClientAddr {
        self.original
    }

    /// Header value the cached resolution was computed from.
    pub fn header(&self) -> Option<&str> {
        self.header.as_deref()
    }

    /// Scope the cached resolution was computed in.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// The cached resolution.
    pub fn resolution(&self) -> &ChainResolution {
        &self.resolution
    }
}

/// Lazily created cache, one per connection.
#[derive(Clone, Debug, Default)]
pub struct ConnectionTrustCache {
    record: Option<ConnectionTrustRecord>,
}

impl ConnectionTrustCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves the client for one request, reusing the previous result when possible.
    ///
    /// On the first call the peer's current address is captured as the
    /// connection's original address. When `header` or the scope of `config`
    /// differ from the cached ones, `peer` is reset to that original address
    /// before resolving. The caller applies the returned resolution to `peer`.
    pub fn resolve(
        &mut self,
        header: Option<&str>,
        peer: &mut impl PeerAddress,
        config: &ResolverConfig,
    ) -> ChainResolution {
        let original = match &self.record {
            Some(record) if record.header.as_deref() == header && record.scope == config.scope => {
                return record.resolution.clone();
            }
            Some(record) => {
                peer.set_peer_addr(record.original);
                record.original
            }
            None => peer.peer_addr(),
        };

        let resolution = resolve_chain(header, original, config);
        self.record = Some(ConnectionTrustRecord {
            original,
            header: header.map(str::to_string),
            scope: config.scope.clone(),
            resolution: resolution.clone(),
        });
        resolution
    }

    /// Socket peer captured on the first request, if any request was seen.
    pub fn original_addr(&self) -> Option<ClientAddr> {
        self.record.as_ref().map(|r| r.original)
    }

    /// The cached record, if any request was seen.
    pub fn record(&self) -> Option<&ConnectionTrustRecord> {
        self.record.as_ref()
    }
}
