//! Applying chain resolutions to requests and connections.
//!
//! A [`ConnectionContext`] is created when a connection is accepted and lives
//! exactly as long as it. [`bind_request`] runs once per request: it reads the
//! forwarded header, asks the connection's trust cache for a resolution, then
//! either refuses the request or rewrites the connection's effective peer and
//! annotates the request.

use hyper::Request;
use hyper::header::HeaderValue;
use tracing::{debug, info, warn};

use crate::address::ClientAddr;
use crate::error::{Result, TrustGateError};
use crate::resolver::ChainResolution;
use crate::trust_cache::{ConnectionTrustCache, PeerAddress};
use crate::types::ResolverConfig;

/// Resolved client recorded as a request extension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedClient {
    /// Address the request is attributed to.
    pub addr: ClientAddr,
    /// Textual form of the client IP.
    pub ip: String,
}

/// The `proxy-ip-list` note: external proxies crossed, joined with `", "`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxyChainNote(pub String);

/// Observable peer of one connection.
#[derive(Clone, Debug)]
pub struct ConnectionPeer {
    socket_addr: ClientAddr,
    effective: ClientAddr,
    remote_host: Option<String>,
    remote_logname: Option<String>,
}

impl ConnectionPeer {
    fn new(socket_addr: ClientAddr) -> Self {
        Self {
            socket_addr,
            effective: socket_addr,
            remote_host: None,
            remote_logname: None,
        }
    }
}

impl PeerAddress for ConnectionPeer {
    fn peer_addr(&self) -> ClientAddr {
        self.effective
    }

    fn set_peer_addr(&mut self, addr: ClientAddr) {
        self.effective = addr;
    }
}

/// Per-connection state: the observable peer and its trust cache.
#[derive(Clone, Debug)]
pub struct ConnectionContext {
    peer: ConnectionPeer,
    trust: ConnectionTrustCache,
}

impl ConnectionContext {
    /// Creates the context for a freshly accepted connection.
    pub fn new(socket_addr: impl Into<ClientAddr>) -> Self {
        Self {
            peer: ConnectionPeer::new(socket_addr.into()),
            trust: ConnectionTrustCache::new(),
        }
    }

    /// Address of the TCP peer.
    pub fn socket_addr(&self) -> ClientAddr {
        self.peer.socket_addr
    }

    /// Address the connection is currently attributed to.
    pub fn client_addr(&self) -> ClientAddr {
        self.peer.effective
    }

    /// Reverse-DNS name of the peer, if the host looked one up.
    pub fn remote_host(&self) -> Option<&str> {
        self.peer.remote_host.as_deref()
    }

    /// Identity reported by the peer, if the host obtained one.
    pub fn remote_logname(&self) -> Option<&str> {
        self.peer.remote_logname.as_deref()
    }

    /// Records the reverse-DNS name of the peer.
    pub fn set_remote_host(&mut self, host: impl Into<String>) {
        self.peer.remote_host = Some(host.into());
    }

    /// Records the identity reported by the peer.
    pub fn set_remote_logname(&mut self, logname: impl Into<String>) {
        self.peer.remote_logname = Some(logname.into());
    }

    /// The connection's trust cache.
    pub fn trust_cache(&self) -> &ConnectionTrustCache {
        &self.trust
    }

    fn apply(&mut self, resolution: &ChainResolution) -> bool {
        self.peer.set_peer_addr(resolution.client);
        let original = self.trust.original_addr().unwrap_or(self.peer.socket_addr);
        let rewritten = resolution.client != original;
        if rewritten {
            self.peer.remote_host = None;
            self.peer.remote_logname = None;
        }
        rewritten
    }
}

/// Resolves and applies the client address for one request.
///
/// On success the request carries a [`ResolvedClient`] extension and, when
/// external proxies were crossed, a [`ProxyChainNote`] extension plus the
/// configured proxy list header.
///
/// # Errors
///
/// Returns [`TrustGateError::Untrusted`] when the request must be refused.
pub fn bind_request<B>(
    req: &mut Request<B>,
    conn: &mut ConnectionContext,
    config: &ResolverConfig,
) -> Result<ResolvedClient> {
    let header = req
        .headers()
        .get(&config.header_name)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned());

    let resolution = conn.trust.resolve(header.as_deref(), &mut conn.peer, config);

    if resolution.is_denied() {
        warn!(
            peer = %conn.socket_addr(),
            header = config.header_name.as_str(),
            scope = %config.scope,
            "Denying request without a trusted forwarding path"
        );
        return Err(TrustGateError::Untrusted(conn.socket_addr().to_string()));
    }

    let rewritten = conn.apply(&resolution);
    let proxy_list = resolution.proxy_ip_list();

    if rewritten {
        match &proxy_list {
            Some(proxies) => info!(
                client = %resolution.client,
                proxies = %proxies,
                "Using forwarded client IP"
            ),
            None => info!(
                client = %resolution.client,
                "Using forwarded client IP by internal proxies"
            ),
        }
    }

    if let Some(remainder) = &resolution.remainder {
        debug!(remainder = %remainder, "Unresolved part of forwarded chain");
    }

    let client = ResolvedClient {
        addr: resolution.client,
        ip: resolution.client.to_string(),
    };
    req.extensions_mut().insert(client.clone());

    if let Some(proxies) = proxy_list {
        if let Some(name) = &config.proxies_header_name
            && let Ok(value) = HeaderValue::from_str(&proxies)
        {
            req.headers_mut().insert(name.clone(), value);
        }
        req.extensions_mut().insert(ProxyChainNote(proxies));
    }

    Ok(client)
}
