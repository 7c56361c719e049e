//! TrustGate Core - Trusted proxy client address resolution
//!
//! This crate recovers the real client address of requests that reach a server
//! through a CDN or load balancer:
//! - Trusted proxy sets with internal and external trust levels
//! - Right-to-left validation of forwarded address chains
//! - Private address rejection for external proxies
//! - Per-connection resolution cache that reverts rewrites on keep-alive
//!   connections when the forwarded header changes
//!
//! # Overview
//!
//! `trustgate-core` is framework-agnostic at its center: [`resolve_chain`] is a
//! pure function of a header value, a peer address and a [`ResolverConfig`].
//! [`ConnectionContext`] and [`bind_request`] apply the result to hyper
//! requests, and [`request_handler`] answers requests with the resolved client.
//!
//! # Example
//!
//! ```rust
//! use std::net::SocketAddr;
//! use trustgate_core::{ConnectionContext, ResolverConfig, bind_request};
//!
//! let config = ResolverConfig::default();
//! let peer: SocketAddr = "199.83.128.10:443".parse().unwrap();
//! let mut conn = ConnectionContext::new(peer);
//!
//! let mut req = hyper::Request::builder()
//!     .header("Incap-Client-IP", "198.51.100.7")
//!     .body(())
//!     .unwrap();
//!
//! let client = bind_request(&mut req, &mut conn, &config).unwrap();
//! assert_eq!(client.ip, "198.51.100.7");
//! ```
//!
//! # Modules
//!
//! - [`address`] - IP literal parsing and routability checks
//! - [`trusted_proxies`] - Trusted proxy directives and sets
//! - [`resolver`] - The forwarded chain walk
//! - [`trust_cache`] - Per-connection resolution cache
//! - [`binder`] - Applying resolutions to connections and requests
//! - [`types`] - Resolver configuration and scopes
//! - [`error`] - Error types and result aliases
//! - [`headers`] - HTTP header constants
//! - [`request_handler`] - HTTP request processing

#![forbid(unsafe_code)]

pub mod address;
pub mod binder;
pub mod defaults;
pub mod error;
pub mod headers;
pub mod request_handler;
pub mod resolver;
#[cfg(test)]
pub mod test_utils;
pub mod trust_cache;
pub mod trusted_proxies;
pub mod types;

// Re-export commonly used items at crate root
pub use address::ClientAddr;
pub use binder::{ConnectionContext, ProxyChainNote, ResolvedClient, bind_request};
pub use error::{Result, TrustGateError};
pub use resolver::{ChainResolution, TrustDecision, resolve_chain};
pub use trust_cache::{ConnectionTrustCache, PeerAddress};
pub use trusted_proxies::{
    HostResolver, ProxyDirective, SystemResolver, TrustLevel, TrustedProxySet,
};
pub use types::{ResolverConfig, ResolverScopes, ResolverSettings, ScopeProvider};
