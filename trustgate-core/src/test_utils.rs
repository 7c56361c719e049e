//! Test utilities for TrustGate.
//!
//! This module provides shared test configuration types used across unit tests.
//! It is only compiled when running tests (`#[cfg(test)]`).

use std::collections::HashMap;
use std::io;
use std::net::IpAddr;

use hyper::header::HeaderName;

use crate::trusted_proxies::{HostResolver, ProxyDirective, TrustedProxySet};
use crate::types::ResolverConfig;

/// Host resolver answering from a fixed table. Unknown names fail.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    hosts: HashMap<String, Vec<IpAddr>>,
}

impl StaticResolver {
    /// Adds a host name and the addresses it resolves to.
    pub fn with_host(mut self, name: &str, addrs: &[&str]) -> Self {
        let addrs = addrs.iter().map(|a| a.parse().unwrap()).collect();
        self.hosts.insert(name.to_string(), addrs);
        self
    }
}

impl HostResolver for StaticResolver {
    fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        self.hosts
            .get(host)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "unknown host"))
    }
}

/// Shared test configuration for unit tests.
///
/// Builds a [`ResolverConfig`] from directive strings, with defaults matching
/// the production defaults.
#[derive(Debug, Clone, Default)]
pub struct TestConfig {
    pub proxies: Option<Vec<String>>,
    pub header_name: Option<String>,
    pub proxies_header_name: Option<String>,
    pub deny_untrusted: bool,
    pub scope: Option<String>,
}

impl TestConfig {
    /// Create a new test configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the Incapsula defaults with the given directives.
    pub fn with_proxies(mut self, proxies: &[&str]) -> Self {
        self.proxies = Some(proxies.iter().map(|p| p.to_string()).collect());
        self
    }

    /// Set the forwarded chain header.
    pub fn with_header(mut self, name: &str) -> Self {
        self.header_name = Some(name.to_string());
        self
    }

    /// Set the header receiving the stripped proxy list.
    pub fn with_proxies_header(mut self, name: &str) -> Self {
        self.proxies_header_name = Some(name.to_string());
        self
    }

    /// Enable denial of requests without a trusted path.
    pub fn with_deny_untrusted(mut self, deny: bool) -> Self {
        self.deny_untrusted = deny;
        self
    }

    /// Name the scope the configuration belongs to.
    pub fn with_scope(mut self, scope: &str) -> Self {
        self.scope = Some(scope.to_string());
        self
    }

    /// Build the resolver configuration.
    pub fn build(&self) -> ResolverConfig {
        let mut config = match &self.proxies {
            Some(proxies) => {
                let directives: Vec<ProxyDirective> =
                    proxies.iter().map(|p| p.parse().unwrap()).collect();
                let set =
                    TrustedProxySet::from_directives(&directives, &StaticResolver::default())
                        .unwrap();
                ResolverConfig::new(set)
            }
            None => ResolverConfig::default(),
        };

        if let Some(name) = &self.header_name {
            config = config.with_header_name(HeaderName::from_bytes(name.as_bytes()).unwrap());
        }
        if let Some(name) = &self.proxies_header_name {
            config =
                config.with_proxies_header_name(HeaderName::from_bytes(name.as_bytes()).unwrap());
        }
        if let Some(scope) = &self.scope {
            config.scope = scope.clone();
        }
        config.with_deny_untrusted(self.deny_untrusted)
    }
}
