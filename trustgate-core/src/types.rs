//! Resolver configuration and scope selection.
//!
//! A [`ResolverConfig`] is the fully built, immutable configuration one request is
//! resolved with. The global scope is built first; each virtual host then
//! overrides individual fields through [`ResolverSettings`] and inherits the rest
//! from the global scope ("most specific wins"). Built scopes are shared
//! read-only between all connections.

use std::collections::HashMap;
use std::sync::Arc;

use hyper::header::HeaderName;

use crate::defaults;
use crate::error::{Result, TrustGateError};
use crate::headers::{host_without_port, normalize_header_name};
use crate::trusted_proxies::{HostResolver, ProxyDirective, TrustedProxySet};

/// Name of the scope used when no virtual host matches.
pub const GLOBAL_SCOPE: &str = "global";

// ============================================================================
// Built configuration
// ============================================================================

/// Configuration consumed by the chain resolver.
#[derive(Clone, Debug)]
pub struct ResolverConfig {
    /// Scope this configuration belongs to (`global` or a virtual host name).
    pub scope: String,
    /// Header carrying the forwarded address chain.
    pub header_name: HeaderName,
    /// Inbound header that receives the list of stripped external proxies.
    pub proxies_header_name: Option<HeaderName>,
    /// Refuse requests that did not pass through any trusted proxy.
    pub deny_untrusted: bool,
    /// Trusted proxy networks, shared with scopes that inherit them.
    pub trusted_proxies: Arc<TrustedProxySet>,
}

impl ResolverConfig {
    /// Creates a global-scope configuration with the default header and the given proxies.
    pub fn new(trusted_proxies: TrustedProxySet) -> Self {
        Self {
            trusted_proxies: Arc::new(trusted_proxies),
            ..Self::default()
        }
    }

    /// Sets the forwarded chain header.
    pub fn with_header_name(mut self, name: HeaderName) -> Self {
        self.header_name = name;
        self
    }

    /// Sets the header receiving the stripped proxy list.
    pub fn with_proxies_header_name(mut self, name: HeaderName) -> Self {
        self.proxies_header_name = Some(name);
        self
    }

    /// Enables or disables denial of requests without a trusted path.
    pub fn with_deny_untrusted(mut self, deny: bool) -> Self {
        self.deny_untrusted = deny;
        self
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            scope: GLOBAL_SCOPE.to_string(),
            header_name: HeaderName::from_static("incap-client-ip"),
            proxies_header_name: None,
            deny_untrusted: defaults::DENY_UNTRUSTED,
            trusted_proxies: Arc::new(TrustedProxySet::incapsula_defaults()),
        }
    }
}

// ============================================================================
// Unbuilt settings (one per scope)
// ============================================================================

/// Raw per-scope settings; every field is optional and inherited when unset.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolverSettings {
    /// Header carrying the forwarded address chain.
    pub header_name: Option<String>,
    /// Inbound header that receives the list of stripped external proxies.
    pub proxies_header_name: Option<String>,
    /// Trusted proxy directives. An empty list counts as unset.
    pub trusted_proxies: Option<Vec<ProxyDirective>>,
    /// Refuse requests that did not pass through any trusted proxy.
    pub deny_untrusted: Option<bool>,
}

impl ResolverSettings {
    /// Builds the configuration for `scope`, taking unset fields from `parent`.
    ///
    /// Trusted proxy host names are resolved here, once, with `resolver`.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid header name or trusted proxy directive.
    ///
    /// # Example
    ///
    /// ```
    /// use trustgate_core::trusted_proxies::SystemResolver;
    /// use trustgate_core::types::{ResolverConfig, ResolverSettings};
    ///
    /// let global = ResolverConfig::default();
    /// let settings = ResolverSettings {
    ///     deny_untrusted: Some(true),
    ///     ..ResolverSettings::default()
    /// };
    ///
    /// let scoped = settings.build("api.example.com", &global, &SystemResolver).unwrap();
    /// assert!(scoped.deny_untrusted);
    /// assert_eq!(scoped.header_name, global.header_name);
    /// ```
    pub fn build(
        &self,
        scope: &str,
        parent: &ResolverConfig,
        resolver: &impl HostResolver,
    ) -> Result<ResolverConfig> {
        let header_name = match &self.header_name {
            Some(name) => parse_header_name(name)?,
            None => parent.header_name.clone(),
        };

        let proxies_header_name = match &self.proxies_header_name {
            Some(name) => Some(parse_header_name(name)?),
            None => parent.proxies_header_name.clone(),
        };

        let trusted_proxies = match &self.trusted_proxies {
            Some(directives) if !directives.is_empty() => Arc::new(
                TrustedProxySet::from_directives(directives, resolver)?,
            ),
            _ => Arc::clone(&parent.trusted_proxies),
        };

        Ok(ResolverConfig {
            scope: scope.to_string(),
            header_name,
            proxies_header_name,
            deny_untrusted: self.deny_untrusted.unwrap_or(parent.deny_untrusted),
            trusted_proxies,
        })
    }
}

fn parse_header_name(name: &str) -> Result<HeaderName> {
    let normalized = normalize_header_name(name);
    if normalized.is_empty() {
        return Err(TrustGateError::InvalidHeader(
            "header name cannot be empty".to_string(),
        ));
    }
    HeaderName::from_bytes(normalized.as_bytes())
        .map_err(|_| TrustGateError::InvalidHeader(name.to_string()))
}

// ============================================================================
// Scope selection
// ============================================================================

/// Selects the resolver configuration for a request.
///
/// Implement this trait to plug TrustGate into a host with its own notion of
/// virtual hosts.
pub trait ScopeProvider: Send + Sync {
    /// Returns the configuration for the request's `Host`, or the global scope.
    fn scope_for(&self, host: Option<&str>) -> &ResolverConfig;
}

/// Global scope plus virtual host overrides keyed by lowercase host name.
#[derive(Clone, Debug, Default)]
pub struct ResolverScopes {
    global: ResolverConfig,
    virtual_hosts: HashMap<String, ResolverConfig>,
}

impl ResolverScopes {
    /// Creates scopes with only a global configuration.
    pub fn new(global: ResolverConfig) -> Self {
        Self {
            global,
            virtual_hosts: HashMap::new(),
        }
    }

    /// Builds and registers a virtual host inheriting from the global scope.
    pub fn add_virtual_host(
        &mut self,
        host: &str,
        settings: &ResolverSettings,
        resolver: &impl HostResolver,
    ) -> Result<()> {
        let host = host_without_port(host);
        if host.is_empty() {
            return Err(TrustGateError::ConfigError(
                "virtual host name cannot be empty".to_string(),
            ));
        }
        let config = settings.build(&host, &self.global, resolver)?;
        self.virtual_hosts.insert(host, config);
        Ok(())
    }

    /// The global scope.
    pub fn global(&self) -> &ResolverConfig {
        &self.global
    }

    /// Virtual host scopes, in no particular order.
    pub fn virtual_hosts(&self) -> impl Iterator<Item = &ResolverConfig> {
        self.virtual_hosts.values()
    }
}

impl ScopeProvider for ResolverScopes {
    fn scope_for(&self, host: Option<&str>) -> &ResolverConfig {
        host.map(host_without_port)
            .and_then(|host| self.virtual_hosts.get(&host))
            .unwrap_or(&self.global)
    }
}
