//! TrustGate - Real client addresses behind trusted proxies
//!
//! A small HTTP server that resolves the real client address of every request
//! relayed by a CDN or load balancer and answers with it.
//!
//! # Overview
//!
//! TrustGate provides:
//! - Trusted proxy configuration from environment variables (Incapsula edge
//!   networks by default)
//! - Per virtual host overrides from a TOML file
//! - Right-to-left validation of the forwarded chain header
//! - Keep-alive aware resolution caching per connection
//! - Structured logging with JSON support
//!
//! # Example
//!
//! ```rust,no_run
//! use trustgate::config;
//! use trustgate_core::SystemResolver;
//!
//! // Build resolver scopes from the environment
//! let scopes = config::load_scopes(None, &SystemResolver).unwrap();
//! println!("{} trusted networks", scopes.global().trusted_proxies.len());
//! ```
//!
//! # Modules
//!
//! - [`config`] - Configuration management from environment variables and files
//! - [`env_vars`] - Environment variable constants
//! - [`server`] - Startup info and the accept loop
//! - [`connection`] - Connection tracking and limiting
//! - [`args`] - Command line argument parsing
//!
//! # Re-exports from trustgate-core
//!
//! Core functionality is provided by the `trustgate-core` crate:
//! - [`resolver`] - The forwarded chain walk
//! - [`request_handler`] - HTTP request processing
//! - [`types`] - Resolver configuration and scopes

#![forbid(unsafe_code)]

pub mod args;
pub mod config;
pub mod connection;
pub mod env_vars;
pub mod server;

// Re-export trustgate-core modules
pub use trustgate_core::request_handler;
pub use trustgate_core::resolver;
pub use trustgate_core::types;

// Re-export commonly used items at crate root
pub use config::{
    get_client_ip_header, get_deny_untrusted, get_max_connections, get_proxy_ips_header,
    get_shutdown_timeout, get_trusted_proxies, load_scopes,
};
pub use trustgate_core::{
    ChainResolution, ClientAddr, ConnectionContext, ResolverConfig, ResolverScopes,
    ScopeProvider, TrustDecision, TrustGateError, TrustLevel, TrustedProxySet,
};
