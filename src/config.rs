//! Configuration management for TrustGate.
//!
//! This module handles loading and caching configuration from environment
//! variables, and loading the optional virtual host file. Scalar values are
//! computed once at first access and cached for the lifetime of the application
//! using `once_cell::sync::Lazy`.
//!
//! # Layering
//!
//! - Environment variables define the global resolver scope.
//! - The virtual host file (TOML) overrides individual settings per `Host`;
//!   anything it leaves out is inherited from the global scope.
//!
//! Invalid scalar values log a warning and fall back to defaults. Invalid
//! trusted proxy directives, header names and virtual host files are errors:
//! the server refuses to start with a configuration it cannot honor.
//!
//! # Example
//!
//! ```
//! use trustgate::config;
//!
//! println!("Forwarded header: {}", config::get_client_ip_header());
//! println!("Deny untrusted: {}", config::get_deny_untrusted());
//! ```

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use once_cell::sync::Lazy;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::env_vars;
use trustgate_core::defaults;
use trustgate_core::types::GLOBAL_SCOPE;
use trustgate_core::{
    HostResolver, ProxyDirective, ResolverConfig, ResolverScopes, ResolverSettings, Result,
    TrustGateError,
};

// ============================================================================
// Cached Configuration (computed once at first access)
// ============================================================================

static CLIENT_IP_HEADER: Lazy<String> = Lazy::new(compute_client_ip_header);
static PROXY_IPS_HEADER: Lazy<Option<String>> = Lazy::new(compute_proxy_ips_header);
static TRUSTED_PROXIES: Lazy<Option<Vec<String>>> =
    Lazy::new(|| compute_trusted_proxies_internal(|key| env::var(key)));
static DENY_UNTRUSTED: Lazy<bool> = Lazy::new(compute_deny_untrusted);
static MAX_CONNECTIONS: Lazy<usize> = Lazy::new(compute_max_connections);
static SHUTDOWN_TIMEOUT: Lazy<Duration> = Lazy::new(compute_shutdown_timeout);

/// Whitelisted environment variable names for trusted proxies.
///
/// This prevents arbitrary environment variable disclosure via `TRUSTED_PROXIES_VAR`.
const ALLOWED_PROXY_VAR_NAMES: &[&str] = &[
    "TRUSTED_PROXY_IPS",
    "REVERSE_PROXY_IPS",
    "CDN_PROXY_IPS",
    "INCAPSULA_PROXY_IPS",
    "PROXY_IPS",
];

// ============================================================================
// Internal Helpers
// ============================================================================

/// Parses an environment variable with fallback to a default value.
///
/// Logs a warning if the value exists but cannot be parsed.
fn parse_env_var_or_default<T>(var_name: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match env::var(var_name) {
        Ok(value) => match value.trim().parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!(var = var_name, value = %value, "Invalid env var value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

/// Parses a boolean flag: `true/1/yes/on` or `false/0/no/off`, case-insensitive.
fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parses a comma-separated string into a Vec of trimmed strings.
///
/// Filters out empty entries after trimming.
fn parse_comma_separated(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_directives(entries: &[String]) -> Result<Vec<ProxyDirective>> {
    entries.iter().map(|entry| entry.parse()).collect()
}

// ============================================================================
// Public Configuration Getters
// ============================================================================

/// Returns the cached name of the header carrying the forwarded chain.
///
/// Read from `CLIENT_IP_HEADER`, default `Incap-Client-IP`.
pub fn get_client_ip_header() -> &'static str {
    &CLIENT_IP_HEADER
}

fn compute_client_ip_header() -> String {
    env::var(env_vars::CLIENT_IP_HEADER)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| defaults::CLIENT_IP_HEADER.to_string())
}

/// Returns the cached name of the header receiving the crossed proxy list, if any.
///
/// Read from `PROXY_IPS_HEADER`.
pub fn get_proxy_ips_header() -> Option<&'static str> {
    PROXY_IPS_HEADER.as_deref()
}

fn compute_proxy_ips_header() -> Option<String> {
    env::var(env_vars::PROXY_IPS_HEADER)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Returns the cached trusted proxy directives, if configured.
///
/// When `None`, the Incapsula edge networks are trusted.
///
/// Configuration is read from environment variables on first access:
/// - `TRUSTED_PROXIES`: Primary variable for trusted proxy directives
/// - `TRUSTED_PROXIES_VAR`: Alternative variable name (must be whitelisted)
///
/// # Example
///
/// ```
/// use trustgate::config::get_trusted_proxies;
///
/// match get_trusted_proxies() {
///     Some(entries) => println!("{} trusted proxy directives", entries.len()),
///     None => println!("Trusting Incapsula edge networks"),
/// }
/// ```
pub fn get_trusted_proxies() -> Option<&'static [String]> {
    TRUSTED_PROXIES.as_deref()
}

/// Computes trusted proxy directives from environment variables.
fn compute_trusted_proxies_internal<F>(env_var: F) -> Option<Vec<String>>
where
    F: Fn(&str) -> std::result::Result<String, env::VarError>,
{
    // Try primary variable first
    if let Ok(entries) = env_var(env_vars::TRUSTED_PROXIES)
        && !entries.trim().is_empty()
    {
        return Some(parse_comma_separated(&entries));
    }

    // Try user-defined alternative variable if set (only from whitelist)
    if let Ok(alt_var_name) = env_var(env_vars::TRUSTED_PROXIES_VAR) {
        if !ALLOWED_PROXY_VAR_NAMES.contains(&alt_var_name.as_str()) {
            warn!(
                var = %alt_var_name,
                allowed = ?ALLOWED_PROXY_VAR_NAMES,
                "Invalid TRUSTED_PROXIES_VAR value"
            );
        } else if let Ok(entries) = env_var(&alt_var_name)
            && !entries.trim().is_empty()
        {
            return Some(parse_comma_separated(&entries));
        }
    }

    None
}

/// Returns whether requests without a trusted forwarding path are denied.
///
/// Read from `DENY_UNTRUSTED`, default `false`.
pub fn get_deny_untrusted() -> bool {
    *DENY_UNTRUSTED
}

fn compute_deny_untrusted() -> bool {
    match env::var(env_vars::DENY_UNTRUSTED) {
        Ok(value) => parse_flag(&value).unwrap_or_else(|| {
            warn!(
                var = env_vars::DENY_UNTRUSTED,
                value = %value,
                "Invalid env var value, using default"
            );
            defaults::DENY_UNTRUSTED
        }),
        Err(_) => defaults::DENY_UNTRUSTED,
    }
}

/// Returns the maximum number of concurrent connections.
///
/// Read from `MAX_CONNECTIONS`, default 10000. 0 means unlimited.
pub fn get_max_connections() -> usize {
    *MAX_CONNECTIONS
}

fn compute_max_connections() -> usize {
    parse_env_var_or_default(env_vars::MAX_CONNECTIONS, defaults::MAX_CONNECTIONS)
}

/// Returns how long live connections may drain on shutdown.
///
/// Read from `SHUTDOWN_TIMEOUT_SECS`, default 30 seconds.
pub fn get_shutdown_timeout() -> Duration {
    *SHUTDOWN_TIMEOUT
}

fn compute_shutdown_timeout() -> Duration {
    Duration::from_secs(parse_env_var_or_default(
        env_vars::SHUTDOWN_TIMEOUT_SECS,
        defaults::SHUTDOWN_TIMEOUT_SECS,
    ))
}

// ============================================================================
// Resolver Scopes
// ============================================================================

/// Returns the global resolver settings described by the environment.
///
/// # Errors
///
/// Returns an error when a trusted proxy directive is malformed.
pub fn global_settings() -> Result<ResolverSettings> {
    Ok(ResolverSettings {
        header_name: Some(get_client_ip_header().to_string()),
        proxies_header_name: get_proxy_ips_header().map(str::to_string),
        trusted_proxies: get_trusted_proxies().map(parse_directives).transpose()?,
        deny_untrusted: Some(get_deny_untrusted()),
    })
}

/// Virtual host file contents.
///
/// ```toml
/// [virtual-hosts."api.example.com"]
/// client-ip-header = "X-Forwarded-For"
/// trusted-proxies = ["internal:10.0.0.0/8", "lb.example.com"]
/// deny-untrusted = true
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct VirtualHostFile {
    #[serde(default)]
    pub virtual_hosts: BTreeMap<String, VirtualHostSettings>,
}

/// Settings of one virtual host; unset fields are inherited.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct VirtualHostSettings {
    pub client_ip_header: Option<String>,
    pub proxy_ips_header: Option<String>,
    pub trusted_proxies: Option<Vec<String>>,
    pub deny_untrusted: Option<bool>,
}

impl VirtualHostSettings {
    fn to_resolver_settings(&self) -> Result<ResolverSettings> {
        Ok(ResolverSettings {
            header_name: self.client_ip_header.clone(),
            proxies_header_name: self.proxy_ips_header.clone(),
            trusted_proxies: self
                .trusted_proxies
                .as_deref()
                .map(parse_directives)
                .transpose()?,
            deny_untrusted: self.deny_untrusted,
        })
    }
}

impl FromStr for VirtualHostFile {
    type Err = TrustGateError;

    fn from_str(text: &str) -> Result<Self> {
        toml::from_str(text)
            .map_err(|e| TrustGateError::ConfigError(format!("invalid virtual host file: {e}")))
    }
}

/// Reads and parses a virtual host file.
pub fn load_virtual_hosts(path: &Path) -> Result<VirtualHostFile> {
    let text = fs::read_to_string(path).map_err(|e| {
        TrustGateError::ConfigError(format!("cannot read {}: {e}", path.display()))
    })?;
    text.parse()
}

/// Builds every resolver scope from global settings and virtual hosts.
///
/// Trusted proxy host names are resolved here, once, with `resolver`.
pub fn build_scopes(
    global: &ResolverSettings,
    virtual_hosts: &VirtualHostFile,
    resolver: &impl HostResolver,
) -> Result<ResolverScopes> {
    let global = global.build(GLOBAL_SCOPE, &ResolverConfig::default(), resolver)?;
    let mut scopes = ResolverScopes::new(global);

    for (host, settings) in &virtual_hosts.virtual_hosts {
        let settings = settings.to_resolver_settings()?;
        scopes.add_virtual_host(host, &settings, resolver)?;
        debug!(host = %host, "Loaded virtual host scope");
    }

    Ok(scopes)
}

/// Loads the complete configuration: environment plus optional virtual host file.
///
/// # Errors
///
/// Any configuration error is fatal for the caller.
pub fn load_scopes(vhosts: Option<&Path>, resolver: &impl HostResolver) -> Result<ResolverScopes> {
    let virtual_hosts = match vhosts {
        Some(path) => load_virtual_hosts(path)?,
        None => VirtualHostFile::default(),
    };
    build_scopes(&global_settings()?, &virtual_hosts, resolver)
}
