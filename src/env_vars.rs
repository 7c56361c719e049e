//! Environment variable names used throughout TrustGate configuration

/// Forwarded chain headers
pub const CLIENT_IP_HEADER: &str = "CLIENT_IP_HEADER";
pub const PROXY_IPS_HEADER: &str = "PROXY_IPS_HEADER";

/// Trusted proxy configuration
pub const TRUSTED_PROXIES: &str = "TRUSTED_PROXIES";
pub const TRUSTED_PROXIES_VAR: &str = "TRUSTED_PROXIES_VAR";
pub const DENY_UNTRUSTED: &str = "DENY_UNTRUSTED";

/// Connection handling
pub const MAX_CONNECTIONS: &str = "MAX_CONNECTIONS";
pub const SHUTDOWN_TIMEOUT_SECS: &str = "SHUTDOWN_TIMEOUT_SECS";

/// Get all environment variable names for documentation/validation
pub fn all_env_vars() -> &'static [&'static str] {
    &[
        CLIENT_IP_HEADER,
        PROXY_IPS_HEADER,
        TRUSTED_PROXIES,
        TRUSTED_PROXIES_VAR,
        DENY_UNTRUSTED,
        MAX_CONNECTIONS,
        SHUTDOWN_TIMEOUT_SECS,
    ]
}
