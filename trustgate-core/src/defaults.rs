//! Default configuration values for TrustGate.
//!
//! Centralized so the host's environment loader, the resolver scopes and the
//! tests agree on the same values.

/// Default request header carrying the forwarded address chain.
pub const CLIENT_IP_HEADER: &str = "Incap-Client-IP";

/// Incapsula edge networks trusted when no proxies are configured.
pub const TRUSTED_PROXIES: &[&str] = &[
    "199.83.128.0/21",
    "198.143.32.0/19",
    "149.126.72.0/21",
    "103.28.248.0/22",
    "45.64.64.0/22",
    "185.11.124.0/22",
    "192.230.64.0/18",
];

/// Requests are not denied for lacking a trusted path unless asked to.
pub const DENY_UNTRUSTED: bool = false;

/// Default maximum concurrent connections.
pub const MAX_CONNECTIONS: usize = 10_000;

/// Default time allowed for live connections to drain on shutdown, in seconds.
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 30;
