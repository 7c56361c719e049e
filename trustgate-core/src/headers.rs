//! HTTP header and note names used by TrustGate.
//!
//! Header names are lowercase, the form `hyper::header::HeaderName` stores.

/// Host header, used to select a virtual host scope.
pub const HOST: &str = "host";

/// Content-Type header.
pub const CONTENT_TYPE: &str = "content-type";

/// Response header echoing the resolved client IP.
pub const X_REAL_IP: &str = "x-real-ip";

/// Response header echoing the trusted proxy chain note.
pub const X_PROXY_IP_LIST: &str = "x-proxy-ip-list";

/// Name of the per-request note listing the external proxies that were stripped.
pub const PROXY_IP_LIST_NOTE: &str = "proxy-ip-list";

/// Normalizes a configured header name for lookups.
///
/// # Example
///
/// ```
/// use trustgate_core::headers::normalize_header_name;
///
/// assert_eq!(normalize_header_name(" Incap-Client-IP "), "incap-client-ip");
/// ```
pub fn normalize_header_name(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

/// Returns the host part of a `Host` header value, lowercased and without port.
///
/// Bracketed IPv6 literals keep their brackets.
///
/// # Example
///
/// ```
/// use trustgate_core::headers::host_without_port;
///
/// assert_eq!(host_without_port("API.Example.com:8443"), "api.example.com");
/// assert_eq!(host_without_port("[2001:db8::1]:80"), "[2001:db8::1]");
/// ```
pub fn host_without_port(host: &str) -> String {
    let host = host.trim();
    let bare = if host.starts_with('[') {
        match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        }
    } else {
        match host.rsplit_once(':') {
            Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
            _ => host,
        }
    };
    bare.to_ascii_lowercase()
}
