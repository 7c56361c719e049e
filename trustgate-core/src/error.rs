//! Error types for TrustGate.
//!
//! Configuration problems are fatal at load time. Problems found while walking a
//! forwarded chain are recovered locally and never surface as errors; the only
//! request-time error is a denial of a request that arrived without a trusted
//! forwarding path.

use thiserror::Error;

/// Result type alias for TrustGate operations.
pub type Result<T> = std::result::Result<T, TrustGateError>;

/// Unified error type for TrustGate operations.
///
/// # Example
///
/// ```
/// use trustgate_core::error::{Result, TrustGateError};
///
/// fn require_header_name(name: &str) -> Result<()> {
///     if name.is_empty() {
///         return Err(TrustGateError::ConfigError("header name cannot be empty".into()));
///     }
///     Ok(())
/// }
///
/// assert!(require_header_name("").is_err());
/// ```
#[derive(Debug, Error)]
pub enum TrustGateError {
    /// Text that does not parse as an IPv4 or IPv6 address.
    #[error("Invalid IP address: {0}")]
    InvalidIp(String),

    /// A trusted proxy entry whose address or mask is malformed.
    #[error("Invalid trusted proxy subnet {entry}: {reason}")]
    InvalidSubnet {
        /// The directive as configured.
        entry: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A trusted proxy host name that could not be resolved at load time.
    #[error("Cannot resolve trusted proxy host {host}: {reason}")]
    UnresolvableHost {
        /// The host name as configured.
        host: String,
        /// Resolver failure description.
        reason: String,
    },

    /// Configuration error (missing, unreadable or invalid values).
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Request refused because it did not come through a trusted proxy.
    #[error("Request from {0} denied: no trusted forwarding path")]
    Untrusted(String),

    /// Invalid HTTP header name or value.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),
}

impl TrustGateError {
    /// Returns the appropriate HTTP status code for this error.
    pub fn status_code(&self) -> hyper::StatusCode {
        use hyper::StatusCode;

        match self {
            Self::InvalidIp(_) => StatusCode::BAD_REQUEST,
            Self::InvalidSubnet { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::UnresolvableHost { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Untrusted(_) => StatusCode::FORBIDDEN,
            Self::InvalidHeader(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Returns a sanitized message suitable for HTTP responses.
    ///
    /// Never exposes addresses or configuration details to the client.
    pub fn user_message(&self) -> &str {
        match self {
            Self::InvalidIp(_) => "Bad request",
            Self::InvalidSubnet { .. } | Self::UnresolvableHost { .. } | Self::ConfigError(_) => {
                "Internal server error"
            }
            Self::Untrusted(_) => "Forbidden",
            Self::InvalidHeader(_) => "Bad request",
        }
    }

    /// Returns true if this error should be logged at error level.
    ///
    /// Denials are expected traffic and only warrant a warning.
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidSubnet { .. } | Self::UnresolvableHost { .. } | Self::ConfigError(_)
        )
    }
}
