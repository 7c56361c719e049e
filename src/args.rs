//! Command line argument parsing for TrustGate.
//!
//! This module defines the CLI interface using [`clap`] for argument parsing.
//! It provides the listening address, the optional virtual host file and
//! output verbosity.
//!
//! # Example
//!
//! ```no_run
//! use trustgate::args::Args;
//! use clap::Parser;
//!
//! let args = Args::parse();
//! if let Err(e) = args.validate() {
//!     eprintln!("Configuration error: {}", e);
//!     std::process::exit(1);
//! }
//! ```

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;

/// Command line arguments for TrustGate.
///
/// Resolver settings come from environment variables; the CLI only controls
/// where to listen, which virtual host file to load and how much to print.
#[derive(Debug, Parser)]
#[command(name = env!("CARGO_PKG_NAME"))]
#[command(about = env!("CARGO_PKG_DESCRIPTION"))]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    long_about = "Resolves the real client address of requests relayed by trusted proxies\nand answers every request with the address it was attributed to.\n\nExample usage:\n  trustgate --listen 8080\n  trustgate -l 8080 --vhosts vhosts.toml --verbose"
)]
#[command(
    after_help = "Environment variables:\n  CLIENT_IP_HEADER       Header carrying the forwarded chain (default: Incap-Client-IP)\n  PROXY_IPS_HEADER       Header receiving the crossed proxy list\n  TRUSTED_PROXIES        Trusted proxies, comma-separated (prefix internal: for internal)\n  TRUSTED_PROXIES_VAR    Alternative variable holding the trusted proxies\n  DENY_UNTRUSTED         Deny requests without a trusted path (default: false)\n  MAX_CONNECTIONS        Concurrent connection limit, 0 = unlimited (default: 10000)\n  SHUTDOWN_TIMEOUT_SECS  Connection drain timeout on shutdown (default: 30)"
)]
pub struct Args {
    /// Address to bind to
    #[arg(
        long,
        short = 'b',
        help = "Bind address for listening",
        value_name = "ADDRESS",
        default_value = "0.0.0.0"
    )]
    pub bind: String,

    /// Port to listen on for incoming requests
    #[arg(
        long,
        short = 'l',
        help = "Listen port for incoming connections",
        value_name = "PORT"
    )]
    pub listen: u16,

    /// Virtual host configuration file
    #[arg(
        long,
        help = "TOML file with per virtual host resolver settings",
        value_name = "FILE"
    )]
    pub vhosts: Option<PathBuf>,

    /// Enable verbose output
    #[arg(
        long,
        short = 'v',
        help = "Show detailed configuration and startup information"
    )]
    pub verbose: bool,

    /// Enable quiet mode (minimal output)
    #[arg(
        long,
        short = 'q',
        help = "Suppress configuration output, show only essential messages",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,

    /// Output logs in JSON format (for structured logging)
    #[arg(long, help = "Output logs in JSON format for structured logging")]
    pub json_logs: bool,
}

impl Args {
    /// Validates the parsed command line arguments.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If all arguments are valid
    /// * `Err(String)` - A descriptive error message if validation fails
    ///
    /// # Example
    ///
    /// ```
    /// use trustgate::args::Args;
    /// use clap::Parser;
    ///
    /// let args = Args::try_parse_from(["trustgate", "-l", "0"]).unwrap();
    /// assert!(args.validate().is_err());
    ///
    /// let args = Args::try_parse_from(["trustgate", "-l", "8080"]).unwrap();
    /// assert!(args.validate().is_ok());
    /// ```
    pub fn validate(&self) -> Result<(), String> {
        if self.listen == 0 {
            return Err("Listen port must be greater than 0".to_string());
        }

        if self.bind.parse::<IpAddr>().is_err() {
            return Err(format!("Invalid bind address: '{}'", self.bind));
        }

        if let Some(path) = &self.vhosts
            && !path.is_file()
        {
            return Err(format!(
                "Virtual host file not found: '{}'",
                path.display()
            ));
        }

        Ok(())
    }

    /// Socket address to listen on. Call after [`Args::validate`].
    pub fn listen_addr(&self) -> Result<SocketAddr, String> {
        let ip: IpAddr = self
            .bind
            .parse()
            .map_err(|_| format!("Invalid bind address: '{}'", self.bind))?;
        Ok(SocketAddr::from((ip, self.listen)))
    }
}
