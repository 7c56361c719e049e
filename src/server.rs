//! Server utilities: startup banner and the accept loop.
//!
//! Each accepted connection gets its own tokio task, its own
//! [`ConnectionContext`] and therefore its own trust cache. The context is
//! shared by the requests of that connection only.

use std::env;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::connection::{ConnectionLimiter, ConnectionTracker};
use crate::{args::Args, config, env_vars};
use trustgate_core::{ConnectionContext, ResolverConfig, ResolverScopes, ScopeProvider};
use trustgate_core::request_handler::handle_request;

/// Print startup banner with configuration
pub fn print_startup_info(args: &Args, scopes: &ResolverScopes) {
    if args.quiet {
        // Quiet mode: only essential information
        println!(
            "🚀 TrustGate v{} starting on port {}",
            env!("CARGO_PKG_VERSION"),
            args.listen
        );
        return;
    }

    // Normal/verbose mode: full configuration display
    println!("🛡️  {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    println!("   {}", env!("CARGO_PKG_DESCRIPTION"));
    println!();
    println!("📡 Network Configuration:");
    println!("   Bind Address:   {}", args.bind);
    println!("   Listen Port:    {}", args.listen);
    match config::get_max_connections() {
        0 => println!("   Connections:    unlimited"),
        max => println!("   Connections:    {max} max"),
    }
    println!();

    println!("🔒 Trust Configuration:");
    print_scope(scopes.global());

    let mut hosts: Vec<&ResolverConfig> = scopes.virtual_hosts().collect();
    hosts.sort_by(|a, b| a.scope.cmp(&b.scope));
    for scope in hosts {
        println!();
        println!("🌐 Virtual Host {}:", scope.scope);
        print_scope(scope);
    }

    // Show environment configuration in verbose mode
    if args.verbose {
        print_env_config();
    }

    println!();
    println!("🚀 Server starting...");
}

/// Print one resolver scope
fn print_scope(scope: &ResolverConfig) {
    println!("   Client Header:  {}", scope.header_name);
    if let Some(name) = &scope.proxies_header_name {
        println!("   Proxy Header:   {name}");
    }
    println!(
        "   Mode:           {}",
        if scope.deny_untrusted {
            "Strict (untrusted requests denied)"
        } else {
            "Permissive (untrusted requests keep their peer address)"
        }
    );
    println!("   Trusted:        {} networks", scope.trusted_proxies.len());
    for entry in scope.trusted_proxies.iter() {
        println!("     - {} ({})", entry.subnet(), entry.level());
    }
}

/// Print environment variable configuration status (used in verbose mode)
fn print_env_config() {
    println!();
    println!("🔧 Environment Variables:");

    for &var_name in env_vars::all_env_vars() {
        match env::var(var_name) {
            Ok(value) => println!("   {var_name:<25} = {value}"),
            Err(_) => println!("   {var_name:<25} = [NOT SET]"),
        }
    }
}

/// Accepts connections until `shutdown` completes, then drains live connections.
///
/// Connections over the limiter's capacity are closed immediately. Once
/// `shutdown` resolves the listener is dropped, keep-alive connections are
/// asked to close after their in-flight request, and the call waits up to
/// `drain_timeout` for them.
///
/// Returns true when every connection finished within the timeout.
pub async fn serve<S>(
    listener: TcpListener,
    scopes: Arc<S>,
    limiter: ConnectionLimiter,
    drain_timeout: Duration,
    shutdown: impl Future<Output = ()>,
) -> bool
where
    S: ScopeProvider + 'static,
{
    let tracker = ConnectionTracker::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::pin!(shutdown);

    loop {
        let (stream, addr) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(err) => {
                    warn!(error = %err, "Failed to accept connection");
                    continue;
                }
            },
            () = &mut shutdown => break,
        };

        let permit = match limiter.try_admit() {
            Ok(permit) => permit,
            Err(()) => {
                warn!(
                    peer = %addr,
                    max = limiter.max_connections(),
                    "Connection limit reached, closing connection"
                );
                continue;
            }
        };

        debug!(peer = %addr, "New connection");

        let guard = tracker.track().with_permit(permit);
        let context = Arc::new(Mutex::new(ConnectionContext::new(addr)));
        let scopes = Arc::clone(&scopes);
        let mut shutdown_rx = shutdown_rx.clone();

        tokio::spawn(async move {
            let _guard = guard;
            let service = service_fn(move |req| {
                handle_request(req, Arc::clone(&context), Arc::clone(&scopes))
            });

            let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
            tokio::pin!(conn);

            let result = tokio::select! {
                res = conn.as_mut() => res,
                _ = shutdown_rx.changed() => {
                    conn.as_mut().graceful_shutdown();
                    conn.await
                }
            };

            if let Err(err) = result {
                debug!(peer = %addr, error = %err, "Connection error");
            }
        });
    }

    drop(listener);
    let live = tracker.count();
    info!(connections = live, "Shutting down, draining connections");
    let _ = shutdown_tx.send(true);

    let drained = tracker.wait_for_shutdown(drain_timeout).await;
    if !drained {
        warn!(
            connections = tracker.count(),
            timeout_secs = drain_timeout.as_secs(),
            "Shutdown timeout reached with live connections"
        );
    }
    drained
}
