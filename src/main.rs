use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use trustgate::args::Args;
use trustgate::connection::ConnectionLimiter;
use trustgate::{config, server};
use trustgate_core::SystemResolver;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Validate arguments
    if let Err(err) = args.validate() {
        eprintln!("❌ Configuration error: {err}");
        std::process::exit(1);
    }

    init_logging(&args);

    // Trusted proxy host names are resolved here, once
    let scopes = match config::load_scopes(args.vhosts.as_deref(), &SystemResolver) {
        Ok(scopes) => Arc::new(scopes),
        Err(err) => {
            error!(error = %err, "Invalid configuration");
            eprintln!("❌ {err}");
            std::process::exit(1);
        }
    };

    server::print_startup_info(&args, &scopes);

    let bind_addr = match args.listen_addr() {
        Ok(addr) => addr,
        Err(err) => {
            eprintln!("❌ Configuration error: {err}");
            std::process::exit(1);
        }
    };
    let listener = match TcpListener::bind(bind_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            eprintln!("❌ Failed to bind to {bind_addr}: {err}");
            std::process::exit(1);
        }
    };

    println!("✅ TrustGate is running on {bind_addr}");
    info!(addr = %bind_addr, "Listening");

    let limiter = ConnectionLimiter::new(config::get_max_connections());
    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    };

    let drained = server::serve(
        listener,
        scopes,
        limiter,
        config::get_shutdown_timeout(),
        shutdown,
    )
    .await;

    if !args.quiet {
        println!("👋 TrustGate stopped");
    }
    if !drained {
        std::process::exit(1);
    }
}

/// Set up `tracing` output. `RUST_LOG` overrides the level chosen by the flags.
fn init_logging(args: &Args) {
    let default_level = if args.verbose {
        "debug"
    } else if args.quiet {
        "warn"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if args.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}
