//! Gateway Registry - Standalone Binary
//!
//! Serves the gateway directory over HTTP on top of a memory, file or
//! remote backend.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use gateway_registry::{router, AppState, DirectoryLocation};

/// Gateway Registry - name to gateway ID directory service
#[derive(Parser, Debug)]
#[command(name = "gateway-registry", version, about)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:8080", env = "REGISTRY_LISTEN")]
    listen: SocketAddr,

    /// Storage backend (memory://, file:///path, http://host:port)
    #[arg(long, default_value = "memory://", env = "REGISTRY_BACKEND")]
    backend: String,

    /// Shared write token; writes are open when unset
    #[arg(long, env = "REGISTRY_WRITE_TOKEN")]
    write_token: Option<String>,

    /// Timeout in seconds for calls to a remote backend
    #[arg(long, default_value = "10", env = "REGISTRY_TIMEOUT")]
    timeout: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .json()
        .init();

    let location: DirectoryLocation = args
        .backend
        .parse()
        .with_context(|| format!("Invalid backend {}", args.backend))?;

    let directory = location
        .open(Duration::from_secs(args.timeout), args.write_token.as_deref())
        .await
        .context("Failed to open directory backend")?;

    info!(
        backend = %args.backend,
        write_token = args.write_token.is_some(),
        "Starting Gateway Registry"
    );

    let app = router(AppState::new(directory, args.write_token));

    let listener = tokio::net::TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("Failed to bind {}", args.listen))?;
    info!("Registry listening on {}", args.listen);
    axum::serve(listener, app).await?;

    Ok(())
}
