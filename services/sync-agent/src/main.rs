//! Gateway Sync Agent - Standalone Binary
//!
//! Scans gateway inventories for every configured credential and
//! propagates the results to a directory sink.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use gateway_sync::{
    build_sink, load_credentials, ArnAccountResolver, PropagationOptions, Propagator, SinkKind,
    SinkSettings, StaticInventory,
};

/// Gateway Sync Agent - propagates discovered gateways to a directory
#[derive(Parser, Debug)]
#[command(name = "gateway-sync-agent", version, about)]
struct Args {
    /// Credential configuration (YAML)
    #[arg(long, env = "CREDENTIALS_FILE")]
    credentials: PathBuf,

    /// Inventory snapshot (YAML, role ARN -> gateways)
    #[arg(long, env = "INVENTORY_FILE")]
    inventory_file: PathBuf,

    /// Where discovered gateways are sent
    #[arg(long, value_enum, default_value = "direct", env = "SYNC_SINK")]
    sink: SinkKind,

    /// Directory location for the direct sink (memory://, file:///path, http://host:port)
    #[arg(long, env = "DIRECTORY_URL")]
    directory: Option<String>,

    /// Registry URL for the webhook sink, ingestion URL for queue/topic/function
    #[arg(long, env = "SINK_URL")]
    sink_url: Option<String>,

    /// Topic name for the topic sink
    #[arg(long, env = "SINK_TOPIC")]
    topic: Option<String>,

    /// Shared write token for a remote directory
    #[arg(long, env = "DIRECTORY_WRITE_TOKEN")]
    write_token: Option<String>,

    /// Save attempts per gateway
    #[arg(
        long,
        default_value = "3",
        env = "SYNC_RETRY",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    retry: u32,

    /// Seconds between save attempts
    #[arg(long, default_value = "2", env = "SYNC_RETRY_INTERVAL")]
    retry_interval: u64,

    /// Seconds between cycle starts; 0 runs once and exits
    #[arg(long, default_value = "0", env = "SYNC_INTERVAL")]
    interval: u64,

    /// Timeout in seconds for each external call
    #[arg(long, default_value = "10", env = "SYNC_TIMEOUT")]
    timeout: u64,

    /// Dry run - scan and filter without writing
    #[arg(long, default_value = "false")]
    dry_run: bool,

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

    info!(
        credentials = %args.credentials.display(),
        sink = %args.sink,
        interval = args.interval,
        dry_run = args.dry_run,
        "Starting Gateway Sync Agent"
    );

    // Fail before any scanning if the configuration is unusable
    let credentials =
        load_credentials(&args.credentials).context("Invalid credential configuration")?;

    let inventory = StaticInventory::load(&args.inventory_file)
        .context("Failed to load inventory snapshot")?;

    let timeout = Duration::from_secs(args.timeout);
    let sink = build_sink(&SinkSettings {
        kind: args.sink,
        directory: args.directory.clone(),
        url: args.sink_url.clone(),
        topic: args.topic.clone(),
        write_token: args.write_token.clone(),
        timeout,
    })
    .await
    .context("Failed to build sink")?;

    let propagator = Propagator::new(
        Arc::new(inventory),
        Arc::new(ArnAccountResolver),
        sink,
        PropagationOptions {
            retry: args.retry,
            retry_interval: Duration::from_secs(args.retry_interval),
            call_timeout: timeout,
            dry_run: args.dry_run,
        },
    );

    let report = propagator
        .run(Duration::from_secs(args.interval), credentials, || {
            tokio::task::block_in_place(|| load_credentials(&args.credentials))
        })
        .await;

    info!(
        saved = report.saved,
        failed = report.failed,
        scan_errors = report.scan_errors,
        "Gateway sync finished"
    );

    Ok(())
}
