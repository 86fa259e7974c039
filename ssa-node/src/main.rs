//! `ssa-node`: the distribution-node binary. Parses CLI flags layered over
//! an optional TOML config file, initializes structured logging, then
//! starts the ctrl/upstream/downstream/access worker set and runs until
//! a shutdown signal arrives.

mod config;
mod derived_stub;
mod mad_stub;
mod persist_file;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use ssa_server::transport::TcpTransport;
use ssa_server::worker::{start_service, ServiceConfig};
use ssa_types::{Lid, NodeRole};
use tracing_subscriber::EnvFilter;

use config::NodeConfig;
use derived_stub::UnimplementedDerivedBuilder;
use mad_stub::{NullDeviceEvents, NullMadChannel};

/// Command-line flags. Any flag left unset falls back to `--config`'s
/// file, then to a hardcoded default.
#[derive(Debug, Parser)]
#[command(name = "ssa-node", about = "Subnet administration distribution node")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, default_value = "/etc/ssa-node.toml")]
    config: PathBuf,

    /// Fabric device name this node binds to.
    #[arg(long)]
    device: Option<String>,

    /// This node's own LID.
    #[arg(long)]
    lid: Option<u16>,

    /// Role bitmask: 1=CONSUMER, 2=DISTRIBUTION, 4=ACCESS, 8=CORE,
    /// combinable by addition (e.g. 10 = DISTRIBUTION|CORE).
    #[arg(long)]
    role: Option<u8>,

    /// `tracing-subscriber` env-filter directive.
    #[arg(long)]
    log_level: Option<String>,
}

fn resolve<T>(cli: Option<T>, file: Option<T>, default: T) -> T {
    cli.or(file).unwrap_or(default)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let file_config = NodeConfig::load(&cli.config).unwrap_or_else(|e| {
        eprintln!("warning: {e}, continuing with defaults");
        NodeConfig::default()
    });

    let log_level = resolve(
        cli.log_level.clone(),
        file_config.log_level.clone(),
        "ssa_node=info,ssa_server=info".to_string(),
    );
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level))
        .init();

    let lid = Lid(resolve(cli.lid, file_config.lid, 0));
    let role_bits = resolve(cli.role, file_config.role, NodeRole::DISTRIBUTION.bits());
    let role = NodeRole::from_bits_truncate(role_bits);
    let device = resolve(cli.device.clone(), file_config.device.clone(), "unset".to_string());

    tracing::info!(?lid, ?role, %device, "starting ssa-node");

    let derived_builder: Option<Arc<UnimplementedDerivedBuilder>> = if role.contains(NodeRole::ACCESS) {
        Some(Arc::new(UnimplementedDerivedBuilder))
    } else {
        None
    };

    let handle = start_service(ServiceConfig {
        transport: Arc::new(TcpTransport),
        mad: Arc::new(NullMadChannel),
        events: NullDeviceEvents,
        derived_builder,
        own_lid: lid,
        role,
    })
    .await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("received shutdown signal");

    handle.shutdown().await?;
    Ok(())
}
