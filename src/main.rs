//! `relay-server`: run the message relay on one TCP port.

use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use relay_protocol::config::RelayConfig;
use relay_protocol::error::Result;
use relay_protocol::utils::logging::init_logging;
use relay_protocol::RelayServer;

#[derive(Debug, Parser)]
#[command(name = "relay-server", version, about = "Identity-addressed TCP message relay")]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, overrides the configuration file
    #[arg(short, long)]
    address: Option<String>,

    /// Listen port, keeps the host part of the configured address
    #[arg(short, long)]
    port: Option<u16>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => RelayConfig::from_file(path)?,
        None => RelayConfig::default(),
    };
    config.apply_env()?;

    if let Some(address) = args.address {
        config.server.address = address;
    }
    if let Some(port) = args.port {
        config.server = config.server.with_port(port);
    }

    if args.print_config {
        print!("{}", toml_string(&config)?);
        return Ok(());
    }

    config.validate_strict()?;
    init_logging(&config.logging)?;
    info!(address = %config.server.address, "Starting relay server");

    RelayServer::bind(config.server).await?.run().await
}

fn toml_string(config: &RelayConfig) -> Result<String> {
    toml::to_string_pretty(config).map_err(|e| {
        relay_protocol::ProtocolError::ConfigError(format!("Failed to serialize config: {e}"))
    })
}
