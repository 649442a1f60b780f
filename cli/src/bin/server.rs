//! Fakeblok game server.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use fakeblok::ServerProcess;

#[derive(Parser)]
#[command(name = "fakeblok-server", version)]
#[command(about = "Run an authoritative Fakeblok game")]
struct Cli {
    /// Port to serve the game on
    #[arg(short, long)]
    port: Option<u16>,
    /// Name shown in the game list
    #[arg(long)]
    name: Option<String>,
    /// Registration address of a game list
    #[arg(long)]
    registry_addr: Option<SocketAddr>,
    #[arg(long)]
    world_width: Option<u16>,
    #[arg(long)]
    world_height: Option<u16>,
    /// Side length of each player's block
    #[arg(long)]
    square_size: Option<u16>,
    /// Config file (default: ~/.fakeblok/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    fakeblok::init_stderr_tracing();

    let mut config = fakeblok::load_config(cli.config.as_deref())?.server();
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(width) = cli.world_width {
        config.world_width = width;
    }
    if let Some(height) = cli.world_height {
        config.world_height = height;
    }
    if let Some(side) = cli.square_size {
        config.square_size = side;
    }
    config.name = cli.name.or(config.name);
    config.registry_addr = cli.registry_addr.or(config.registry_addr);

    let process = ServerProcess::bind(config).await?;
    tracing::info!(addr = %process.local_addr(), "game server bound");
    process.run_until(fakeblok::shutdown_signal()).await
}
