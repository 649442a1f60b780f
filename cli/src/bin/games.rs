//! Fakeblok game list.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use fakeblok_registry::GameList;

#[derive(Parser)]
#[command(name = "fakeblok-games", version)]
#[command(about = "Run a game list that servers register with and clients read from")]
struct Cli {
    /// Port game servers register on
    #[arg(short, long)]
    registration_port: Option<u16>,
    /// Port clients list games on
    #[arg(short, long)]
    list_port: Option<u16>,
    /// Milliseconds between health check pings
    #[arg(long)]
    health_check_interval_ms: Option<u64>,
    /// Config file (default: ~/.fakeblok/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    fakeblok::init_stderr_tracing();

    let mut config = fakeblok::load_config(cli.config.as_deref())?.registry();
    if let Some(port) = cli.registration_port {
        config.registration_port = port;
    }
    if let Some(port) = cli.list_port {
        config.list_port = port;
    }
    if let Some(interval) = cli.health_check_interval_ms {
        config.health_check_interval_ms = interval;
    }

    let list = GameList::bind(
        SocketAddr::from(([0, 0, 0, 0], config.registration_port)),
        SocketAddr::from(([0, 0, 0, 0], config.list_port)),
        &config,
    )
    .await?;

    tokio::select! {
        () = list.run() => {}
        () = fakeblok::shutdown_signal() => {}
    }
    Ok(())
}
