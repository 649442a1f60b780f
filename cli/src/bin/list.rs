//! Print the games a game list knows about.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use fakeblok_client::GameListClient;

#[derive(Parser)]
#[command(name = "fakeblok-list", version)]
#[command(about = "List running Fakeblok games")]
struct Cli {
    /// Listing address of the game list
    #[arg(long, default_value = "127.0.0.1:5002")]
    list_addr: SocketAddr,
    /// Milliseconds to wait for the listing
    #[arg(long, default_value_t = 2000)]
    timeout_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    fakeblok::init_stderr_tracing();

    let client = GameListClient::connect(cli.list_addr)
        .await?
        .with_timeout(Duration::from_millis(cli.timeout_ms));
    let games = client
        .list()
        .await
        .with_context(|| format!("listing games at {}", cli.list_addr))?;

    if games.is_empty() {
        println!("No games registered.");
        return Ok(());
    }
    println!("Available games:");
    for game in games {
        println!("  {}\t{}", game.addr, game.name);
    }
    Ok(())
}
