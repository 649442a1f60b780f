//! Fakeblok terminal client.
//!
//! ```text
//! main() -> GameClient::connect -> TerminalSession::new -> fakeblok_tui::run
//! ```
//!
//! The client connects before touching the terminal so connection errors
//! print normally. [`TerminalSession`] restores the terminal on drop.

use std::{
    io::{Stdout, stdout},
    net::SocketAddr,
    path::PathBuf,
};

use anyhow::{Context, Result, bail};
use clap::Parser;
use crossterm::{
    cursor::{Hide, Show},
    event::{KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags},
    execute,
    terminal::{
        EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
        supports_keyboard_enhancement,
    },
};
use fakeblok_client::GameClient;
use fakeblok_tui::{Palette, RunOptions};
use ratatui::{Terminal, backend::CrosstermBackend};

#[derive(Parser)]
#[command(name = "fakeblok", version)]
#[command(about = "Play Fakeblok in the terminal")]
struct Cli {
    /// Game server to join
    #[arg(long)]
    server_addr: Option<SocketAddr>,
    /// Config file (default: ~/.fakeblok/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Use basic terminal colors
    #[arg(long)]
    high_contrast: bool,
}

/// Raw mode, alternate screen and, where supported, key release reporting.
struct TerminalSession {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    release_events: bool,
}

impl TerminalSession {
    fn new() -> Result<Self> {
        enable_raw_mode()?;

        let mut out = stdout();
        if let Err(err) = execute!(out, EnterAlternateScreen, Hide) {
            let _ = disable_raw_mode();
            return Err(err.into());
        }

        let release_events = matches!(supports_keyboard_enhancement(), Ok(true))
            && execute!(
                out,
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )
            .is_ok();
        tracing::debug!(release_events, "terminal key reporting");

        let terminal = match Terminal::new(CrosstermBackend::new(out)) {
            Ok(terminal) => terminal,
            Err(err) => {
                restore(release_events);
                return Err(err.into());
            }
        };
        Ok(Self {
            terminal,
            release_events,
        })
    }
}

fn restore(release_events: bool) {
    let _ = disable_raw_mode();
    let mut out = stdout();
    if release_events {
        let _ = execute!(out, PopKeyboardEnhancementFlags);
    }
    let _ = execute!(out, LeaveAlternateScreen, Show);
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        restore(self.release_events);
        let _ = self.terminal.show_cursor();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    fakeblok::init_file_tracing();

    let config = fakeblok::load_config(cli.config.as_deref())?;
    let client_config = config.client();
    let Some(server_addr) = cli.server_addr.or(client_config.server_addr) else {
        bail!("no game server given; pass --server-addr or set [client] server_addr");
    };

    let mut client = GameClient::connect(server_addr, &client_config)
        .await
        .with_context(|| format!("joining game at {server_addr}"))?;

    let result = {
        let mut session = TerminalSession::new()?;
        let options = RunOptions {
            release_events: session.release_events,
            palette: if cli.high_contrast {
                Palette::high_contrast()
            } else {
                Palette::standard()
            },
        };
        fakeblok_tui::run(&mut session.terminal, &mut client, options).await
    };

    client.shutdown().await;
    result
}
