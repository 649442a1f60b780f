//! Frame loop of the terminal client.

use std::time::Duration;

use anyhow::Result;
use crossterm::event::Event;
use fakeblok_client::GameClient;
use ratatui::{Terminal, backend::Backend};
use tokio::time::Instant;

use crate::input::{InputPump, is_quit};
use crate::keys::KeyTracker;
use crate::render::{View, draw};
use crate::theme::Palette;

const FRAME_DURATION: Duration = Duration::from_millis(8);

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// The terminal reports key releases (keyboard enhancement is active).
    pub release_events: bool,
    pub palette: Palette,
}

/// Play until the user quits: poll input, advance local prediction and draw
/// once per frame.
pub async fn run<B>(
    terminal: &mut Terminal<B>,
    client: &mut GameClient,
    options: RunOptions,
) -> Result<()>
where
    B: Backend,
    B::Error: Send + Sync + 'static,
{
    let mut input = InputPump::new();
    let mut keys = KeyTracker::new(options.release_events);
    let mut frames = tokio::time::interval(FRAME_DURATION);
    frames.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut last_frame = Instant::now();
    let mut was_connected = true;

    let result: Result<()> = loop {
        frames.tick().await;
        let now = Instant::now();

        let events = match input.drain() {
            Ok(events) => events,
            Err(e) => break Err(e),
        };
        let mut quit = false;
        for event in events {
            if let Event::Key(key) = event {
                if is_quit(&key) {
                    quit = true;
                    break;
                }
                for game_input in keys.handle(&key, now.into_std()) {
                    client.push_input(game_input);
                }
            }
        }
        if quit {
            break Ok(());
        }
        for game_input in keys.expire(now.into_std()) {
            client.push_input(game_input);
        }

        client.tick(now - last_frame);
        last_frame = now;

        let connected = client.is_connected();
        if was_connected && !connected {
            tracing::warn!(server = %client.server_addr(), "lost connection to game server");
        }
        was_connected = connected;

        let game = client.snapshot();
        let view = View {
            game: &game,
            player: client.entity_id(),
            server: client.server_addr(),
            connected,
            palette: options.palette,
        };
        if let Err(e) = terminal.draw(|frame| draw(frame, &view)) {
            break Err(e.into());
        }
    };

    input.shutdown().await;
    result
}
