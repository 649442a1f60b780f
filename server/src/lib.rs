//! Authoritative game server.
//!
//! [`GameServer`] owns the one true [`Game`]. A simulation task steps it at
//! [`TICKS_PER_SECOND`](fakeblok_types::TICKS_PER_SECOND) and publishes every
//! new state on a `watch` channel; each connection gets a
//! [`ConnectionHandler`] that owns one entity and long-polls that channel.

mod handler;

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use fakeblok_config::ServerConfig;
use fakeblok_protocol::RpcListener;
use fakeblok_types::{EntityId, FixedStep, Game, Point, STEP};
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};

pub use handler::ConnectionHandler;

/// State shared by the simulation task and every connection.
pub(crate) struct Shared {
    game: Mutex<Game>,
    state_tx: watch::Sender<Game>,
}

impl Shared {
    pub(crate) fn game(&self) -> MutexGuard<'_, Game> {
        // The game is plain data; a panicked holder cannot leave it in a
        // state later steps fail on, so poisoning is ignored.
        self.game.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn an entity for `peer`, publish it, and return a receiver whose
    /// first poll yields that published state.
    pub(crate) fn join(&self, peer: SocketAddr) -> (EntityId, watch::Receiver<Game>) {
        let (entity_id, mut state_rx) = {
            let mut game = self.game();
            let id = game.add_entity();
            self.publish(&game);
            (id, self.state_tx.subscribe())
        };
        tracing::info!(%peer, entity = %entity_id, "player joined");

        state_rx.mark_changed();
        (entity_id, state_rx)
    }

    /// Publish `game`. Callers hold the game lock so publishes happen in the
    /// order the changes did.
    fn publish(&self, game: &MutexGuard<'_, Game>) {
        self.state_tx.send_replace(Game::clone(game));
    }
}

pub struct GameServer {
    shared: Arc<Shared>,
}

impl GameServer {
    #[must_use]
    pub fn new(game: Game) -> Self {
        let (state_tx, _) = watch::channel(game.clone());
        Self {
            shared: Arc::new(Shared {
                game: Mutex::new(game),
                state_tx,
            }),
        }
    }

    #[must_use]
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(Game::new(
            Point::new(config.world_width, config.world_height),
            config.square_size,
        ))
    }

    /// Copy of the current authoritative state.
    #[must_use]
    pub fn snapshot(&self) -> Game {
        self.shared.game().clone()
    }

    /// Step the game forever at the fixed tick rate, publishing after each
    /// interval that advanced the simulation.
    pub async fn run_simulation(self: Arc<Self>) {
        let mut interval = tokio::time::interval(STEP);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut clock = FixedStep::new();
        let mut last = Instant::now();

        loop {
            interval.tick().await;
            let now = Instant::now();
            let elapsed = now - last;
            last = now;

            let mut game = self.shared.game();
            let steps = game.tick(elapsed, &mut clock);
            if steps > 1 {
                tracing::trace!(steps, "caught up on missed ticks");
            }
            if steps > 0 {
                self.shared.publish(&game);
            }
            drop(game);
        }
    }

    /// Accept game connections until the task is dropped.
    pub async fn serve(self: Arc<Self>, listener: RpcListener, max_connections: usize) {
        tracing::info!(addr = %listener.local_addr(), "game server listening");
        listener
            .serve(move |peer| self.connect(peer), max_connections)
            .await;
    }

    /// Handler for a new connection. Its entity spawns on the first gameplay
    /// call, so connections that only ping never appear in the arena.
    #[must_use]
    pub fn connect(&self, peer: SocketAddr) -> ConnectionHandler {
        ConnectionHandler::new(peer, self.shared.clone())
    }
}
