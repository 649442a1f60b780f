//! Connection to a game server with local prediction.
//!
//! The client keeps its own copy of the [`Game`]. Inputs are applied to that
//! copy at once and queued for the server; a background poller replaces the
//! copy with every state the server publishes, and the caller keeps the copy
//! moving between polls with [`GameClient::tick`].

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use fakeblok_config::ClientConfig;
use fakeblok_protocol::methods::game;
use fakeblok_protocol::{PushInputParams, RpcClient, RpcError, params};
use fakeblok_types::{EntityId, FixedStep, Game, Input};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Deadline for the calls made while connecting.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Polls slower than this are logged.
const SLOW_POLL: Duration = Duration::from_millis(50);

type SharedGame = Arc<Mutex<Game>>;

fn lock(game: &Mutex<Game>) -> MutexGuard<'_, Game> {
    game.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct GameClient {
    rpc: RpcClient,
    entity_id: EntityId,
    game: SharedGame,
    clock: FixedStep,
    input_tx: mpsc::UnboundedSender<Input>,
    connected: Arc<AtomicBool>,
    poller: JoinHandle<()>,
    pusher: JoinHandle<()>,
}

impl GameClient {
    /// Join the game at `addr`: learn our entity, fetch the current state and
    /// start the background poller and pusher.
    pub async fn connect(addr: SocketAddr, config: &ClientConfig) -> Result<Self, RpcError> {
        let rpc = RpcClient::connect(addr).await?;
        let (entity_id, state) = tokio::try_join!(
            rpc.call::<EntityId>(game::GET_ENTITY_ID, None, CONNECT_TIMEOUT),
            rpc.call::<Game>(game::POLL_GAME_STATE, None, CONNECT_TIMEOUT),
        )?;
        tracing::info!(%addr, entity = %entity_id, "joined game");

        let game = Arc::new(Mutex::new(state));
        let connected = Arc::new(AtomicBool::new(true));
        let timeout = config.request_timeout();

        let poller = tokio::spawn(
            StatePoller {
                rpc: rpc.clone(),
                game: game.clone(),
                connected: connected.clone(),
                timeout,
            }
            .run(),
        );

        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let pusher = tokio::spawn(
            InputPusher {
                rpc: rpc.clone(),
                inputs: input_rx,
                timeout,
            }
            .run(),
        );

        Ok(Self {
            rpc,
            entity_id,
            game,
            clock: FixedStep::new(),
            input_tx,
            connected,
            poller,
            pusher,
        })
    }

    #[must_use]
    pub fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    #[must_use]
    pub fn server_addr(&self) -> SocketAddr {
        self.rpc.peer_addr()
    }

    /// False once state polling has stopped.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire) && !self.rpc.is_closed()
    }

    #[must_use]
    pub fn snapshot(&self) -> Game {
        lock(&self.game).clone()
    }

    /// Apply `input` locally and queue it for the server.
    pub fn push_input(&self, input: Input) {
        if let Err(e) = lock(&self.game).process_input(self.entity_id, input) {
            tracing::debug!("local prediction skipped: {e}");
        }
        if self.input_tx.send(input).is_err() {
            tracing::debug!(?input, "input pusher has stopped");
        }
    }

    /// Advance the local prediction; returns the steps taken.
    pub fn tick(&mut self, elapsed: Duration) -> u32 {
        lock(&self.game).tick(elapsed, &mut self.clock)
    }

    /// Stop background tasks and close the connection.
    pub async fn shutdown(self) {
        self.poller.abort();
        self.pusher.abort();
        self.connected.store(false, Ordering::Release);
        self.rpc.close().await;
        tracing::info!(entity = %self.entity_id, "left game");
    }
}

impl Drop for GameClient {
    fn drop(&mut self) {
        self.poller.abort();
        self.pusher.abort();
    }
}

/// Replaces the local game with each state the server publishes.
struct StatePoller {
    rpc: RpcClient,
    game: SharedGame,
    connected: Arc<AtomicBool>,
    timeout: Duration,
}

impl StatePoller {
    async fn run(self) {
        loop {
            let started = Instant::now();
            match self
                .rpc
                .call::<Game>(game::POLL_GAME_STATE, None, self.timeout)
                .await
            {
                Ok(state) => {
                    let took = started.elapsed();
                    if took > SLOW_POLL {
                        tracing::info!(?took, "slow game state poll");
                    }
                    *lock(&self.game) = state;
                }
                Err(e) => {
                    tracing::warn!("stopped polling game state: {e}");
                    break;
                }
            }
        }
        self.connected.store(false, Ordering::Release);
    }
}

/// Forwards queued inputs to the server in order.
struct InputPusher {
    rpc: RpcClient,
    inputs: mpsc::UnboundedReceiver<Input>,
    timeout: Duration,
}

impl InputPusher {
    async fn run(mut self) {
        while let Some(input) = self.inputs.recv().await {
            let result = match params(&PushInputParams { input }) {
                Ok(params) => {
                    self.rpc
                        .call::<()>(game::PUSH_INPUT, params, self.timeout)
                        .await
                }
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => {}
                Err(e) if e.is_disconnect() => {
                    tracing::warn!("input pusher stopping: {e}");
                    break;
                }
                Err(e) => tracing::error!(?input, "failed to push input: {e}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fakeblok_protocol::RpcListener;
    use fakeblok_server::GameServer;
    use fakeblok_types::{Component, Point, Sign};

    async fn start_server() -> (SocketAddr, Arc<GameServer>) {
        let server = Arc::new(GameServer::new(Game::new(Point::new(400, 400), 100)));
        let listener = RpcListener::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = listener.local_addr();
        tokio::spawn(server.clone().run_simulation());
        tokio::spawn(server.clone().serve(listener, 8));
        (addr, server)
    }

    fn config() -> ClientConfig {
        ClientConfig {
            request_timeout_ms: 2000,
            ..ClientConfig::default()
        }
    }

    async fn eventually(mut check: impl FnMut() -> bool) {
        for _ in 0..300 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition never held");
    }

    #[tokio::test]
    async fn connect_fetches_id_and_state() {
        let (addr, _server) = start_server().await;
        let client = GameClient::connect(addr, &config()).await.unwrap();
        assert!(client.is_connected());
        assert_eq!(client.server_addr(), addr);
        assert!(client.snapshot().entity(client.entity_id()).is_some());
    }

    #[tokio::test]
    async fn input_reaches_the_server() {
        let (addr, server) = start_server().await;
        let client = GameClient::connect(addr, &config()).await.unwrap();
        let id = client.entity_id();

        client.push_input(Input::Move(Component::Y, Some(Sign::Positive)));
        // Prediction applies at once.
        assert_eq!(
            client.snapshot().entity(id).unwrap().velocity.y,
            Some(Sign::Positive)
        );

        eventually(|| {
            server
                .snapshot()
                .entity(id)
                .is_some_and(|e| e.velocity.y == Some(Sign::Positive))
        })
        .await;
    }

    #[tokio::test]
    async fn poller_tracks_other_players() {
        let (addr, _server) = start_server().await;
        let first = GameClient::connect(addr, &config()).await.unwrap();
        let second = GameClient::connect(addr, &config()).await.unwrap();

        eventually(|| first.snapshot().entity(second.entity_id()).is_some()).await;
        second.shutdown().await;
        eventually(|| first.snapshot().entity_count() == 1).await;
    }

    #[tokio::test]
    async fn local_tick_advances_prediction() {
        let (addr, _server) = start_server().await;
        let mut client = GameClient::connect(addr, &config()).await.unwrap();
        assert_eq!(client.tick(Duration::from_millis(20)), 4);
        assert_eq!(client.tick(Duration::from_millis(3)), 0);
        assert_eq!(client.tick(Duration::from_millis(3)), 1);
    }
}
