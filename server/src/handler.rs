use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use fakeblok_protocol::methods::game;
use fakeblok_protocol::{PushInputParams, RpcFault, Service, codes, decode_params, encode_result};
use fakeblok_types::{EntityId, Game, GameError, Input};
use serde_json::Value;
use tokio::sync::{Mutex, watch};

use crate::Shared;

struct Player {
    entity_id: EntityId,
    // Concurrent polls on one connection queue up behind each other.
    state_rx: Mutex<watch::Receiver<Game>>,
}

/// Serves the game methods for one connection and owns that player's entity.
pub struct ConnectionHandler {
    peer: SocketAddr,
    shared: Arc<Shared>,
    player: OnceLock<Player>,
}

impl ConnectionHandler {
    pub(crate) fn new(peer: SocketAddr, shared: Arc<Shared>) -> Self {
        Self {
            peer,
            shared,
            player: OnceLock::new(),
        }
    }

    fn player(&self) -> &Player {
        self.player.get_or_init(|| {
            let (entity_id, state_rx) = self.shared.join(self.peer);
            Player {
                entity_id,
                state_rx: Mutex::new(state_rx),
            }
        })
    }

    /// This connection's entity, spawning it on first use.
    #[must_use]
    pub fn entity_id(&self) -> EntityId {
        self.player().entity_id
    }

    pub fn push_input(&self, input: Input) -> Result<(), GameError> {
        let entity_id = self.entity_id();
        tracing::trace!(entity = %entity_id, ?input, "input");
        self.shared.game().process_input(entity_id, input)
    }

    /// Next published state. The first call returns the state at join.
    pub async fn poll_game_state(&self) -> Result<Game, RpcFault> {
        let mut state_rx = self.player().state_rx.lock().await;
        state_rx
            .changed()
            .await
            .map_err(|_| RpcFault::internal("game server is shutting down"))?;
        Ok(state_rx.borrow_and_update().clone())
    }
}

impl Service for ConnectionHandler {
    async fn handle(&self, method: &str, params: Option<Value>) -> Result<Value, RpcFault> {
        match method {
            game::GET_ENTITY_ID => encode_result(&self.entity_id()),
            game::PUSH_INPUT => {
                let PushInputParams { input } = decode_params(params)?;
                self.push_input(input)
                    .map_err(|e| RpcFault::new(codes::UNKNOWN_ENTITY, e.to_string()))?;
                Ok(Value::Null)
            }
            game::POLL_GAME_STATE => {
                let state = self.poll_game_state().await?;
                encode_result(&state)
            }
            game::PING => Ok(Value::Null),
            other => Err(RpcFault::method_not_found(other)),
        }
    }

    async fn on_disconnect(&self) {
        let Some(player) = self.player.get() else {
            tracing::debug!(peer = %self.peer, "connection closed without joining");
            return;
        };
        let removed = self.shared.game().remove_entity(player.entity_id);
        tracing::info!(peer = %self.peer, entity = %player.entity_id, removed, "player left");
    }
}
