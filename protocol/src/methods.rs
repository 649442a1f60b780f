//! Method names and parameter/result payloads of the three Fakeblok services.

use std::net::SocketAddr;

use fakeblok_types::Input;
use serde::{Deserialize, Serialize};

/// Served by a game server on its single port.
pub mod game {
    /// `() -> EntityId`
    pub const GET_ENTITY_ID: &str = "game/getEntityId";
    /// `PushInputParams -> ()`
    pub const PUSH_INPUT: &str = "game/pushInput";
    /// `() -> Game`, long poll.
    pub const POLL_GAME_STATE: &str = "game/pollGameState";
    /// `() -> ()`
    pub const PING: &str = "game/ping";
}

/// Served by the game list on its registration port.
pub mod registry {
    /// `RegisterParams -> Option<String>`
    pub const REGISTER: &str = "registry/register";
    /// `UnregisterParams -> Option<String>`
    pub const UNREGISTER: &str = "registry/unregister";
}

/// Served by the game list on its listing port.
pub mod games {
    /// `() -> Vec<GameListing>`
    pub const LIST: &str = "games/list";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushInputParams {
    pub input: Input,
}

/// The registering game's address is its peer IP with this port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterParams {
    pub port: u16,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnregisterParams {
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GameListing {
    pub addr: SocketAddr,
    pub name: String,
}
