//! Client side of Fakeblok: playing on a game server and talking to the
//! game list.

mod game;
mod list;

pub use game::GameClient;
pub use list::{GameListClient, RegistrationClient};
