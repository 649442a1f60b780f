//! Terminal front end for Fakeblok.

mod app;
mod input;
mod keys;
mod render;
mod theme;

pub use app::{RunOptions, run};
pub use input::{InputPump, is_quit};
pub use keys::{KeyTracker, RELEASE_TIMEOUT, key_binding};
pub use render::{View, draw};
pub use theme::Palette;
