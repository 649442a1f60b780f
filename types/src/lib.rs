//! Core domain types for Fakeblok.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Both the authoritative server and the predicting client step the same [`Game`].

mod clock;
mod game;
mod geometry;
mod ids;

pub use clock::{FixedStep, MAX_CATCH_UP_STEPS, STEP, TICKS_PER_SECOND};
pub use game::{
    Bullet, Component, Entity, Game, GameError, Input, InvalidKeyError,
    MAX_BULLETS_PER_ENTITY, Sign, Velocity,
};
pub use geometry::{GameInt, Point, Rectangle};
pub use ids::EntityId;
