//! Game state and the deterministic simulation step.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::FixedStep;
use crate::geometry::{GameInt, Point, Rectangle, wrapping_offset};
use crate::ids::EntityId;

/// Live bullets a single entity may have in flight.
pub const MAX_BULLETS_PER_ENTITY: usize = 3;

/// Bullet lifetime in simulation steps (one second).
const BULLET_TTL_TICKS: u32 = crate::clock::TICKS_PER_SECOND;

const DEFAULT_WORLD_SIDE: GameInt = 512;
const DEFAULT_SQUARE_SIDE: GameInt = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Component {
    X,
    Y,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sign {
    Positive,
    Negative,
}

impl Sign {
    fn apply(self, distance: GameInt) -> i64 {
        match self {
            Sign::Positive => i64::from(distance),
            Sign::Negative => -i64::from(distance),
        }
    }
}

/// A player command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Input {
    /// Start moving along a component, or stop (`None`).
    Move(Component, Option<Sign>),
    Shoot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("key has no binding")]
pub struct InvalidKeyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Velocity {
    pub x: Option<Sign>,
    pub y: Option<Sign>,
}

impl Velocity {
    fn set(&mut self, component: Component, sign: Option<Sign>) {
        match component {
            Component::X => self.x = sign,
            Component::Y => self.y = sign,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub rect: Rectangle,
    pub velocity: Velocity,
    /// Direction bullets travel when this entity shoots.
    pub facing: (Component, Sign),
    /// Bullets from other entities that hit this one.
    pub hits: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bullet {
    /// Allocated in increasing order within one game.
    pub id: u32,
    pub owner: EntityId,
    pub rect: Rectangle,
    pub direction: (Component, Sign),
    pub ticks_left: u32,
}

/// The whole shared world. Cloned into every state poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    bounds: Point,
    square_side: GameInt,
    entity_speed: GameInt,
    bullet_speed: GameInt,
    bullet_side: GameInt,
    entities: BTreeMap<EntityId, Entity>,
    bullets: Vec<Bullet>,
    next_entity_id: u32,
    next_bullet_id: u32,
    tick: u64,
}

impl Default for Game {
    fn default() -> Self {
        Self::new(
            Point::new(DEFAULT_WORLD_SIDE, DEFAULT_WORLD_SIDE),
            DEFAULT_SQUARE_SIDE,
        )
    }
}

impl Game {
    /// Create an empty arena of size `bounds` whose blocks have side `square_side`.
    ///
    /// Speeds scale with the block size so that differently sized arenas
    /// feel the same.
    #[must_use]
    pub fn new(bounds: Point, square_side: GameInt) -> Self {
        let square_side = square_side.clamp(1, bounds.x.min(bounds.y).max(1));
        let entity_speed = (square_side / 200).max(1);
        Self {
            bounds,
            square_side,
            entity_speed,
            bullet_speed: entity_speed.saturating_mul(3),
            bullet_side: (square_side / 5).max(1),
            entities: BTreeMap::new(),
            bullets: Vec::new(),
            next_entity_id: 0,
            next_bullet_id: 0,
            tick: 0,
        }
    }

    #[must_use]
    pub fn bounds(&self) -> Point {
        self.bounds
    }

    #[must_use]
    pub fn width(&self) -> GameInt {
        self.bounds.x
    }

    #[must_use]
    pub fn height(&self) -> GameInt {
        self.bounds.y
    }

    #[must_use]
    pub fn square_side(&self) -> GameInt {
        self.square_side
    }

    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities.iter().map(|(id, e)| (*id, e))
    }

    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn bullets(&self) -> &[Bullet] {
        &self.bullets
    }

    /// Spawn a new block in the first free grid cell.
    ///
    /// Falls back to the origin when the arena is full. Blocks that already
    /// overlap ignore each other when moving, so either can walk out.
    pub fn add_entity(&mut self) -> EntityId {
        let id = EntityId::new(self.next_entity_id);
        self.next_entity_id += 1;

        let top_left = self.free_cell().unwrap_or_default();
        self.entities.insert(
            id,
            Entity {
                rect: Rectangle::square(top_left, self.square_side),
                velocity: Velocity::default(),
                facing: (Component::X, Sign::Positive),
                hits: 0,
            },
        );
        id
    }

    /// Remove a block and every bullet it fired.
    pub fn remove_entity(&mut self, id: EntityId) -> bool {
        self.bullets.retain(|b| b.owner != id);
        self.entities.remove(&id).is_some()
    }

    pub fn process_input(&mut self, id: EntityId, input: Input) -> Result<(), GameError> {
        let owned_bullets = self.bullets.iter().filter(|b| b.owner == id).count();
        let bullet_side = self.bullet_side;
        let bounds = self.bounds;
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(GameError::UnknownEntity(id))?;

        match input {
            Input::Move(component, sign) => {
                entity.velocity.set(component, sign);
                if let Some(sign) = sign {
                    entity.facing = (component, sign);
                }
            }
            Input::Shoot => {
                if owned_bullets >= MAX_BULLETS_PER_ENTITY {
                    return Ok(());
                }
                let center = entity.rect.center();
                let half = i64::from(bullet_side / 2);
                let top_left = Point::new(
                    wrapping_offset(center.x, -half, bounds.x),
                    wrapping_offset(center.y, -half, bounds.y),
                );
                let bullet_id = self.next_bullet_id;
                self.next_bullet_id = self.next_bullet_id.wrapping_add(1);
                self.bullets.push(Bullet {
                    id: bullet_id,
                    owner: id,
                    rect: Rectangle::square(top_left, bullet_side),
                    direction: entity.facing,
                    ticks_left: BULLET_TTL_TICKS,
                });
            }
        }
        Ok(())
    }

    /// Advance the simulation by as many fixed steps as `elapsed` covers.
    pub fn tick(&mut self, elapsed: Duration, clock: &mut FixedStep) -> u32 {
        let steps = clock.advance(elapsed);
        for _ in 0..steps {
            self.step();
        }
        steps
    }

    /// One simulation step: move blocks, then bullets.
    pub fn step(&mut self) {
        let ids: Vec<EntityId> = self.entities.keys().copied().collect();
        for id in ids {
            let Some(velocity) = self.entities.get(&id).map(|e| e.velocity) else {
                continue;
            };
            if let Some(sign) = velocity.x {
                self.move_entity(id, Component::X, sign);
            }
            if let Some(sign) = velocity.y {
                self.move_entity(id, Component::Y, sign);
            }
        }
        self.step_bullets();
        self.tick += 1;
    }

    /// Move one block, stopping it flush against any block it would enter.
    fn move_entity(&mut self, id: EntityId, component: Component, sign: Sign) {
        let Some(entity) = self.entities.get(&id) else {
            return;
        };
        let speed = self.entity_speed;
        let current = entity.rect;
        let moved = translate(current, component, sign.apply(speed), self.bounds);

        let pull_back = self
            .entities
            .iter()
            .filter(|(other_id, _)| **other_id != id)
            // Already overlapping (fallback spawns): never blocks.
            .filter(|(_, other)| current.wrapped_overlap(&other.rect, self.bounds).is_none())
            .filter_map(|(_, other)| moved.wrapped_overlap(&other.rect, self.bounds))
            .map(|overlap| match component {
                Component::X => overlap.width,
                Component::Y => overlap.height,
            })
            .max()
            .unwrap_or(0)
            .min(speed);

        let settled = if pull_back == 0 {
            moved
        } else {
            translate(moved, component, -sign.apply(pull_back), self.bounds)
        };
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.rect = settled;
        }
    }

    fn step_bullets(&mut self) {
        let bounds = self.bounds;
        let speed = self.bullet_speed;
        let mut bullets = std::mem::take(&mut self.bullets);

        bullets.retain_mut(|bullet| {
            let (component, sign) = bullet.direction;
            bullet.rect = translate(bullet.rect, component, sign.apply(speed), bounds);
            bullet.ticks_left = bullet.ticks_left.saturating_sub(1);

            let victim = self
                .entities
                .iter_mut()
                .filter(|(id, _)| **id != bullet.owner)
                .find(|(_, e)| bullet.rect.wrapped_overlap(&e.rect, bounds).is_some());
            if let Some((_, entity)) = victim {
                entity.hits += 1;
                return false;
            }
            bullet.ticks_left > 0
        });

        self.bullets = bullets;
    }

    fn free_cell(&self) -> Option<Point> {
        let side = usize::from(self.square_side);
        for y in (0..self.bounds.y).step_by(side) {
            for x in (0..self.bounds.x).step_by(side) {
                let candidate = Rectangle::square(Point::new(x, y), self.square_side);
                let blocked = self
                    .entities
                    .values()
                    .any(|e| candidate.wrapped_overlap(&e.rect, self.bounds).is_some());
                if !blocked {
                    return Some(candidate.top_left);
                }
            }
        }
        None
    }
}

fn translate(rect: Rectangle, component: Component, delta: i64, bounds: Point) -> Rectangle {
    let top_left = match component {
        Component::X => rect
            .top_left
            .at_x(wrapping_offset(rect.top_left.x, delta, bounds.x)),
        Component::Y => rect
            .top_left
            .at_y(wrapping_offset(rect.top_left.y, delta, bounds.y)),
    };
    Rectangle { top_left, ..rect }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena() -> Game {
        // Side 200 gives an entity speed of 1 and bullet speed of 3.
        Game::new(Point::new(1000, 1000), 200)
    }

    fn place(game: &mut Game, id: EntityId, x: GameInt, y: GameInt) {
        game.entities.get_mut(&id).unwrap().rect.top_left = Point::new(x, y);
    }

    #[test]
    fn ids_are_monotonic_and_not_reused() {
        let mut game = arena();
        let a = game.add_entity();
        let b = game.add_entity();
        assert!(game.remove_entity(a));
        let c = game.add_entity();
        assert_eq!((a.value(), b.value(), c.value()), (0, 1, 2));
        assert_eq!(game.entity_count(), 2);
    }

    #[test]
    fn spawns_in_distinct_free_cells() {
        let mut game = arena();
        let a = game.add_entity();
        let b = game.add_entity();
        let ra = game.entity(a).unwrap().rect;
        let rb = game.entity(b).unwrap().rect;
        assert_eq!(ra.top_left, Point::new(0, 0));
        assert_eq!(rb.top_left, Point::new(200, 0));
        assert!(ra.wrapped_overlap(&rb, game.bounds()).is_none());
    }

    #[test]
    fn full_arena_spawns_at_origin() {
        let mut game = Game::new(Point::new(10, 10), 10);
        game.add_entity();
        let second = game.add_entity();
        assert_eq!(game.entity(second).unwrap().rect.top_left, Point::new(0, 0));
    }

    #[test]
    fn overlapping_spawn_walks_out_then_collides_again() {
        // Two cells: the third block lands on the first at the origin.
        let mut game = Game::new(Point::new(20, 10), 10);
        let a = game.add_entity();
        let b = game.add_entity();
        let c = game.add_entity();
        assert_eq!(game.entity(c).unwrap().rect.top_left, Point::new(0, 0));
        assert!(game.remove_entity(b));

        game.process_input(c, Input::Move(Component::X, Some(Sign::Positive)))
            .unwrap();
        for _ in 0..10 {
            game.step();
        }
        let ra = game.entity(a).unwrap().rect;
        let rc = game.entity(c).unwrap().rect;
        assert_eq!(rc.top_left, Point::new(10, 0));
        assert!(ra.wrapped_overlap(&rc, game.bounds()).is_none());

        // Now apart, a and c block each other on both sides of the torus.
        game.step();
        assert_eq!(game.entity(c).unwrap().rect.top_left, Point::new(10, 0));
        game.process_input(c, Input::Move(Component::X, Some(Sign::Negative)))
            .unwrap();
        game.step();
        assert_eq!(game.entity(c).unwrap().rect.top_left, Point::new(10, 0));
    }

    #[test]
    fn move_input_sets_velocity_and_facing() {
        let mut game = arena();
        let id = game.add_entity();
        game.process_input(id, Input::Move(Component::Y, Some(Sign::Negative)))
            .unwrap();
        let e = game.entity(id).unwrap();
        assert_eq!(e.velocity.y, Some(Sign::Negative));
        assert_eq!(e.facing, (Component::Y, Sign::Negative));

        game.process_input(id, Input::Move(Component::Y, None))
            .unwrap();
        let e = game.entity(id).unwrap();
        assert_eq!(e.velocity.y, None);
        assert_eq!(e.facing, (Component::Y, Sign::Negative));
    }

    #[test]
    fn unknown_entity_is_rejected() {
        let mut game = arena();
        let err = game.process_input(EntityId::new(7), Input::Shoot).unwrap_err();
        assert_eq!(err, GameError::UnknownEntity(EntityId::new(7)));
    }

    #[test]
    fn moving_left_from_origin_wraps() {
        let mut game = arena();
        let id = game.add_entity();
        game.process_input(id, Input::Move(Component::X, Some(Sign::Negative)))
            .unwrap();
        game.step();
        assert_eq!(game.entity(id).unwrap().rect.top_left, Point::new(999, 0));
        assert_eq!(game.tick_count(), 1);
    }

    #[test]
    fn blocks_stop_flush_against_each_other() {
        let mut game = arena();
        let a = game.add_entity();
        let b = game.add_entity();
        place(&mut game, a, 0, 0);
        place(&mut game, b, 201, 0);
        game.process_input(a, Input::Move(Component::X, Some(Sign::Positive)))
            .unwrap();

        game.step();
        assert_eq!(game.entity(a).unwrap().rect.top_left.x, 1);
        game.step();
        assert_eq!(game.entity(a).unwrap().rect.top_left.x, 1);

        let ra = game.entity(a).unwrap().rect;
        let rb = game.entity(b).unwrap().rect;
        assert!(ra.wrapped_overlap(&rb, game.bounds()).is_none());
    }

    #[test]
    fn blocks_collide_across_the_wrap_edge() {
        let mut game = arena();
        let a = game.add_entity();
        let b = game.add_entity();
        // a spans [800, 1000); b spans [0, 200). They touch through the edge.
        place(&mut game, a, 800, 0);
        place(&mut game, b, 0, 0);
        game.process_input(a, Input::Move(Component::X, Some(Sign::Positive)))
            .unwrap();
        game.step();
        assert_eq!(game.entity(a).unwrap().rect.top_left.x, 800);
    }

    #[test]
    fn shooting_spawns_bullet_in_facing_direction() {
        let mut game = arena();
        let id = game.add_entity();
        game.process_input(id, Input::Move(Component::Y, Some(Sign::Positive)))
            .unwrap();
        game.process_input(id, Input::Move(Component::Y, None))
            .unwrap();
        game.process_input(id, Input::Shoot).unwrap();

        let bullet = game.bullets()[0];
        assert_eq!(bullet.owner, id);
        assert_eq!(bullet.direction, (Component::Y, Sign::Positive));
        assert_eq!(bullet.rect.top_left, Point::new(80, 80));
    }

    #[test]
    fn bullets_are_limited_per_entity() {
        let mut game = arena();
        let id = game.add_entity();
        for _ in 0..MAX_BULLETS_PER_ENTITY + 2 {
            game.process_input(id, Input::Shoot).unwrap();
        }
        assert_eq!(game.bullets().len(), MAX_BULLETS_PER_ENTITY);
        let ids: Vec<u32> = game.bullets().iter().map(|b| b.id).collect();
        assert_eq!(ids, [0, 1, 2]);
    }

    #[test]
    fn bullet_hits_other_entity() {
        let mut game = arena();
        let shooter = game.add_entity();
        let target = game.add_entity();
        place(&mut game, shooter, 0, 0);
        place(&mut game, target, 205, 0);
        game.process_input(shooter, Input::Shoot).unwrap();

        for _ in 0..100 {
            game.step();
        }
        assert_eq!(game.entity(target).unwrap().hits, 1);
        assert_eq!(game.entity(shooter).unwrap().hits, 0);
        assert!(game.bullets().is_empty());
    }

    #[test]
    fn bullets_expire() {
        let mut game = arena();
        let id = game.add_entity();
        game.process_input(id, Input::Shoot).unwrap();
        for _ in 0..BULLET_TTL_TICKS {
            game.step();
        }
        assert!(game.bullets().is_empty());
    }

    #[test]
    fn removing_entity_drops_its_bullets() {
        let mut game = arena();
        let id = game.add_entity();
        game.process_input(id, Input::Shoot).unwrap();
        assert!(game.remove_entity(id));
        assert!(game.bullets().is_empty());
        assert!(!game.remove_entity(id));
    }

    #[test]
    fn tick_runs_fixed_steps() {
        let mut game = arena();
        let mut clock = FixedStep::new();
        assert_eq!(game.tick(Duration::from_millis(12), &mut clock), 2);
        assert_eq!(game.tick_count(), 2);
    }

    #[test]
    fn state_survives_json() {
        let mut game = arena();
        let id = game.add_entity();
        game.process_input(id, Input::Shoot).unwrap();
        let json = serde_json::to_string(&game).unwrap();
        let back: Game = serde_json::from_str(&json).unwrap();
        assert_eq!(back, game);
    }
}
