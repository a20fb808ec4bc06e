//! Entity store.
//!
//! The server sends discrete snapshots; the renderer draws at its own rate.
//! Every remote entity therefore keeps two positions: the last authoritative
//! `target`, and the `display` position the renderer chases it with via
//! [`EntityStore::step_interpolation`].
//!
//! Maps are ordered by id so iteration (drawing, logging, tests) is stable.

use std::collections::{BTreeMap, BTreeSet};

use arena_shared::{
    ids::{BulletId, ObstacleId, PlayerId},
    math::{wrap_degrees, Vec2},
};

/// Hit points of a fully healed player.
pub const MAX_HP: i32 = 100;

/// Another player.
#[derive(Debug, Clone, PartialEq)]
pub struct Enemy {
    pub id: PlayerId,
    pub target: Vec2,
    pub display: Vec2,
    pub hp: i32,
    /// Heading in degrees, `[0, 360)`.
    pub facing: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bullet {
    pub id: BulletId,
    pub target: Vec2,
    pub display: Vec2,
}

/// Static scenery. Never interpolated.
#[derive(Debug, Clone, PartialEq)]
pub struct Obstacle {
    pub id: ObstacleId,
    pub position: Vec2,
    pub size: f32,
}

/// Remote state as last reported by the server.
#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    enemies: BTreeMap<PlayerId, Enemy>,
    bullets: BTreeMap<BulletId, Bullet>,
    obstacles: BTreeMap<ObstacleId, Obstacle>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates or updates an enemy. Returns `true` if it was created.
    ///
    /// A new enemy appears at its target; a known one only gets a new
    /// target, leaving `display` to interpolation.
    pub fn upsert_enemy(&mut self, id: PlayerId, pos: Vec2, hp: i32, facing: f32) -> bool {
        let hp = hp.clamp(0, MAX_HP);
        let facing = wrap_degrees(facing);
        match self.enemies.get_mut(&id) {
            Some(e) => {
                e.target = pos;
                e.hp = hp;
                e.facing = facing;
                false
            }
            None => {
                self.enemies.insert(
                    id,
                    Enemy {
                        id,
                        target: pos,
                        display: pos,
                        hp,
                        facing,
                    },
                );
                true
            }
        }
    }

    /// Removes an enemy. No-op if absent; returns whether one was removed.
    pub fn remove_enemy(&mut self, id: PlayerId) -> bool {
        self.enemies.remove(&id).is_some()
    }

    /// Creates or retargets a bullet. Returns `true` if it was created.
    pub fn upsert_bullet(&mut self, id: BulletId, pos: Vec2) -> bool {
        match self.bullets.get_mut(&id) {
            Some(b) => {
                b.target = pos;
                false
            }
            None => {
                self.bullets.insert(
                    id,
                    Bullet {
                        id,
                        target: pos,
                        display: pos,
                    },
                );
                true
            }
        }
    }

    pub fn remove_bullet(&mut self, id: BulletId) -> bool {
        self.bullets.remove(&id).is_some()
    }

    /// Drops every bullet not in `live`. Returns how many were dropped.
    pub fn prune_bullets_not_in(&mut self, live: &BTreeSet<BulletId>) -> usize {
        let before = self.bullets.len();
        self.bullets.retain(|id, _| live.contains(id));
        before - self.bullets.len()
    }

    /// Adds an obstacle unless one with this id already exists.
    pub fn upsert_obstacle(&mut self, id: ObstacleId, position: Vec2, size: f32) -> bool {
        if self.obstacles.contains_key(&id) {
            return false;
        }
        self.obstacles.insert(id, Obstacle { id, position, size });
        true
    }

    pub fn remove_obstacle(&mut self, id: ObstacleId) -> bool {
        self.obstacles.remove(&id).is_some()
    }

    /// Moves every enemy and bullet `t` of the way from `display` toward
    /// `target`.
    pub fn step_interpolation(&mut self, t: f32) {
        for e in self.enemies.values_mut() {
            e.display = e.display.approach(e.target, t);
        }
        for b in self.bullets.values_mut() {
            b.display = b.display.approach(b.target, t);
        }
    }

    pub fn enemy(&self, id: PlayerId) -> Option<&Enemy> {
        self.enemies.get(&id)
    }

    pub fn bullet(&self, id: BulletId) -> Option<&Bullet> {
        self.bullets.get(&id)
    }

    pub fn obstacle(&self, id: ObstacleId) -> Option<&Obstacle> {
        self.obstacles.get(&id)
    }

    pub fn enemies(&self) -> impl Iterator<Item = &Enemy> {
        self.enemies.values()
    }

    pub fn bullets(&self) -> impl Iterator<Item = &Bullet> {
        self.bullets.values()
    }

    pub fn obstacles(&self) -> impl Iterator<Item = &Obstacle> {
        self.obstacles.values()
    }

    pub fn bullet_ids(&self) -> BTreeSet<BulletId> {
        self.bullets.keys().copied().collect()
    }

    pub fn enemy_count(&self) -> usize {
        self.enemies.len()
    }

    pub fn bullet_count(&self) -> usize {
        self.bullets.len()
    }

    pub fn obstacle_count(&self) -> usize {
        self.obstacles.len()
    }
}
