//! Client-side world: entity store plus local player and match state.
//!
//! The network side (reconciler) and the render side (interpolation and
//! drawing) run on different ticks. They share one [`ClientWorld`] through
//! [`SharedWorld`], which serializes writers behind a lock that is never
//! held across an `.await`.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use arena_shared::{ids::PlayerId, math::Vec2, state::SessionState};

use crate::store::{Bullet, Enemy, EntityStore, Obstacle, MAX_HP};

/// The local player as last corrected by the server.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalPlayerState {
    pub position: Vec2,
    pub hp: i32,
}

impl Default for LocalPlayerState {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            hp: MAX_HP,
        }
    }
}

/// Everything the reconciler writes and the renderer reads.
#[derive(Debug, Clone)]
pub struct ClientWorld {
    /// Our own id; entries carrying it update `local`, not the enemy map.
    pub own_id: PlayerId,
    pub local: LocalPlayerState,
    pub store: EntityStore,
    pub state: SessionState,
    /// Server countdown. `None` until the server first sends one.
    pub left_time: Option<u32>,
}

impl ClientWorld {
    pub fn new(own_id: PlayerId) -> Self {
        Self {
            own_id,
            local: LocalPlayerState::default(),
            store: EntityStore::new(),
            state: SessionState::Match,
            left_time: None,
        }
    }
}

/// A copy of the drawable state, taken under the lock.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldView {
    pub local: LocalPlayerState,
    pub enemies: Vec<Enemy>,
    pub bullets: Vec<Bullet>,
    pub obstacles: Vec<Obstacle>,
    pub state: SessionState,
    pub left_time: Option<u32>,
}

/// Cloneable handle to the world shared by the session and the renderer.
#[derive(Debug, Clone)]
pub struct SharedWorld {
    inner: Arc<RwLock<ClientWorld>>,
}

impl SharedWorld {
    pub fn new(own_id: PlayerId) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ClientWorld::new(own_id))),
        }
    }

    // A panic while holding the lock leaves plain data behind; keep going.
    pub fn read(&self) -> RwLockReadGuard<'_, ClientWorld> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, ClientWorld> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// One render-tick interpolation step.
    pub fn step(&self, blend: f32) {
        self.write().store.step_interpolation(blend);
    }

    pub fn view(&self) -> WorldView {
        let w = self.read();
        WorldView {
            local: w.local,
            enemies: w.store.enemies().cloned().collect(),
            bullets: w.store.bullets().cloned().collect(),
            obstacles: w.store.obstacles().cloned().collect(),
            state: w.state,
            left_time: w.left_time,
        }
    }

    pub fn state(&self) -> SessionState {
        self.read().state
    }

    pub fn left_time(&self) -> Option<u32> {
        self.read().left_time
    }

    pub fn local_player(&self) -> LocalPlayerState {
        self.read().local
    }
}
