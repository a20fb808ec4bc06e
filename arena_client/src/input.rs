//! Input handling.
//!
//! A real renderer samples a stick or WASD plus a pointer on the ground.
//! This module turns those axes into a per-tick [`LocalIntent`], and
//! provides [`InputCell`], a ready-made adapter the renderer can write into
//! from its own thread.

use std::sync::{Mutex, PoisonError};

use arena_shared::{math::heading_from_axes, state::SessionState};

use crate::{
    adapter::{LocalIntent, LocalPlayerAdapter},
    world::LocalPlayerState,
};

/// User input state at a moment in time.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputState {
    /// Strafe axis, +1 = right.
    pub right: f32,
    /// Walk axis, +1 = forward.
    pub forward: f32,
    /// Aim direction relative to the player, same axes as movement.
    pub aim_x: f32,
    pub aim_y: f32,
    pub fire: bool,
}

/// Turns sampled input into an intent. With no aim input the previous aim
/// heading is kept so the broadcast direction does not snap to 0.
pub fn build_intent(input: InputState, last_aim: f32) -> LocalIntent {
    let movement = heading_from_axes(input.right, input.forward);
    LocalIntent {
        moving: movement.is_some(),
        movement_angle: movement.unwrap_or(0.0),
        aim_angle: heading_from_axes(input.aim_x, input.aim_y).unwrap_or(last_aim),
        fire: input.fire,
    }
}

#[derive(Debug, Default)]
struct CellState {
    input: InputState,
    last_aim: f32,
    correction: Option<LocalPlayerState>,
    left_time: Option<u32>,
    state: SessionState,
    died: bool,
}

/// Latest input in, latest corrections out.
#[derive(Debug, Default)]
pub struct InputCell {
    inner: Mutex<CellState>,
}

impl InputCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, input: InputState) {
        self.lock().input = input;
    }

    pub fn update(&self, f: impl FnOnce(&mut InputState)) {
        f(&mut self.lock().input);
    }

    /// Last position/hp pushed by the session, if any.
    pub fn correction(&self) -> Option<LocalPlayerState> {
        self.lock().correction
    }

    pub fn left_time(&self) -> Option<u32> {
        self.lock().left_time
    }

    pub fn session_state(&self) -> SessionState {
        self.lock().state
    }

    /// Returns whether we died since the last call, and clears the flag.
    pub fn take_died(&self) -> bool {
        std::mem::take(&mut self.lock().died)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CellState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LocalPlayerAdapter for InputCell {
    fn intent(&self) -> LocalIntent {
        let mut s = self.lock();
        let intent = build_intent(s.input, s.last_aim);
        s.last_aim = intent.aim_angle;
        intent
    }

    fn apply_correction(&self, state: LocalPlayerState) {
        self.lock().correction = Some(state);
    }

    fn time_left_changed(&self, secs: u32) {
        self.lock().left_time = Some(secs);
    }

    fn state_changed(&self, state: SessionState) {
        self.lock().state = state;
    }

    fn died(&self) {
        self.lock().died = true;
    }
}
