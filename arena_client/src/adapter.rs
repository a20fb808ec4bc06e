//! Seam between the session and whatever draws the game.
//!
//! The session never reads a keyboard or touches a scene. It asks the
//! adapter for the player's intent once per command tick, and pushes
//! authoritative corrections back through it.

use arena_shared::state::SessionState;

use crate::world::LocalPlayerState;

/// What the local player wants to do this tick. Angles are degrees; the
/// session normalizes them before encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LocalIntent {
    /// Whether there is any movement input at all.
    pub moving: bool,
    pub movement_angle: f32,
    pub aim_angle: f32,
    pub fire: bool,
}

/// Implemented by the renderer.
pub trait LocalPlayerAdapter: Send + Sync {
    /// Polled every command tick.
    fn intent(&self) -> LocalIntent;

    /// Server-authoritative position and hp for the local player.
    fn apply_correction(&self, state: LocalPlayerState);

    /// Countdown changed. Called only on change.
    fn time_left_changed(&self, _secs: u32) {}

    fn state_changed(&self, _state: SessionState) {}

    /// Our hp just hit 0. Fired once per death; respawn with
    /// `Session::send_relife`.
    fn died(&self) {}
}
