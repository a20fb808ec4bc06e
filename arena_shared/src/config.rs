//! Configuration system.
//!
//! Loads client configuration from JSON strings (file IO left to the app).

use serde::{Deserialize, Serialize};

use crate::ids::PlayerId;

/// Fraction of the remaining distance covered per interpolation step.
pub const DEFAULT_INTERP_BLEND: f32 = 0.2;

/// Client session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Room server WebSocket URL, e.g. `ws://127.0.0.1:9001`.
    pub server_url: String,
    /// Player id handed out by the bootstrap service.
    pub player_id: PlayerId,
    /// Room token handed out by the bootstrap service.
    #[serde(default)]
    pub token: String,
    /// Period of the command tick (move / shot / direct).
    #[serde(default = "default_command_interval_ms")]
    pub command_interval_ms: u64,
    /// Period of the keep-alive tick.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Blend factor for one interpolation step.
    #[serde(default = "default_interp_blend")]
    pub interp_blend: f32,
    /// Rate at which a headless renderer steps interpolation.
    #[serde(default = "default_render_hz")]
    pub render_hz: u32,
}

fn default_command_interval_ms() -> u64 {
    50
}

fn default_heartbeat_interval_ms() -> u64 {
    500
}

fn default_interp_blend() -> f32 {
    DEFAULT_INTERP_BLEND
}

fn default_render_hz() -> u32 {
    60
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:9001".to_string(),
            player_id: PlayerId(1),
            token: String::new(),
            command_interval_ms: default_command_interval_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            interp_blend: default_interp_blend(),
            render_hz: default_render_hz(),
        }
    }
}

impl ClientConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}
