//! `arena_client`
//!
//! Client-side systems:
//! - Session management (WebSocket, token handshake, command/heartbeat ticks)
//! - Snapshot reconciliation for both server dialects
//! - Entity store with render-side interpolation
//! - Input capture and the adapter seam to the renderer

pub mod adapter;
pub mod input;
pub mod reconcile;
pub mod session;
pub mod store;
pub mod world;

pub use adapter::{LocalIntent, LocalPlayerAdapter};
pub use session::Session;
pub use world::{SharedWorld, WorldView};
