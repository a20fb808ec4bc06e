//! `arena_shared`
//!
//! Protocol pieces shared by the client and test servers.
//!
//! Design goals:
//! - Bit-exact outbound frames, built by pure functions.
//! - Tolerant inbound parsing: both snapshot dialects, unknown fields ignored.
//! - Distinct id types per entity kind.
//! - No `unsafe`.

pub mod codec;
pub mod config;
pub mod error;
pub mod ids;
pub mod math;
pub mod snapshot;
pub mod state;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::codec::*;
    pub use crate::config::*;
    pub use crate::error::*;
    pub use crate::ids::*;
    pub use crate::math::*;
    pub use crate::snapshot::*;
    pub use crate::state::*;
}
