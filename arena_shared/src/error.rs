//! Protocol error types.

use crate::state::SessionState;

/// Failures while reading frames or applying server state.
///
/// None of these are fatal to a session: the offending message or
/// transition is dropped and processing continues.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("frame too short: {len} bytes, need at least {need}")]
    ShortFrame { len: usize, need: usize },
    #[error("bad frame magic: {0:02x?}")]
    BadMagic([u8; 4]),
    #[error("unknown opcode {0}")]
    UnknownOpcode(u16),
    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(#[from] serde_json::Error),
    #[error("stale state transition {from:?} -> {to:?}")]
    StaleTransition { from: SessionState, to: SessionState },
}
