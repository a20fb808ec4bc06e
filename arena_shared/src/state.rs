//! Match lifecycle.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Where the match is, as seen by this client.
///
/// Transitions only move forward: `Match -> Start -> End`, with
/// `Match -> End` allowed when a match ends before we were ever placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum SessionState {
    /// Waiting for the first snapshot that places us in the world.
    #[default]
    Match,
    /// Own identity confirmed; gameplay active.
    Start,
    /// Match over. Terminal.
    End,
}

impl SessionState {
    /// Moves to `next` if that is a forward step.
    ///
    /// Returns `Ok(true)` when the state changed, `Ok(false)` when `next`
    /// equals the current state, and an error for any backward step.
    pub fn advance(&mut self, next: SessionState) -> Result<bool, ProtocolError> {
        match (*self).cmp(&next) {
            std::cmp::Ordering::Equal => Ok(false),
            std::cmp::Ordering::Less => {
                *self = next;
                Ok(true)
            }
            std::cmp::Ordering::Greater => Err(ProtocolError::StaleTransition {
                from: *self,
                to: next,
            }),
        }
    }

    pub fn is_terminal(self) -> bool {
        self == SessionState::End
    }
}
