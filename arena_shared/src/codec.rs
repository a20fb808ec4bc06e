//! Outbound command frames.
//!
//! Every client command is a single binary transport message:
//!
//! ```text
//! offset  size  field
//! 0       4     magic   00 01 00 00
//! 4       2     tag     0x0008 (LE)
//! 6       2     opcode  (LE)
//! 8       ..    payload (LE integers)
//! ```
//!
//! The client only ever encodes. [`Command::decode`] exists so test servers
//! can read what a client sent.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{error::ProtocolError, ids::PlayerId};

pub const MAGIC: [u8; 4] = [0x00, 0x01, 0x00, 0x00];
pub const HEADER_TAG: u16 = 0x0008;
pub const HEADER_LEN: usize = 8;

/// Power field of a move command. The server only understands full power.
pub const MOVE_POWER: u32 = 1;

/// Command kind carried in the frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Opcode {
    Token = 0,
    Move = 1,
    Shot = 3,
    Heart = 4,
    Direct = 5,
    Relife = 6,
}

impl TryFrom<u16> for Opcode {
    type Error = ProtocolError;

    fn try_from(v: u16) -> Result<Self, Self::Error> {
        Ok(match v {
            0 => Opcode::Token,
            1 => Opcode::Move,
            3 => Opcode::Shot,
            4 => Opcode::Heart,
            5 => Opcode::Direct,
            6 => Opcode::Relife,
            other => return Err(ProtocolError::UnknownOpcode(other)),
        })
    }
}

/// A client -> server command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Binds the connection to a player. Sent once, first.
    Token { id: PlayerId, token: String },
    /// Walk toward a heading (whole degrees).
    Move { angle: u32 },
    /// Fire toward a heading.
    Shot { angle: u32 },
    /// Keep-alive.
    Heart,
    /// Current aim heading, broadcast continuously.
    Direct { angle: u32 },
    /// Respawn after death.
    Relife,
}

impl Command {
    pub fn opcode(&self) -> Opcode {
        match self {
            Command::Token { .. } => Opcode::Token,
            Command::Move { .. } => Opcode::Move,
            Command::Shot { .. } => Opcode::Shot,
            Command::Heart => Opcode::Heart,
            Command::Direct { .. } => Opcode::Direct,
            Command::Relife => Opcode::Relife,
        }
    }

    /// Builds the wire frame for this command.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.payload_len());
        buf.put_slice(&MAGIC);
        buf.put_u16_le(HEADER_TAG);
        buf.put_u16_le(self.opcode() as u16);

        match self {
            Command::Token { id, token } => {
                buf.put_u32_le(id.0);
                // One byte per character; the protocol is 7-bit ASCII only.
                for c in token.chars() {
                    buf.put_u8((u32::from(c) & 0xff) as u8);
                }
            }
            Command::Move { angle } => {
                buf.put_u32_le(*angle);
                buf.put_u32_le(MOVE_POWER);
            }
            Command::Shot { angle } | Command::Direct { angle } => buf.put_u32_le(*angle),
            Command::Heart | Command::Relife => {}
        }

        buf.freeze()
    }

    fn payload_len(&self) -> usize {
        match self {
            Command::Token { token, .. } => 4 + token.chars().count(),
            Command::Move { .. } => 8,
            Command::Shot { .. } | Command::Direct { .. } => 4,
            Command::Heart | Command::Relife => 0,
        }
    }

    /// Parses a frame produced by [`Command::encode`].
    pub fn decode(frame: &[u8]) -> Result<Self, ProtocolError> {
        let opcode = FrameHeader::parse(frame)?.opcode;
        let mut payload = &frame[HEADER_LEN..];

        let need = |n: usize| {
            if frame.len() < HEADER_LEN + n {
                Err(ProtocolError::ShortFrame {
                    len: frame.len(),
                    need: HEADER_LEN + n,
                })
            } else {
                Ok(())
            }
        };

        Ok(match opcode {
            Opcode::Token => {
                need(4)?;
                let id = PlayerId(payload.get_u32_le());
                let token = payload.iter().map(|&b| char::from(b)).collect();
                Command::Token { id, token }
            }
            Opcode::Move => {
                need(8)?;
                let angle = payload.get_u32_le();
                let _power = payload.get_u32_le();
                Command::Move { angle }
            }
            Opcode::Shot => {
                need(4)?;
                Command::Shot {
                    angle: payload.get_u32_le(),
                }
            }
            Opcode::Direct => {
                need(4)?;
                Command::Direct {
                    angle: payload.get_u32_le(),
                }
            }
            Opcode::Heart => Command::Heart,
            Opcode::Relife => Command::Relife,
        })
    }
}

/// The fixed 8-byte prefix of every command frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub tag: u16,
    pub opcode: Opcode,
}

impl FrameHeader {
    pub fn parse(frame: &[u8]) -> Result<Self, ProtocolError> {
        if frame.len() < HEADER_LEN {
            return Err(ProtocolError::ShortFrame {
                len: frame.len(),
                need: HEADER_LEN,
            });
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&frame[..4]);
        if magic != MAGIC {
            return Err(ProtocolError::BadMagic(magic));
        }
        let mut rest = &frame[4..HEADER_LEN];
        let tag = rest.get_u16_le();
        let opcode = Opcode::try_from(rest.get_u16_le())?;
        Ok(Self { tag, opcode })
    }
}

pub fn encode_token(id: PlayerId, token: &str) -> Bytes {
    Command::Token {
        id,
        token: token.to_string(),
    }
    .encode()
}

pub fn encode_move(angle: u32) -> Bytes {
    Command::Move { angle }.encode()
}

pub fn encode_shot(angle: u32) -> Bytes {
    Command::Shot { angle }.encode()
}

pub fn encode_heart() -> Bytes {
    Command::Heart.encode()
}

pub fn encode_direct(angle: u32) -> Bytes {
    Command::Direct { angle }.encode()
}

pub fn encode_relife() -> Bytes {
    Command::Relife.encode()
}
