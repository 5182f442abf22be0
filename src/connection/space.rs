//! Packet number spaces and their mapping to TLS encryption levels.

use crate::error::{Error, TransportError};
use crate::tls::EncryptionLevel;

/// One of the three independent packet number spaces (RFC 9000 §12.3).
///
/// Each has its own read/write key pair and its own CRYPTO stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumberSpace {
    Initial,
    Handshake,
    /// 1-RTT packets.
    AppData,
}

impl NumberSpace {
    pub const ALL: [NumberSpace; 3] = [Self::Initial, Self::Handshake, Self::AppData];

    /// Index into per-space arrays.
    pub const fn index(self) -> usize {
        match self {
            Self::Initial => 0,
            Self::Handshake => 1,
            Self::AppData => 2,
        }
    }

    /// The space a TLS encryption level's keys and bytes belong to.
    ///
    /// 0-RTT has no space of its own here; seeing it from the engine
    /// means the engine and the connection disagree about the
    /// handshake, which is an internal error.
    pub fn from_level(level: EncryptionLevel) -> Result<Self, Error> {
        match level {
            EncryptionLevel::Initial => Ok(Self::Initial),
            EncryptionLevel::Handshake => Ok(Self::Handshake),
            EncryptionLevel::Application => Ok(Self::AppData),
            EncryptionLevel::EarlyData => {
                log::warn!("no packet number space for TLS level {:?}", level);
                Err(Error::Transport(TransportError::InternalError))
            }
        }
    }

    /// The TLS encryption level used when feeding this space's bytes.
    pub const fn level(self) -> EncryptionLevel {
        match self {
            Self::Initial => EncryptionLevel::Initial,
            Self::Handshake => EncryptionLevel::Handshake,
            Self::AppData => EncryptionLevel::Application,
        }
    }
}
