//! The boundary between QUIC and a TLS 1.3 engine (RFC 9001 §4).
//!
//! QUIC uses TLS 1.3 differently from TCP:
//! - no TLS record layer: raw handshake messages travel in CRYPTO frames
//! - no TLS content encryption: QUIC protects its own packets
//! - QUIC transport parameters are exchanged as a TLS extension
//!
//! The engine itself is external. It is driven through [`TlsSession`]
//! and reports progress as a sequence of [`HandshakeEvent`]s, which the
//! connection drains until [`HandshakeEvent::NoEvent`].

pub mod transport_params;

pub use transport_params::TransportParams;

use crate::error::Error;

/// Client or server role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Initiator.
    Client,
    /// Responder.
    Server,
}

/// The engine's name for an encryption level.
///
/// TLS knows a 0-RTT level that QUIC handles outside the handshake
/// spaces; it has no [`NumberSpace`](crate::connection::NumberSpace).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionLevel {
    Initial,
    EarlyData,
    Handshake,
    Application,
}

/// TLS 1.3 cipher suites usable with QUIC v1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherSuite {
    TlsAes128GcmSha256,
    TlsAes256GcmSha384,
    TlsChacha20Poly1305Sha256,
}

impl CipherSuite {
    pub fn to_u16(self) -> u16 {
        match self {
            Self::TlsAes128GcmSha256 => 0x1301,
            Self::TlsAes256GcmSha384 => 0x1302,
            Self::TlsChacha20Poly1305Sha256 => 0x1303,
        }
    }

    pub fn from_u16(v: u16) -> Option<Self> {
        match v {
            0x1301 => Some(Self::TlsAes128GcmSha256),
            0x1302 => Some(Self::TlsAes256GcmSha384),
            0x1303 => Some(Self::TlsChacha20Poly1305Sha256),
            _ => None,
        }
    }

    /// Length of traffic secrets for this suite (the hash output size).
    pub fn hash_len(self) -> usize {
        match self {
            Self::TlsAes256GcmSha384 => 48,
            Self::TlsAes128GcmSha256 | Self::TlsChacha20Poly1305Sha256 => 32,
        }
    }

    /// AEAD key length.
    pub fn key_len(self) -> usize {
        match self {
            Self::TlsAes128GcmSha256 => 16,
            Self::TlsAes256GcmSha384 | Self::TlsChacha20Poly1305Sha256 => 32,
        }
    }

    /// Header protection key length (same as the AEAD key for all v1 suites).
    pub fn hp_key_len(self) -> usize {
        self.key_len()
    }
}

/// One unit of progress reported by the TLS engine.
///
/// Byte payloads borrow from the engine and are valid until the next
/// call into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeEvent<'a> {
    /// Nothing more to do until new input arrives.
    NoEvent,
    /// Install keys for reading packets at `level`.
    SetReadSecret {
        level: EncryptionLevel,
        suite: CipherSuite,
        secret: &'a [u8],
    },
    /// Install keys for writing packets at `level`.
    SetWriteSecret {
        level: EncryptionLevel,
        suite: CipherSuite,
        secret: &'a [u8],
    },
    /// Handshake bytes to send in CRYPTO frames at `level`.
    WriteData {
        level: EncryptionLevel,
        data: &'a [u8],
    },
    /// The TLS handshake has completed.
    HandshakeDone,
    /// The peer's encoded quic_transport_parameters extension.
    TransportParameters(&'a [u8]),
}

/// The TLS engine capabilities the handshake coordinator needs.
///
/// Implementations wrap a concrete TLS 1.3 stack and must emit each
/// (level, direction) secret at most once. Bytes passed to `feed` are
/// always in stream order for their level, without gaps or repeats.
pub trait TlsSession {
    /// Begin the handshake in the given role. A client produces its
    /// ClientHello as a `WriteData` event.
    fn start(&mut self, role: Role) -> Result<(), Error>;

    /// Next pending event; `NoEvent` when idle.
    fn next_event(&mut self) -> HandshakeEvent<'_>;

    /// Provide in-order handshake bytes received at `level`.
    fn feed(&mut self, level: EncryptionLevel, data: &[u8]) -> Result<(), Error>;

    /// Set our encoded transport parameters. Called before `start`.
    fn set_transport_parameters(&mut self, data: &[u8]);

    /// Issue a NewSessionTicket (server only, after the handshake).
    fn send_session_ticket(&mut self, allow_early_data: bool) -> Result<(), Error>;
}
