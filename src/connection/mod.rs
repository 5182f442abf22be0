//! Connection-side handshake coordination.
//!
//! The pieces a QUIC connection needs around a TLS 1.3 engine: packet
//! number spaces, the six packet key slots, one CRYPTO stream per space,
//! and the [`Handshake`] driver that routes engine events into them.

pub mod crypto_stream;
pub mod handshake;
pub mod keys;
pub mod space;

pub use crypto_stream::{CryptoStream, InboundCrypto, OutboundCrypto, DEFAULT_CRYPTO_BUF};
pub use handshake::{Handshake, HandshakeHooks};
pub use keys::{Direction, KeyStore};
pub use space::NumberSpace;

use crate::tls::Role;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Per-connection handshake policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeConfig {
    pub role: Role,
    /// Server only: issue a session ticket once the handshake is confirmed.
    pub session_tickets: bool,
}

impl HandshakeConfig {
    pub const fn client() -> Self {
        Self {
            role: Role::Client,
            session_tickets: true,
        }
    }

    pub const fn server() -> Self {
        Self {
            role: Role::Server,
            session_tickets: true,
        }
    }

    pub const fn with_session_tickets(mut self, enabled: bool) -> Self {
        self.session_tickets = enabled;
        self
    }
}
