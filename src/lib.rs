#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

#[cfg(any(test, feature = "std"))]
extern crate std;

#[cfg(feature = "alloc")]
extern crate alloc;

pub mod buf;

pub mod error;
pub mod varint;

pub mod crypto;
pub mod tls;

pub mod connection;
pub use connection::{
    CryptoStream, Direction, Handshake, HandshakeConfig, HandshakeHooks, KeyStore, NumberSpace,
};
pub use tls::{EncryptionLevel, HandshakeEvent, Role, TlsSession};

/// Timestamp in microseconds from an arbitrary epoch.
pub type Instant = u64;
