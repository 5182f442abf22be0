//! Cryptographic primitives behind QUIC packet protection.
//!
//! The handshake layer only derives and stores key material
//! ([`PacketKeys`]). Turning that material into working ciphers is the
//! job of a [`CryptoProvider`]: one per cipher suite, bundling the AEAD,
//! the HKDF hash and the header-protection cipher. The RustCrypto-backed
//! providers live in [`rustcrypto`].

pub mod key_schedule;
pub mod packet_keys;
pub mod rustcrypto;

pub use packet_keys::{PacketKeys, Protection};

use crate::error::Error;

/// Authenticated encryption for QUIC packet payloads (RFC 9001 §5.3).
pub trait Aead {
    /// Key length in bytes.
    const KEY_LEN: usize;
    /// Authentication tag length in bytes (16 for every QUIC v1 suite).
    const TAG_LEN: usize;

    /// Encrypt `buf[..payload_len]` in place and append the tag.
    ///
    /// Returns the ciphertext + tag length.
    fn seal_in_place(
        &self,
        nonce: &[u8; 12],
        aad: &[u8],
        buf: &mut [u8],
        payload_len: usize,
    ) -> Result<usize, Error>;

    /// Verify and decrypt `buf[..ciphertext_len]` in place.
    ///
    /// Returns the plaintext length.
    fn open_in_place(
        &self,
        nonce: &[u8; 12],
        aad: &[u8],
        buf: &mut [u8],
        ciphertext_len: usize,
    ) -> Result<usize, Error>;
}

/// Header protection cipher (RFC 9001 §5.4).
pub trait HeaderProtection {
    /// Compute the 5-byte mask from a 16-byte ciphertext sample.
    fn mask(&self, sample: &[u8; 16]) -> [u8; 5];
}

/// HMAC-based key derivation (RFC 5869) over the suite's hash.
pub trait Hkdf {
    /// Hash output length in bytes.
    const HASH_LEN: usize;

    /// HKDF-Extract into `prk[..HASH_LEN]`.
    fn extract(&self, salt: &[u8], ikm: &[u8], prk: &mut [u8]);

    /// HKDF-Expand `prk` with `info` to fill `okm`.
    fn expand(&self, prk: &[u8], info: &[u8], okm: &mut [u8]) -> Result<(), Error>;
}

/// Bundle of primitives for one cipher suite.
pub trait CryptoProvider {
    type Aead: Aead;
    type Hkdf: Hkdf;
    type HeaderProtection: HeaderProtection;

    /// Create an AEAD instance from a key.
    fn aead(&self, key: &[u8]) -> Result<Self::Aead, Error>;

    /// Get an HKDF instance for key derivation.
    fn hkdf(&self) -> Self::Hkdf;

    /// Create a header protection cipher from a key.
    fn header_protection(&self, key: &[u8]) -> Result<Self::HeaderProtection, Error>;
}

/// Live keys for one direction at one encryption level.
pub struct DirectionalKeys<A: Aead, H: HeaderProtection> {
    pub aead: A,
    pub header_protection: H,
    /// Nonce base, XORed with the packet number per packet.
    pub iv: [u8; 12],
}

impl<A: Aead, H: HeaderProtection> DirectionalKeys<A, H> {
    /// Build live ciphers from derived key material.
    pub fn from_packet_keys<C>(provider: &C, keys: &PacketKeys) -> Result<Self, Error>
    where
        C: CryptoProvider<Aead = A, HeaderProtection = H>,
    {
        Ok(Self {
            aead: provider.aead(keys.key())?,
            header_protection: provider.header_protection(keys.hp_key())?,
            iv: *keys.iv(),
        })
    }

    /// AEAD nonce for `packet_number`: the IV with the packet number
    /// XORed into its low 8 bytes.
    pub fn nonce(&self, packet_number: u64) -> [u8; 12] {
        let mut nonce = self.iv;
        for (n, p) in nonce[4..].iter_mut().zip(packet_number.to_be_bytes()) {
            *n ^= p;
        }
        nonce
    }
}
