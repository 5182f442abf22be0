//! Key material for one direction of one packet number space.

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::key_schedule;
use crate::crypto::rustcrypto::{Aes128GcmProvider, Aes256GcmProvider, HkdfSha256, HkdfSha384};
use crate::crypto::{Aead, DirectionalKeys, HeaderProtection, Hkdf};
use crate::error::Error;
use crate::tls::CipherSuite;

/// AEAD key, IV and header-protection key derived from a traffic secret
/// (RFC 9001 §5.1).
///
/// The material is wiped when the value is dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PacketKeys {
    #[zeroize(skip)]
    suite: CipherSuite,
    key: [u8; 32],
    iv: [u8; 12],
    hp_key: [u8; 32],
}

impl PacketKeys {
    /// Derive packet keys for `suite` from a TLS traffic secret.
    ///
    /// The secret must be exactly the suite's hash length.
    pub fn derive(suite: CipherSuite, secret: &[u8]) -> Result<Self, Error> {
        if secret.len() != suite.hash_len() {
            return Err(Error::Crypto);
        }
        match suite {
            CipherSuite::TlsAes256GcmSha384 => Self::expand(&HkdfSha384, suite, secret),
            CipherSuite::TlsAes128GcmSha256 | CipherSuite::TlsChacha20Poly1305Sha256 => {
                Self::expand(&HkdfSha256, suite, secret)
            }
        }
    }

    /// Derive the Initial keys for a connection from the client's first
    /// Destination Connection ID. Returns `(client, server)`.
    pub fn initial(dcid: &[u8]) -> Result<(Self, Self), Error> {
        let mut client_secret = zeroize::Zeroizing::new([0u8; 32]);
        let mut server_secret = zeroize::Zeroizing::new([0u8; 32]);
        key_schedule::derive_initial_secrets(
            &HkdfSha256,
            dcid,
            &mut client_secret,
            &mut server_secret,
        )?;

        let suite = CipherSuite::TlsAes128GcmSha256;
        Ok((
            Self::expand(&HkdfSha256, suite, &client_secret[..])?,
            Self::expand(&HkdfSha256, suite, &server_secret[..])?,
        ))
    }

    /// Derive the next-generation 1-RTT secret (key update) into `out`.
    pub fn next_secret(suite: CipherSuite, secret: &[u8], out: &mut [u8]) -> Result<(), Error> {
        let len = suite.hash_len();
        if secret.len() != len || out.len() < len {
            return Err(Error::Crypto);
        }
        match suite {
            CipherSuite::TlsAes256GcmSha384 => {
                key_schedule::derive_next_secret(&HkdfSha384, secret, &mut out[..len])
            }
            _ => key_schedule::derive_next_secret(&HkdfSha256, secret, &mut out[..len]),
        }
    }

    fn expand<H: Hkdf>(hkdf: &H, suite: CipherSuite, secret: &[u8]) -> Result<Self, Error> {
        let mut keys = Self {
            suite,
            key: [0u8; 32],
            iv: [0u8; 12],
            hp_key: [0u8; 32],
        };
        key_schedule::derive_packet_keys(
            hkdf,
            secret,
            &mut keys.key[..suite.key_len()],
            &mut keys.iv,
            &mut keys.hp_key[..suite.hp_key_len()],
        )?;
        Ok(keys)
    }

    pub fn suite(&self) -> CipherSuite {
        self.suite
    }

    /// AEAD key.
    pub fn key(&self) -> &[u8] {
        &self.key[..self.suite.key_len()]
    }

    pub fn iv(&self) -> &[u8; 12] {
        &self.iv
    }

    /// Header protection key.
    pub fn hp_key(&self) -> &[u8] {
        &self.hp_key[..self.suite.hp_key_len()]
    }

    /// Build the ciphers the packet layer needs from this material.
    pub fn protection(&self) -> Result<Protection, Error> {
        Ok(match self.suite {
            CipherSuite::TlsAes128GcmSha256 => {
                Protection::Aes128Gcm(DirectionalKeys::from_packet_keys(&Aes128GcmProvider, self)?)
            }
            CipherSuite::TlsAes256GcmSha384 => {
                Protection::Aes256Gcm(DirectionalKeys::from_packet_keys(&Aes256GcmProvider, self)?)
            }
            #[cfg(feature = "rustcrypto-chacha")]
            CipherSuite::TlsChacha20Poly1305Sha256 => Protection::ChaCha20Poly1305(
                DirectionalKeys::from_packet_keys(&crate::crypto::rustcrypto::ChaCha20Provider, self)?,
            ),
            #[cfg(not(feature = "rustcrypto-chacha"))]
            CipherSuite::TlsChacha20Poly1305Sha256 => return Err(Error::Crypto),
        })
    }
}

/// Compares the material in constant time.
impl PartialEq for PacketKeys {
    fn eq(&self, other: &Self) -> bool {
        let material = ct_eq(&self.key, &other.key)
            & ct_eq(&self.iv, &other.iv)
            & ct_eq(&self.hp_key, &other.hp_key);
        self.suite == other.suite && material
    }
}

impl Eq for PacketKeys {}

/// Constant-time comparison of two byte slices.
fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (&x, &y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

impl core::fmt::Debug for PacketKeys {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PacketKeys")
            .field("suite", &self.suite)
            .finish_non_exhaustive()
    }
}

type Directional<P> = DirectionalKeys<
    <P as crate::crypto::CryptoProvider>::Aead,
    <P as crate::crypto::CryptoProvider>::HeaderProtection,
>;

/// Live packet protection for one direction, for whichever suite was
/// negotiated.
pub enum Protection {
    Aes128Gcm(Directional<Aes128GcmProvider>),
    Aes256Gcm(Directional<Aes256GcmProvider>),
    #[cfg(feature = "rustcrypto-chacha")]
    ChaCha20Poly1305(Directional<crate::crypto::rustcrypto::ChaCha20Provider>),
}

macro_rules! with_keys {
    ($self:expr, $k:ident => $body:expr) => {
        match $self {
            Protection::Aes128Gcm($k) => $body,
            Protection::Aes256Gcm($k) => $body,
            #[cfg(feature = "rustcrypto-chacha")]
            Protection::ChaCha20Poly1305($k) => $body,
        }
    };
}

impl Protection {
    /// Encrypt a packet payload in place. See [`Aead::seal_in_place`].
    pub fn seal_in_place(
        &self,
        packet_number: u64,
        aad: &[u8],
        buf: &mut [u8],
        payload_len: usize,
    ) -> Result<usize, Error> {
        with_keys!(self, k => k.aead.seal_in_place(&k.nonce(packet_number), aad, buf, payload_len))
    }

    /// Decrypt a packet payload in place. See [`Aead::open_in_place`].
    pub fn open_in_place(
        &self,
        packet_number: u64,
        aad: &[u8],
        buf: &mut [u8],
        ciphertext_len: usize,
    ) -> Result<usize, Error> {
        with_keys!(self, k => k.aead.open_in_place(&k.nonce(packet_number), aad, buf, ciphertext_len))
    }

    /// Header protection mask for a ciphertext sample.
    pub fn header_mask(&self, sample: &[u8; 16]) -> [u8; 5] {
        with_keys!(self, k => k.header_protection.mask(sample))
    }
}
