//! RustCrypto-backed implementations of the QUIC crypto traits.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use aes_gcm::aead::consts::{U12, U16};
use aes_gcm::aead::generic_array::typenum::Unsigned;
use aes_gcm::aead::{AeadInPlace, KeySizeUser};

use crate::crypto::{Aead as AeadTrait, CryptoProvider, HeaderProtection, Hkdf as HkdfTrait};
use crate::error::Error;

// ---- HKDF ----

macro_rules! hkdf_impl {
    ($(#[$doc:meta])* $name:ident, $digest:ty, $len:expr) => {
        $(#[$doc])*
        #[derive(Debug, Default, Clone, Copy)]
        pub struct $name;

        impl HkdfTrait for $name {
            const HASH_LEN: usize = $len;

            fn extract(&self, salt: &[u8], ikm: &[u8], prk: &mut [u8]) {
                let (out, _) = hkdf::Hkdf::<$digest>::extract(Some(salt), ikm);
                prk[..$len].copy_from_slice(&out);
            }

            fn expand(&self, prk: &[u8], info: &[u8], okm: &mut [u8]) -> Result<(), Error> {
                let hk = hkdf::Hkdf::<$digest>::from_prk(prk).map_err(|_| Error::Crypto)?;
                hk.expand(info, okm).map_err(|_| Error::Crypto)
            }
        }
    };
}

hkdf_impl!(
    /// HKDF-SHA256, used by the AES-128-GCM and ChaCha20 suites and for Initial keys.
    HkdfSha256,
    sha2::Sha256,
    32
);
hkdf_impl!(
    /// HKDF-SHA384, used by TLS_AES_256_GCM_SHA384.
    HkdfSha384,
    sha2::Sha384,
    48
);

// ---- AEAD ----

/// Any RustCrypto AEAD with QUIC's 12-byte nonce and 16-byte tag.
pub struct AeadCipher<A> {
    cipher: A,
}

pub type Aes128GcmAead = AeadCipher<aes_gcm::Aes128Gcm>;
pub type Aes256GcmAead = AeadCipher<aes_gcm::Aes256Gcm>;
#[cfg(feature = "rustcrypto-chacha")]
pub type ChaCha20Poly1305Aead = AeadCipher<chacha20poly1305::ChaCha20Poly1305>;

impl<A> AeadCipher<A>
where
    A: AeadInPlace<NonceSize = U12, TagSize = U16> + KeyInit,
{
    fn new(key: &[u8]) -> Result<Self, Error> {
        if key.len() != <A as KeySizeUser>::KeySize::USIZE {
            return Err(Error::Crypto);
        }
        let cipher = A::new_from_slice(key).map_err(|_| Error::Crypto)?;
        Ok(Self { cipher })
    }
}

impl<A> AeadTrait for AeadCipher<A>
where
    A: AeadInPlace<NonceSize = U12, TagSize = U16> + KeyInit,
{
    const KEY_LEN: usize = <A as KeySizeUser>::KeySize::USIZE;
    const TAG_LEN: usize = 16;

    fn seal_in_place(
        &self,
        nonce: &[u8; 12],
        aad: &[u8],
        buf: &mut [u8],
        payload_len: usize,
    ) -> Result<usize, Error> {
        let total = payload_len + Self::TAG_LEN;
        if buf.len() < total {
            return Err(Error::BufferTooSmall { needed: total });
        }

        let tag = self
            .cipher
            .encrypt_in_place_detached(GenericArray::from_slice(nonce), aad, &mut buf[..payload_len])
            .map_err(|_| Error::Crypto)?;
        buf[payload_len..total].copy_from_slice(&tag);
        Ok(total)
    }

    fn open_in_place(
        &self,
        nonce: &[u8; 12],
        aad: &[u8],
        buf: &mut [u8],
        ciphertext_len: usize,
    ) -> Result<usize, Error> {
        if ciphertext_len < Self::TAG_LEN || ciphertext_len > buf.len() {
            return Err(Error::Crypto);
        }
        let plaintext_len = ciphertext_len - Self::TAG_LEN;
        let (payload, rest) = buf.split_at_mut(plaintext_len);
        let tag = GenericArray::clone_from_slice(&rest[..Self::TAG_LEN]);
        self.cipher
            .decrypt_in_place_detached(GenericArray::from_slice(nonce), aad, payload, &tag)
            .map_err(|_| Error::Crypto)?;
        Ok(plaintext_len)
    }
}

// ---- AES Header Protection ----

/// AES-ECB header protection, for either AES key size.
pub struct AesHeaderProtection<B> {
    cipher: B,
}

impl<B: BlockEncrypt<BlockSize = U16>> HeaderProtection for AesHeaderProtection<B> {
    fn mask(&self, sample: &[u8; 16]) -> [u8; 5] {
        let mut block = GenericArray::clone_from_slice(sample);
        self.cipher.encrypt_block(&mut block);
        let mut mask = [0u8; 5];
        mask.copy_from_slice(&block[..5]);
        mask
    }
}

fn aes_header_protection<B>(key: &[u8]) -> Result<AesHeaderProtection<B>, Error>
where
    B: BlockEncrypt<BlockSize = U16> + KeyInit,
{
    if key.len() != <B as KeySizeUser>::KeySize::USIZE {
        return Err(Error::Crypto);
    }
    let cipher = B::new_from_slice(key).map_err(|_| Error::Crypto)?;
    Ok(AesHeaderProtection { cipher })
}

// ---- ChaCha20 Header Protection ----

#[cfg(feature = "rustcrypto-chacha")]
/// ChaCha20 header protection (RFC 9001 §5.4.4).
pub struct ChaChaHeaderProtection {
    key: zeroize::Zeroizing<[u8; 32]>,
}

#[cfg(feature = "rustcrypto-chacha")]
impl HeaderProtection for ChaChaHeaderProtection {
    fn mask(&self, sample: &[u8; 16]) -> [u8; 5] {
        use chacha20::cipher::{KeyIvInit, StreamCipher, StreamCipherSeek};

        // counter = sample[0..4] (little endian), nonce = sample[4..16]
        let counter = u32::from_le_bytes([sample[0], sample[1], sample[2], sample[3]]);
        let mut cipher = chacha20::ChaCha20::new(
            GenericArray::from_slice(&self.key[..]),
            GenericArray::from_slice(&sample[4..16]),
        );
        cipher.seek(u64::from(counter) * 64);

        let mut mask = [0u8; 5];
        cipher.apply_keystream(&mut mask);
        mask
    }
}

// ---- CryptoProvider bundles ----

/// TLS_AES_128_GCM_SHA256.
#[derive(Debug, Default, Clone, Copy)]
pub struct Aes128GcmProvider;

impl CryptoProvider for Aes128GcmProvider {
    type Aead = Aes128GcmAead;
    type Hkdf = HkdfSha256;
    type HeaderProtection = AesHeaderProtection<aes::Aes128>;

    fn aead(&self, key: &[u8]) -> Result<Self::Aead, Error> {
        AeadCipher::new(key)
    }

    fn hkdf(&self) -> Self::Hkdf {
        HkdfSha256
    }

    fn header_protection(&self, key: &[u8]) -> Result<Self::HeaderProtection, Error> {
        aes_header_protection(key)
    }
}

/// TLS_AES_256_GCM_SHA384.
#[derive(Debug, Default, Clone, Copy)]
pub struct Aes256GcmProvider;

impl CryptoProvider for Aes256GcmProvider {
    type Aead = Aes256GcmAead;
    type Hkdf = HkdfSha384;
    type HeaderProtection = AesHeaderProtection<aes::Aes256>;

    fn aead(&self, key: &[u8]) -> Result<Self::Aead, Error> {
        AeadCipher::new(key)
    }

    fn hkdf(&self) -> Self::Hkdf {
        HkdfSha384
    }

    fn header_protection(&self, key: &[u8]) -> Result<Self::HeaderProtection, Error> {
        aes_header_protection(key)
    }
}

#[cfg(feature = "rustcrypto-chacha")]
/// TLS_CHACHA20_POLY1305_SHA256.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChaCha20Provider;

#[cfg(feature = "rustcrypto-chacha")]
impl CryptoProvider for ChaCha20Provider {
    type Aead = ChaCha20Poly1305Aead;
    type Hkdf = HkdfSha256;
    type HeaderProtection = ChaChaHeaderProtection;

    fn aead(&self, key: &[u8]) -> Result<Self::Aead, Error> {
        AeadCipher::new(key)
    }

    fn hkdf(&self) -> Self::Hkdf {
        HkdfSha256
    }

    fn header_protection(&self, key: &[u8]) -> Result<Self::HeaderProtection, Error> {
        let key: [u8; 32] = key.try_into().map_err(|_| Error::Crypto)?;
        Ok(ChaChaHeaderProtection {
            key: zeroize::Zeroizing::new(key),
        })
    }
}
