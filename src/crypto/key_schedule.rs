//! QUIC key derivation (RFC 9001 §5).
//!
//! HKDF-Expand-Label, the version-1 Initial secrets, and the packet
//! protection labels applied to every traffic secret the TLS engine
//! hands over.

use crate::crypto::Hkdf;
use crate::error::Error;

/// QUIC v1 Initial salt (RFC 9001 section 5.2).
pub const INITIAL_SALT_V1: [u8; 20] = [
    0x38, 0x76, 0x2c, 0xf7, 0xf5, 0x59, 0x34, 0xb3, 0x4d, 0x17, 0x9a, 0xe6, 0xa4, 0xc8, 0x0c,
    0xad, 0xcc, 0xbb, 0x7f, 0x0a,
];

/// Longest HkdfLabel we build: 2 + 1 + "tls13 " + label + 1 + context.
const MAX_INFO_LEN: usize = 80;

/// HKDF-Expand-Label (RFC 8446 §7.1) with the "tls13 " prefix.
pub fn hkdf_expand_label<H: Hkdf>(
    hkdf: &H,
    secret: &[u8],
    label: &[u8],
    context: &[u8],
    out: &mut [u8],
) -> Result<(), Error> {
    const PREFIX: &[u8] = b"tls13 ";

    let mut info: heapless::Vec<u8, MAX_INFO_LEN> = heapless::Vec::new();
    let full_label_len = PREFIX.len() + label.len();
    if out.len() > u16::MAX as usize || full_label_len > u8::MAX as usize || context.len() > u8::MAX as usize
    {
        return Err(Error::Crypto);
    }

    let push = |info: &mut heapless::Vec<u8, MAX_INFO_LEN>, bytes: &[u8]| {
        info.extend_from_slice(bytes).map_err(|_| Error::Crypto)
    };
    push(&mut info, &(out.len() as u16).to_be_bytes())?;
    push(&mut info, &[full_label_len as u8])?;
    push(&mut info, PREFIX)?;
    push(&mut info, label)?;
    push(&mut info, &[context.len() as u8])?;
    push(&mut info, context)?;

    hkdf.expand(secret, &info, out)
}

/// Derive the client and server Initial secrets from the client's
/// first Destination Connection ID (RFC 9001 §5.2). Always SHA-256.
pub fn derive_initial_secrets<H: Hkdf>(
    hkdf: &H,
    dcid: &[u8],
    client_secret: &mut [u8; 32],
    server_secret: &mut [u8; 32],
) -> Result<(), Error> {
    let mut initial_secret = [0u8; 32];
    hkdf.extract(&INITIAL_SALT_V1, dcid, &mut initial_secret);

    let result = hkdf_expand_label(hkdf, &initial_secret, b"client in", &[], client_secret)
        .and_then(|_| hkdf_expand_label(hkdf, &initial_secret, b"server in", &[], server_secret));
    zeroize::Zeroize::zeroize(&mut initial_secret);
    result
}

/// Expand a traffic secret into AEAD key, IV and header-protection key.
///
/// Output lengths are taken from the slices.
pub fn derive_packet_keys<H: Hkdf>(
    hkdf: &H,
    secret: &[u8],
    key: &mut [u8],
    iv: &mut [u8],
    hp_key: &mut [u8],
) -> Result<(), Error> {
    hkdf_expand_label(hkdf, secret, b"quic key", &[], key)?;
    hkdf_expand_label(hkdf, secret, b"quic iv", &[], iv)?;
    hkdf_expand_label(hkdf, secret, b"quic hp", &[], hp_key)
}

/// Next-generation 1-RTT secret for a key update (RFC 9001 §6.1).
pub fn derive_next_secret<H: Hkdf>(
    hkdf: &H,
    current_secret: &[u8],
    new_secret: &mut [u8],
) -> Result<(), Error> {
    hkdf_expand_label(hkdf, current_secret, b"quic ku", &[], new_secret)
}
