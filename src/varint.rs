//! QUIC variable-length integers (RFC 9000 §16), as used by the
//! transport-parameter codec.
//!
//! The two most significant bits of the first byte give the encoded
//! length: `00` → 1, `01` → 2, `10` → 4, `11` → 8 bytes.

use crate::error::Error;

/// Maximum value representable as a QUIC varint (2^62 - 1).
pub const MAX_VARINT: u64 = (1 << 62) - 1;

/// How many bytes are needed to encode `value`?
pub const fn varint_len(value: u64) -> usize {
    if value < 1 << 6 {
        1
    } else if value < 1 << 14 {
        2
    } else if value < 1 << 30 {
        4
    } else {
        8
    }
}

/// Decode a varint from the front of `buf`.
///
/// Returns `(value, bytes_consumed)`.
pub fn decode_varint(buf: &[u8]) -> Result<(u64, usize), Error> {
    let first = *buf.first().ok_or(Error::BufferTooSmall { needed: 1 })?;
    let len = 1usize << (first >> 6);
    if buf.len() < len {
        return Err(Error::BufferTooSmall { needed: len });
    }

    let mut value = u64::from(first & 0x3f);
    for &b in &buf[1..len] {
        value = (value << 8) | u64::from(b);
    }
    Ok((value, len))
}

/// Encode `value` into the front of `buf`, using the shortest form.
///
/// Returns the number of bytes written.
pub fn encode_varint(value: u64, buf: &mut [u8]) -> Result<usize, Error> {
    if value > MAX_VARINT {
        return Err(Error::Transport(crate::error::TransportError::InternalError));
    }
    let len = varint_len(value);
    if buf.len() < len {
        return Err(Error::BufferTooSmall { needed: len });
    }

    let bytes = value.to_be_bytes();
    buf[..len].copy_from_slice(&bytes[8 - len..]);
    buf[0] |= match len {
        1 => 0x00,
        2 => 0x40,
        4 => 0x80,
        _ => 0xc0,
    };
    Ok(len)
}
