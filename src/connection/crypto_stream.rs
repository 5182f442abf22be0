//! CRYPTO stream buffering for one packet number space (RFC 9000 §19.6).
//!
//! Inbound spans arrive at arbitrary offsets, possibly overlapping or
//! out of order; only the gap-free prefix at the delivery cursor is ever
//! handed to the TLS engine. Outbound bytes from the engine are appended
//! and read back by the framer with their stream offset.

use crate::buf::{Buf, BufExt};
use crate::error::{Error, TransportError};

/// Default per-space CRYPTO buffer size (bytes).
pub const DEFAULT_CRYPTO_BUF: usize = 4096;

/// Upper bound on buffered inbound CRYPTO data when heap-backed.
#[cfg(feature = "alloc")]
pub const MAX_CRYPTO_BUFFER: usize = 64 * 1024;

/// Most disjoint received ranges tracked at once.
const MAX_RANGES: usize = 16;

type Ranges = heapless::Vec<(u64, u64), MAX_RANGES>;

fn exceeded() -> Error {
    Error::Transport(TransportError::CryptoBufferExceeded)
}

/// Reassembly buffer for received CRYPTO data.
///
/// `data[0]` is stream offset `base`. Bytes already delivered stay
/// buffered so retransmissions can be checked against them, until room
/// is needed for new data.
pub struct InboundCrypto<const N: usize = DEFAULT_CRYPTO_BUF> {
    data: Buf<N>,
    base: u64,
    /// Next stream offset to deliver.
    cursor: u64,
    /// Received `[start, end)` ranges at or above `base`, sorted and merged.
    ranges: Ranges,
}

impl<const N: usize> Default for InboundCrypto<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> InboundCrypto<N> {
    pub fn new() -> Self {
        Self {
            data: Buf::new(),
            base: 0,
            cursor: 0,
            ranges: Ranges::new(),
        }
    }

    /// Most bytes this buffer holds at once.
    pub const fn capacity() -> usize {
        #[cfg(feature = "alloc")]
        {
            MAX_CRYPTO_BUFFER
        }
        #[cfg(not(feature = "alloc"))]
        {
            N
        }
    }

    /// Stream offset of the next byte to be delivered.
    pub fn delivered(&self) -> u64 {
        self.cursor
    }

    /// Store a received span.
    ///
    /// Bytes that overlap data already received must match it exactly;
    /// a mismatch is a `ProtocolViolation`. Data that cannot fit in the
    /// buffer is `CryptoBufferExceeded`. On error nothing is stored.
    pub fn insert(&mut self, offset: u64, bytes: &[u8]) -> Result<(), Error> {
        let end = offset
            .checked_add(bytes.len() as u64)
            .ok_or_else(exceeded)?;
        if bytes.is_empty() || end <= self.base {
            return Ok(());
        }

        if end - self.base > Self::capacity() as u64 {
            self.compact();
            if end <= self.base {
                return Ok(());
            }
            if end - self.base > Self::capacity() as u64 {
                log::warn!(
                    "CRYPTO data to offset {} exceeds {} byte buffer",
                    end,
                    Self::capacity()
                );
                return Err(exceeded());
            }
        }

        // anything below `base` was delivered and dropped already
        let (offset, bytes) = if offset < self.base {
            let skip = (self.base - offset) as usize;
            (self.base, &bytes[skip..])
        } else {
            (offset, bytes)
        };

        self.check_overlaps(offset, bytes)?;
        let ranges = merge(&self.ranges, offset, end)?;

        let start = (offset - self.base) as usize;
        let stop = (end - self.base) as usize;
        self.data.buf_grow_zeroed(stop).map_err(|_| exceeded())?;
        self.data.buf_as_mut_slice()[start..stop].copy_from_slice(bytes);
        self.ranges = ranges;
        log::trace!("CRYPTO span [{}, {}) buffered", offset, end);
        Ok(())
    }

    /// The contiguous bytes available at the delivery cursor.
    pub fn readable(&self) -> &[u8] {
        match self.ranges.first() {
            Some(&(start, end)) if start <= self.cursor && self.cursor < end => {
                let from = (self.cursor - self.base) as usize;
                let to = (end - self.base) as usize;
                &self.data.buf_as_slice()[from..to]
            }
            _ => &[],
        }
    }

    /// Hand the readable prefix to `consume`. The cursor moves past it
    /// only if `consume` succeeds. Returns the number of bytes delivered.
    pub fn deliver<F>(&mut self, consume: F) -> Result<usize, Error>
    where
        F: FnOnce(&[u8]) -> Result<(), Error>,
    {
        let ready = self.readable();
        if ready.is_empty() {
            return Ok(0);
        }
        let len = ready.len();
        consume(ready)?;
        self.cursor += len as u64;
        Ok(len)
    }

    fn check_overlaps(&self, offset: u64, bytes: &[u8]) -> Result<(), Error> {
        let end = offset + bytes.len() as u64;
        let have = self.data.buf_as_slice();
        for &(start, stop) in self.ranges.iter() {
            let lo = start.max(offset);
            let hi = stop.min(end);
            if lo >= hi {
                continue;
            }
            let old = &have[(lo - self.base) as usize..(hi - self.base) as usize];
            let new = &bytes[(lo - offset) as usize..(hi - offset) as usize];
            if old != new {
                log::warn!("conflicting CRYPTO data in [{}, {})", lo, hi);
                return Err(Error::Transport(TransportError::ProtocolViolation));
            }
        }
        Ok(())
    }

    /// Drop delivered bytes from the front of the buffer.
    fn compact(&mut self) {
        let n = (self.cursor - self.base) as usize;
        if n == 0 {
            return;
        }
        self.data.buf_drain_front(n);
        self.base = self.cursor;
        self.ranges.retain(|&(_, end)| end > self.cursor);
        if let Some(first) = self.ranges.first_mut() {
            first.0 = first.0.max(self.cursor);
        }
    }
}

/// `ranges` with `[start, end)` added, merging overlapping and adjacent
/// neighbours.
fn merge(ranges: &Ranges, start: u64, end: u64) -> Result<Ranges, Error> {
    let mut out = Ranges::new();
    let (mut lo, mut hi) = (start, end);
    let mut placed = false;
    for &(s, e) in ranges.iter() {
        if e < lo {
            out.push((s, e)).map_err(|_| exceeded())?;
        } else if s > hi {
            if !placed {
                out.push((lo, hi)).map_err(|_| exceeded())?;
                placed = true;
            }
            out.push((s, e)).map_err(|_| exceeded())?;
        } else {
            lo = lo.min(s);
            hi = hi.max(e);
        }
    }
    if !placed {
        out.push((lo, hi)).map_err(|_| exceeded())?;
    }
    Ok(out)
}

/// Handshake bytes produced by the TLS engine, waiting to be framed.
pub struct OutboundCrypto<const N: usize = DEFAULT_CRYPTO_BUF> {
    /// Unsent bytes; `data[0]` is stream offset `sent`.
    data: Buf<N>,
    sent: u64,
}

impl<const N: usize> Default for OutboundCrypto<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> OutboundCrypto<N> {
    pub fn new() -> Self {
        Self {
            data: Buf::new(),
            sent: 0,
        }
    }

    /// Append engine output to the end of the stream.
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.data.buf_extend_from_slice(bytes)
    }

    /// Stream offset and bytes not yet handed to the framer.
    pub fn pending(&self) -> (u64, &[u8]) {
        (self.sent, self.data.buf_as_slice())
    }

    pub fn has_pending(&self) -> bool {
        !self.data.buf_is_empty()
    }

    /// Record that the first `n` pending bytes were put into frames.
    pub fn mark_sent(&mut self, n: usize) {
        let n = n.min(self.data.buf_len());
        self.data.buf_drain_front(n);
        self.sent += n as u64;
    }

    /// Total bytes ever written to this stream.
    pub fn total_written(&self) -> u64 {
        self.sent + self.data.buf_len() as u64
    }
}

/// Both directions of one space's CRYPTO stream.
#[derive(Default)]
pub struct CryptoStream<const N: usize = DEFAULT_CRYPTO_BUF> {
    pub inbound: InboundCrypto<N>,
    pub outbound: OutboundCrypto<N>,
}

impl<const N: usize> CryptoStream<N> {
    pub fn new() -> Self {
        Self {
            inbound: InboundCrypto::new(),
            outbound: OutboundCrypto::new(),
        }
    }
}
