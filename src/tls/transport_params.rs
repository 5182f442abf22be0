//! QUIC transport parameters (RFC 9000 section 18).
//!
//! Encoded as a sequence of (id: varint, length: varint, value: bytes)
//! where integer values are varint-encoded. Only the wire format is
//! checked here; whether the values make sense is the connection's call.

use crate::error::{Error, TransportError};
use crate::varint::{decode_varint, encode_varint, varint_len};

/// A connection ID as carried in transport parameters (at most 20 bytes).
pub type ConnectionIdBytes = heapless::Vec<u8, 20>;

/// QUIC transport parameters exchanged during the TLS handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportParams {
    /// Server only: DCID of the client's first Initial.
    pub original_destination_connection_id: Option<ConnectionIdBytes>,
    /// Maximum idle timeout in milliseconds (0 = disabled).
    pub max_idle_timeout: u64,
    /// Server only: token for stateless reset.
    pub stateless_reset_token: Option<[u8; 16]>,
    /// Maximum UDP payload size (default 65527).
    pub max_udp_payload_size: u64,
    /// Maximum total data the peer may send (flow control).
    pub initial_max_data: u64,
    /// Initial max data on locally-initiated bidi streams.
    pub initial_max_stream_data_bidi_local: u64,
    /// Initial max data on remotely-initiated bidi streams.
    pub initial_max_stream_data_bidi_remote: u64,
    /// Initial max data on unidirectional streams.
    pub initial_max_stream_data_uni: u64,
    /// Maximum number of bidi streams the peer may open.
    pub initial_max_streams_bidi: u64,
    /// Maximum number of uni streams the peer may open.
    pub initial_max_streams_uni: u64,
    /// ACK delay exponent (default 3).
    pub ack_delay_exponent: u64,
    /// Maximum ACK delay in milliseconds (default 25).
    pub max_ack_delay: u64,
    pub disable_active_migration: bool,
    /// Active connection ID limit (default 2).
    pub active_connection_id_limit: u64,
    /// SCID of the first Initial the endpoint sent.
    pub initial_source_connection_id: Option<ConnectionIdBytes>,
    /// Server only: SCID of the Retry packet, if one was sent.
    pub retry_source_connection_id: Option<ConnectionIdBytes>,
}

// Parameter IDs
const PARAM_ORIGINAL_DCID: u64 = 0x00;
const PARAM_MAX_IDLE_TIMEOUT: u64 = 0x01;
const PARAM_STATELESS_RESET_TOKEN: u64 = 0x02;
const PARAM_MAX_UDP_PAYLOAD_SIZE: u64 = 0x03;
const PARAM_INITIAL_MAX_DATA: u64 = 0x04;
const PARAM_INITIAL_MAX_STREAM_DATA_BIDI_LOCAL: u64 = 0x05;
const PARAM_INITIAL_MAX_STREAM_DATA_BIDI_REMOTE: u64 = 0x06;
const PARAM_INITIAL_MAX_STREAM_DATA_UNI: u64 = 0x07;
const PARAM_INITIAL_MAX_STREAMS_BIDI: u64 = 0x08;
const PARAM_INITIAL_MAX_STREAMS_UNI: u64 = 0x09;
const PARAM_ACK_DELAY_EXPONENT: u64 = 0x0a;
const PARAM_MAX_ACK_DELAY: u64 = 0x0b;
const PARAM_DISABLE_ACTIVE_MIGRATION: u64 = 0x0c;
const PARAM_ACTIVE_CONNECTION_ID_LIMIT: u64 = 0x0e;
const PARAM_INITIAL_SCID: u64 = 0x0f;
const PARAM_RETRY_SCID: u64 = 0x10;

impl Default for TransportParams {
    /// The values RFC 9000 assumes for parameters that are absent.
    fn default() -> Self {
        Self {
            original_destination_connection_id: None,
            max_idle_timeout: 0,
            stateless_reset_token: None,
            max_udp_payload_size: 65527,
            initial_max_data: 0,
            initial_max_stream_data_bidi_local: 0,
            initial_max_stream_data_bidi_remote: 0,
            initial_max_stream_data_uni: 0,
            initial_max_streams_bidi: 0,
            initial_max_streams_uni: 0,
            ack_delay_exponent: 3,
            max_ack_delay: 25,
            disable_active_migration: false,
            active_connection_id_limit: 2,
            initial_source_connection_id: None,
            retry_source_connection_id: None,
        }
    }
}

fn malformed() -> Error {
    Error::Transport(TransportError::TransportParameterError)
}

/// Appends (id, length, value) triples to an output buffer.
struct Writer<'a> {
    buf: &'a mut [u8],
    off: usize,
}

impl Writer<'_> {
    fn bytes(&mut self, id: u64, value: &[u8]) -> Result<(), Error> {
        let needed = self.off + varint_len(id) + varint_len(value.len() as u64) + value.len();
        if self.buf.len() < needed {
            return Err(Error::BufferTooSmall { needed });
        }
        self.off += encode_varint(id, &mut self.buf[self.off..])?;
        self.off += encode_varint(value.len() as u64, &mut self.buf[self.off..])?;
        self.buf[self.off..needed].copy_from_slice(value);
        self.off = needed;
        Ok(())
    }

    fn int(&mut self, id: u64, value: u64) -> Result<(), Error> {
        let mut tmp = [0u8; 8];
        let len = encode_varint(value, &mut tmp)?;
        self.bytes(id, &tmp[..len])
    }
}

impl TransportParams {
    /// Create transport parameters with sensible defaults.
    pub fn default_params() -> Self {
        Self {
            max_idle_timeout: 30_000,
            initial_max_data: 1_048_576,
            initial_max_stream_data_bidi_local: 262_144,
            initial_max_stream_data_bidi_remote: 262_144,
            initial_max_stream_data_uni: 262_144,
            initial_max_streams_bidi: 100,
            initial_max_streams_uni: 100,
            ..Self::default()
        }
    }

    /// Encode transport parameters into `buf`.
    /// Returns the number of bytes written.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, Error> {
        let mut w = Writer { buf, off: 0 };

        if let Some(cid) = &self.original_destination_connection_id {
            w.bytes(PARAM_ORIGINAL_DCID, cid)?;
        }
        w.int(PARAM_MAX_IDLE_TIMEOUT, self.max_idle_timeout)?;
        if let Some(token) = &self.stateless_reset_token {
            w.bytes(PARAM_STATELESS_RESET_TOKEN, token)?;
        }
        w.int(PARAM_MAX_UDP_PAYLOAD_SIZE, self.max_udp_payload_size)?;
        w.int(PARAM_INITIAL_MAX_DATA, self.initial_max_data)?;
        w.int(
            PARAM_INITIAL_MAX_STREAM_DATA_BIDI_LOCAL,
            self.initial_max_stream_data_bidi_local,
        )?;
        w.int(
            PARAM_INITIAL_MAX_STREAM_DATA_BIDI_REMOTE,
            self.initial_max_stream_data_bidi_remote,
        )?;
        w.int(PARAM_INITIAL_MAX_STREAM_DATA_UNI, self.initial_max_stream_data_uni)?;
        w.int(PARAM_INITIAL_MAX_STREAMS_BIDI, self.initial_max_streams_bidi)?;
        w.int(PARAM_INITIAL_MAX_STREAMS_UNI, self.initial_max_streams_uni)?;
        w.int(PARAM_ACK_DELAY_EXPONENT, self.ack_delay_exponent)?;
        w.int(PARAM_MAX_ACK_DELAY, self.max_ack_delay)?;
        if self.disable_active_migration {
            w.bytes(PARAM_DISABLE_ACTIVE_MIGRATION, &[])?;
        }
        w.int(PARAM_ACTIVE_CONNECTION_ID_LIMIT, self.active_connection_id_limit)?;
        if let Some(cid) = &self.initial_source_connection_id {
            w.bytes(PARAM_INITIAL_SCID, cid)?;
        }
        if let Some(cid) = &self.retry_source_connection_id {
            w.bytes(PARAM_RETRY_SCID, cid)?;
        }

        Ok(w.off)
    }

    /// Decode transport parameters from `buf`.
    ///
    /// Truncated input, a repeated parameter, or a value that does not
    /// exactly fill its declared length is a `TransportParameterError`.
    /// Unknown parameters are skipped.
    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        let mut params = Self::default();
        let mut seen: u32 = 0;

        let mut off = 0;
        while off < buf.len() {
            let (id, id_len) = decode_varint(&buf[off..]).map_err(|_| malformed())?;
            off += id_len;
            let (param_len, len_len) = decode_varint(&buf[off..]).map_err(|_| malformed())?;
            off += len_len;

            let end = usize::try_from(param_len)
                .ok()
                .and_then(|len| off.checked_add(len))
                .filter(|&end| end <= buf.len())
                .ok_or_else(malformed)?;
            let value = &buf[off..end];
            off = end;

            if id <= PARAM_RETRY_SCID {
                let bit = 1u32 << id;
                if seen & bit != 0 {
                    return Err(malformed());
                }
                seen |= bit;
            }

            match id {
                PARAM_ORIGINAL_DCID => params.original_destination_connection_id = Some(cid(value)?),
                PARAM_STATELESS_RESET_TOKEN => {
                    params.stateless_reset_token =
                        Some(value.try_into().map_err(|_| malformed())?);
                }
                PARAM_DISABLE_ACTIVE_MIGRATION => {
                    if !value.is_empty() {
                        return Err(malformed());
                    }
                    params.disable_active_migration = true;
                }
                PARAM_INITIAL_SCID => params.initial_source_connection_id = Some(cid(value)?),
                PARAM_RETRY_SCID => params.retry_source_connection_id = Some(cid(value)?),
                PARAM_MAX_IDLE_TIMEOUT => params.max_idle_timeout = int(value)?,
                PARAM_MAX_UDP_PAYLOAD_SIZE => params.max_udp_payload_size = int(value)?,
                PARAM_INITIAL_MAX_DATA => params.initial_max_data = int(value)?,
                PARAM_INITIAL_MAX_STREAM_DATA_BIDI_LOCAL => {
                    params.initial_max_stream_data_bidi_local = int(value)?
                }
                PARAM_INITIAL_MAX_STREAM_DATA_BIDI_REMOTE => {
                    params.initial_max_stream_data_bidi_remote = int(value)?
                }
                PARAM_INITIAL_MAX_STREAM_DATA_UNI => {
                    params.initial_max_stream_data_uni = int(value)?
                }
                PARAM_INITIAL_MAX_STREAMS_BIDI => params.initial_max_streams_bidi = int(value)?,
                PARAM_INITIAL_MAX_STREAMS_UNI => params.initial_max_streams_uni = int(value)?,
                PARAM_ACK_DELAY_EXPONENT => params.ack_delay_exponent = int(value)?,
                PARAM_MAX_ACK_DELAY => params.max_ack_delay = int(value)?,
                PARAM_ACTIVE_CONNECTION_ID_LIMIT => {
                    params.active_connection_id_limit = int(value)?
                }
                // Unknown parameters (and preferred_address) are ignored.
                _ => {}
            }
        }

        Ok(params)
    }
}

/// An integer parameter: one varint that fills the whole value.
fn int(value: &[u8]) -> Result<u64, Error> {
    match decode_varint(value) {
        Ok((v, len)) if len == value.len() => Ok(v),
        _ => Err(malformed()),
    }
}

fn cid(value: &[u8]) -> Result<ConnectionIdBytes, Error> {
    ConnectionIdBytes::from_slice(value).map_err(|_| malformed())
}
