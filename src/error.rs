/// QUIC transport error codes (RFC 9000 §20).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum TransportError {
    NoError = 0x00,
    InternalError = 0x01,
    ConnectionRefused = 0x02,
    FlowControlError = 0x03,
    StreamLimitError = 0x04,
    StreamStateError = 0x05,
    FinalSizeError = 0x06,
    FrameEncodingError = 0x07,
    TransportParameterError = 0x08,
    ConnectionIdLimitError = 0x09,
    ProtocolViolation = 0x0a,
    InvalidToken = 0x0b,
    ApplicationError = 0x0c,
    CryptoBufferExceeded = 0x0d,
    KeyUpdateError = 0x0e,
    AeadLimitReached = 0x0f,
    NoViablePath = 0x10,
    VersionNegotiationError = 0x11,
}

impl TransportError {
    /// Convert a transport error to its RFC 9000 wire code.
    pub const fn to_code(self) -> u64 {
        self as u64
    }
}

/// Top-level crate error.
///
/// Every error is fatal to the handshake attempt that produced it: the
/// caller tears the connection down rather than retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// QUIC transport error; the connection must close.
    Transport(TransportError),
    /// The TLS engine could not be started with the given configuration.
    Config,
    /// Cryptographic operation failed.
    Crypto,
    /// The TLS engine rejected handshake data or a ticket request.
    Tls,
    /// Caller-provided buffer too small.
    BufferTooSmall { needed: usize },
    /// Invalid state for the requested operation.
    InvalidState,
}

impl Error {
    /// True for errors that reflect a protocol or internal invariant
    /// violation (bad encryption level, conflicting CRYPTO bytes,
    /// duplicate key installation, CRYPTO buffer overflow).
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            Error::Transport(
                TransportError::ProtocolViolation
                    | TransportError::InternalError
                    | TransportError::CryptoBufferExceeded
            )
        )
    }

    /// True for malformed transport parameters.
    pub fn is_parameter(&self) -> bool {
        matches!(self, Error::Transport(TransportError::TransportParameterError))
    }

    /// The RFC 9000 error code to put in CONNECTION_CLOSE for this error.
    pub fn wire_code(&self) -> u64 {
        match self {
            Error::Transport(e) => e.to_code(),
            _ => TransportError::InternalError.to_code(),
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Error::Transport(e)
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Transport(e) => write!(f, "transport error: {e:?}"),
            Error::Config => write!(f, "TLS configuration error"),
            Error::Crypto => write!(f, "cryptographic error"),
            Error::Tls => write!(f, "TLS error"),
            Error::BufferTooSmall { needed } => {
                write!(f, "buffer too small, need {needed} bytes")
            }
            Error::InvalidState => write!(f, "invalid state"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
