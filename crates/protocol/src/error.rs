//! Error types for the protocol crate.

use thiserror::Error;

/// Protocol error type covering all possible failure modes.
#[derive(Debug, Error)]
pub enum ProtocolError {
    // File and stream errors
    /// Underlying I/O failure while reading or writing.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    // Key material errors
    /// Key material is missing or could not be decoded.
    #[error("failed to load key material: {0}")]
    KeyLoad(String),

    /// A fixed-size cryptographic value had an unexpected length.
    #[error("{what}: expected {expected} bytes, got {got}")]
    LengthMismatch {
        /// What was being decoded.
        what: &'static str,
        /// Expected byte count.
        expected: usize,
        /// Actual byte count.
        got: usize,
    },

    /// Signing was requested but no signing key is configured.
    #[error("signing requested but no signing key is configured")]
    SigningKeyRequired,

    /// Signature creation or verification failed.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    // Frame errors
    /// Frame payload exceeds the 16-bit length field.
    #[error("frame payload too large: {size} bytes exceeds maximum of {max} bytes")]
    PayloadTooLarge {
        /// Actual payload size.
        size: usize,
        /// Maximum encodable size.
        max: usize,
    },

    /// The byte source ended before a full frame header was read.
    #[error("truncated frame header: needed {needed} bytes, got {got}")]
    TruncatedFrame {
        /// Header bytes required.
        needed: usize,
        /// Header bytes available.
        got: usize,
    },

    /// The frame does not start with the smOTA SOF literal.
    #[error("invalid SOF: {got:02x?}")]
    InvalidSof {
        /// The five bytes read in place of the SOF.
        got: [u8; 5],
    },

    /// The frame carries a protocol version this codec does not speak.
    #[error("unsupported protocol version: {got:#04x}")]
    UnsupportedVersion {
        /// The version byte received.
        got: u8,
    },

    /// The byte source ended before the declared payload was read.
    #[error("truncated frame payload: needed {needed} bytes, got {got}")]
    TruncatedPayload {
        /// Payload and trailer bytes declared in the header.
        needed: usize,
        /// Bytes available.
        got: usize,
    },

    /// The frame CRC-16 trailer does not match the received bytes.
    #[error("frame checksum mismatch: computed {expected:#06x}, frame carries {got:#06x}")]
    ChecksumMismatch {
        /// CRC computed over the received header and payload.
        expected: u16,
        /// CRC carried in the frame trailer.
        got: u16,
    },

    // Package errors
    /// The package header is missing, short, or carries a bad magic.
    #[error("malformed package: {0}")]
    MalformedPackage(String),

    /// A recomputed digest or checksum does not match the header.
    #[error("{check} mismatch between header and firmware payload")]
    IntegrityMismatch {
        /// Which check failed ("CRC-32" or "SHA-256").
        check: &'static str,
    },
}

/// Result type alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

impl From<p256::ecdsa::Error> for ProtocolError {
    fn from(err: p256::ecdsa::Error) -> Self {
        ProtocolError::InvalidSignature(err.to_string())
    }
}

impl From<p256::pkcs8::Error> for ProtocolError {
    fn from(err: p256::pkcs8::Error) -> Self {
        ProtocolError::KeyLoad(err.to_string())
    }
}
