//! Handshake request and response payloads.
//!
//! The handshake opens an OTA session: the host announces the firmware
//! version it intends to transfer, the project it belongs to, and the
//! timeout budget the device should apply. The device answers with an
//! error bit field, optionally followed by its transfer parameters.
//!
//! All multi-byte fields are little-endian.

use crate::error::{ProtocolError, Result};
use crate::package::FirmwareVersion;

/// Fixed length of the project identifier field.
pub const PROJECT_ID_LENGTH: usize = 16;

/// Encoded size of a handshake request payload.
pub const REQUEST_SIZE: usize = 29;

/// Minimum size of a handshake response payload.
pub const RESPONSE_MIN_SIZE: usize = 4;

/// Size of the optional device-details block following the error code.
pub const DETAILS_SIZE: usize = 17;

/// Response codes reported by the device, one bit per condition.
///
/// The same bit field is carried by every response in the protocol, so
/// bits past the handshake range (decryption, flash and install failures)
/// are defined here too.
pub mod error_bits {
    /// Protocol version mismatch.
    pub const PROTOCOL_MISMATCH: u32 = 1 << 0;
    /// The offered project identifier does not match the device.
    pub const PROJECT_MISMATCH: u32 = 1 << 1;
    /// The offered firmware version fails the anti-rollback check.
    pub const VERSION_MISMATCH: u32 = 1 << 2;
    /// Not enough flash space for the announced image.
    pub const FLASH_INSUFFICIENT: u32 = 1 << 3;
    /// AES decryption of a data block failed.
    pub const DATA_AES: u32 = 1 << 8;
    /// Writing a block to flash failed.
    pub const FLASH_WRITE: u32 = 1 << 9;
    /// SHA-256 digest of the received image does not match the header.
    pub const VERIFY_SHA256_FAILED: u32 = 1 << 17;
    /// ECDSA signature verification failed.
    pub const VERIFY_SIGN_FAILED: u32 = 1 << 18;
    /// Reading the staged image back from flash failed.
    pub const INSTALL_FLASH_READ: u32 = 1 << 19;
    /// Battery level too low to install safely.
    pub const INSTALL_LOW_BATTERY: u32 = 1 << 20;
    /// The device is in critical work and refuses to install.
    pub const INSTALL_BUSY: u32 = 1 << 21;
    /// The running version did not change after install.
    pub const INSTALL_VERSION_OLD: u32 = 1 << 22;
}

/// Device capability bits advertised in the handshake details.
pub mod capability_bits {
    /// The device verifies ECDSA package signatures.
    pub const SIGNATURE_CHECK: u8 = 1 << 0;
    /// The device decrypts AES-protected payloads.
    pub const ENCRYPTION: u8 = 1 << 1;
    /// The device rejects downgrades to older firmware.
    pub const ANTI_ROLLBACK: u8 = 1 << 2;
}

/// Names the set conditions in a handshake error code, for log output.
pub fn describe_error(code: u32) -> String {
    if code == 0 {
        return "ok".to_string();
    }
    let known: [(u32, &str); 12] = [
        (error_bits::PROTOCOL_MISMATCH, "protocol mismatch"),
        (error_bits::PROJECT_MISMATCH, "project mismatch"),
        (error_bits::VERSION_MISMATCH, "version rollback rejected"),
        (error_bits::FLASH_INSUFFICIENT, "insufficient flash space"),
        (error_bits::DATA_AES, "decryption failed"),
        (error_bits::FLASH_WRITE, "flash write failed"),
        (error_bits::VERIFY_SHA256_FAILED, "SHA-256 mismatch"),
        (error_bits::VERIFY_SIGN_FAILED, "signature verification failed"),
        (error_bits::INSTALL_FLASH_READ, "flash read failed"),
        (error_bits::INSTALL_LOW_BATTERY, "low battery"),
        (error_bits::INSTALL_BUSY, "device busy"),
        (error_bits::INSTALL_VERSION_OLD, "version unchanged after install"),
    ];
    let mut names: Vec<&str> = known
        .iter()
        .filter(|(bit, _)| code & bit != 0)
        .map(|(_, name)| *name)
        .collect();
    let unknown = code & !known.iter().fold(0, |acc, (bit, _)| acc | bit);
    if unknown != 0 || names.is_empty() {
        names.push("unknown condition");
    }
    names.join(", ")
}

/// A handshake request, command 0x01.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    /// Version of the firmware the host intends to transfer.
    pub version: FirmwareVersion,
    /// Project identifier, at most [`PROJECT_ID_LENGTH`] ASCII bytes.
    pub project_id: [u8; PROJECT_ID_LENGTH],
    /// Per-block transfer timeout in milliseconds.
    pub block_timeout_ms: u16,
    /// Post-transfer integrity check timeout in milliseconds.
    pub check_timeout_ms: u16,
    /// Install phase timeout in milliseconds.
    pub install_timeout_ms: u16,
    /// Whole-session timeout in milliseconds.
    pub total_timeout_ms: u32,
}

impl HandshakeRequest {
    /// Builds a request from a string project identifier.
    ///
    /// The identifier is null-padded to [`PROJECT_ID_LENGTH`] bytes and
    /// must not exceed it.
    pub fn new(
        version: FirmwareVersion,
        project_id: &str,
        block_timeout_ms: u16,
        check_timeout_ms: u16,
        install_timeout_ms: u16,
        total_timeout_ms: u32,
    ) -> Result<Self> {
        let raw = project_id.as_bytes();
        if raw.len() > PROJECT_ID_LENGTH {
            return Err(ProtocolError::LengthMismatch {
                what: "project identifier",
                expected: PROJECT_ID_LENGTH,
                got: raw.len(),
            });
        }
        let mut id = [0u8; PROJECT_ID_LENGTH];
        id[..raw.len()].copy_from_slice(raw);
        Ok(Self {
            version,
            project_id: id,
            block_timeout_ms,
            check_timeout_ms,
            install_timeout_ms,
            total_timeout_ms,
        })
    }

    /// The project identifier with trailing null padding removed.
    pub fn project_id_str(&self) -> &str {
        let end = self
            .project_id
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(PROJECT_ID_LENGTH);
        std::str::from_utf8(&self.project_id[..end]).unwrap_or("")
    }

    /// Serializes the request to its 29-byte wire form.
    pub fn encode(&self) -> [u8; REQUEST_SIZE] {
        let mut out = [0u8; REQUEST_SIZE];
        out[0] = self.version.major;
        out[1] = self.version.minor;
        out[2] = self.version.patch;
        out[3..19].copy_from_slice(&self.project_id);
        out[19..21].copy_from_slice(&self.block_timeout_ms.to_le_bytes());
        out[21..23].copy_from_slice(&self.check_timeout_ms.to_le_bytes());
        out[23..25].copy_from_slice(&self.install_timeout_ms.to_le_bytes());
        out[25..29].copy_from_slice(&self.total_timeout_ms.to_le_bytes());
        out
    }

    /// Deserializes a request payload.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        if payload.len() != REQUEST_SIZE {
            return Err(ProtocolError::TruncatedPayload {
                needed: REQUEST_SIZE,
                got: payload.len(),
            });
        }
        let mut project_id = [0u8; PROJECT_ID_LENGTH];
        project_id.copy_from_slice(&payload[3..19]);
        Ok(Self {
            version: FirmwareVersion::new(payload[0], payload[1], payload[2]),
            project_id,
            block_timeout_ms: u16::from_le_bytes([payload[19], payload[20]]),
            check_timeout_ms: u16::from_le_bytes([payload[21], payload[22]]),
            install_timeout_ms: u16::from_le_bytes([payload[23], payload[24]]),
            total_timeout_ms: u32::from_le_bytes([
                payload[25],
                payload[26],
                payload[27],
                payload[28],
            ]),
        })
    }
}

/// Transfer parameters a device may append to a successful handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeDetails {
    /// Byte offset to resume an interrupted transfer from.
    pub next_offset: u32,
    /// Largest data packet the device accepts.
    pub max_packet_size: u16,
    /// Link MTU reported by the device.
    pub mtu_size: u16,
    /// Free flash space in bytes.
    pub flash_free_size: u32,
    /// Per-block timeout the device will enforce.
    pub block_timeout_ms: u16,
    /// Install timeout the device will enforce.
    pub install_timeout_ms: u16,
    /// Capability bit field, see [`capability_bits`].
    pub capabilities: u8,
}

impl HandshakeDetails {
    /// Serializes the details block to its 17-byte wire form.
    pub fn encode(&self) -> [u8; DETAILS_SIZE] {
        let mut out = [0u8; DETAILS_SIZE];
        out[0..4].copy_from_slice(&self.next_offset.to_le_bytes());
        out[4..6].copy_from_slice(&self.max_packet_size.to_le_bytes());
        out[6..8].copy_from_slice(&self.mtu_size.to_le_bytes());
        out[8..12].copy_from_slice(&self.flash_free_size.to_le_bytes());
        out[12..14].copy_from_slice(&self.block_timeout_ms.to_le_bytes());
        out[14..16].copy_from_slice(&self.install_timeout_ms.to_le_bytes());
        out[16] = self.capabilities;
        out
    }

    fn decode(bytes: &[u8; DETAILS_SIZE]) -> Self {
        Self {
            next_offset: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            max_packet_size: u16::from_le_bytes([bytes[4], bytes[5]]),
            mtu_size: u16::from_le_bytes([bytes[6], bytes[7]]),
            flash_free_size: u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            block_timeout_ms: u16::from_le_bytes([bytes[12], bytes[13]]),
            install_timeout_ms: u16::from_le_bytes([bytes[14], bytes[15]]),
            capabilities: bytes[16],
        }
    }
}

/// A handshake response, command 0x81.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeResponse {
    /// Error bit field, 0 on acceptance.
    pub error_code: u32,
    /// Device transfer parameters, when the device sent them.
    pub details: Option<HandshakeDetails>,
}

impl HandshakeResponse {
    /// True when the device accepted the session.
    pub fn is_success(&self) -> bool {
        self.error_code == 0
    }

    /// Serializes the response payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(RESPONSE_MIN_SIZE + DETAILS_SIZE);
        out.extend_from_slice(&self.error_code.to_le_bytes());
        if let Some(details) = &self.details {
            out.extend_from_slice(&details.encode());
        }
        out
    }

    /// Deserializes a response payload.
    ///
    /// The error code alone is a valid response; the details block is
    /// parsed only when enough bytes follow it. Trailing bytes beyond the
    /// known layout are ignored for forward compatibility.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        if payload.len() < RESPONSE_MIN_SIZE {
            return Err(ProtocolError::TruncatedPayload {
                needed: RESPONSE_MIN_SIZE,
                got: payload.len(),
            });
        }
        let error_code = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);

        let details = if payload.len() >= RESPONSE_MIN_SIZE + DETAILS_SIZE {
            let mut block = [0u8; DETAILS_SIZE];
            block.copy_from_slice(&payload[RESPONSE_MIN_SIZE..RESPONSE_MIN_SIZE + DETAILS_SIZE]);
            Some(HandshakeDetails::decode(&block))
        } else {
            None
        };

        Ok(Self {
            error_code,
            details,
        })
    }
}
