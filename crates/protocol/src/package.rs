//! The smOTA firmware package format.
//!
//! # Package Format
//!
//! A package is a fixed 256-byte header followed immediately by the raw
//! firmware payload, with no gap and no trailer. Header fields are
//! little-endian:
//!
//! - 4 bytes: magic `0xAA55AA55`
//! - 3 bytes: firmware version (major, minor, patch)
//! - 4 bytes: firmware payload length
//! - 4 bytes: CRC-32 over the firmware payload
//! - 32 bytes: SHA-256 digest of the firmware payload
//! - 32 + 32 bytes: ECDSA-P256 signature components r and s
//! - 2 bytes: flags (bit 0 = signed)
//! - 143 bytes: reserved, zero-filled, padding the header to exactly 256
//!
//! The signature covers the firmware digest only, never the header, so a
//! verifier recomputes SHA-256 from the payload and checks r ‖ s against
//! the public key without caring where the header lives.

use sha2::{Digest, Sha256};

use crate::error::{ProtocolError, Result};
use crate::keys::PUBLIC_POINT_LENGTH;
use crate::signer::{self, RawSignature, Signer, SIGNATURE_COMPONENT_LENGTH};

/// Package magic constant identifying the format.
pub const PACKAGE_MAGIC: u32 = 0xAA55_AA55;

/// Fixed header size in bytes.
pub const HEADER_SIZE: usize = 256;

/// Flag bit set when the header carries a signature.
pub const FLAG_SIGNED: u16 = 0x0001;

/// Length of the SHA-256 digest field.
const SHA256_LENGTH: usize = 32;

// Header field offsets. The layout is sequential, so each offset derives
// from the end of the previous field and serialize and parse cannot drift
// apart.
const MAGIC_OFFSET: usize = 0;
const VERSION_OFFSET: usize = MAGIC_OFFSET + 4;
const SIZE_OFFSET: usize = VERSION_OFFSET + 3;
const CRC_OFFSET: usize = SIZE_OFFSET + 4;
const SHA256_OFFSET: usize = CRC_OFFSET + 4;
const SIG_R_OFFSET: usize = SHA256_OFFSET + SHA256_LENGTH;
const SIG_S_OFFSET: usize = SIG_R_OFFSET + SIGNATURE_COMPONENT_LENGTH;
const FLAGS_OFFSET: usize = SIG_S_OFFSET + SIGNATURE_COMPONENT_LENGTH;
const RESERVED_OFFSET: usize = FLAGS_OFFSET + 2;

const _: () = assert!(RESERVED_OFFSET <= HEADER_SIZE);

fn read_u32(bytes: &[u8; HEADER_SIZE], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// A firmware semantic version, one byte per component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FirmwareVersion {
    /// Major version.
    pub major: u8,
    /// Minor version.
    pub minor: u8,
    /// Patch version.
    pub patch: u8,
}

impl FirmwareVersion {
    /// Create a version from its three components.
    pub fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parses a dotted version string permissively.
    ///
    /// Any missing or non-numeric component becomes 0: `"2.1"` is 2.1.0,
    /// `"abc"` is 0.0.0, `""` is 0.0.0. This mirrors packaging-tool
    /// behavior where a sloppy version string must not abort a build.
    pub fn parse_lossy(version: &str) -> Self {
        let mut parts = version.split('.');
        let mut component = || {
            parts
                .next()
                .and_then(|p| p.trim().parse::<u8>().ok())
                .unwrap_or(0)
        };
        Self {
            major: component(),
            minor: component(),
            patch: component(),
        }
    }
}

impl std::fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// The fixed 256-byte package header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageHeader {
    /// Firmware version embedded in the package.
    pub version: FirmwareVersion,
    /// Byte length of the firmware payload following the header.
    pub firmware_size: u32,
    /// CRC-32 over the firmware payload.
    pub firmware_crc: u32,
    /// SHA-256 digest of the firmware payload.
    pub sha256_hash: [u8; SHA256_LENGTH],
    /// ECDSA signature, all-zero when the package is unsigned.
    pub signature: RawSignature,
    /// Flag bit field; see [`FLAG_SIGNED`].
    pub flags: u16,
}

impl PackageHeader {
    /// Serializes the header to its fixed 256-byte layout.
    ///
    /// Unpopulated cryptographic fields and the reserved area are
    /// zero-filled; the output length is always exactly [`HEADER_SIZE`].
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[MAGIC_OFFSET..VERSION_OFFSET].copy_from_slice(&PACKAGE_MAGIC.to_le_bytes());
        out[VERSION_OFFSET] = self.version.major;
        out[VERSION_OFFSET + 1] = self.version.minor;
        out[VERSION_OFFSET + 2] = self.version.patch;
        out[SIZE_OFFSET..CRC_OFFSET].copy_from_slice(&self.firmware_size.to_le_bytes());
        out[CRC_OFFSET..SHA256_OFFSET].copy_from_slice(&self.firmware_crc.to_le_bytes());
        out[SHA256_OFFSET..SIG_R_OFFSET].copy_from_slice(&self.sha256_hash);
        out[SIG_R_OFFSET..SIG_S_OFFSET].copy_from_slice(&self.signature.r);
        out[SIG_S_OFFSET..FLAGS_OFFSET].copy_from_slice(&self.signature.s);
        out[FLAGS_OFFSET..RESERVED_OFFSET].copy_from_slice(&self.flags.to_le_bytes());
        // The reserved area is already zero.
        out
    }

    /// Deserializes a header, validating the magic.
    pub fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Result<Self> {
        let magic = read_u32(bytes, MAGIC_OFFSET);
        if magic != PACKAGE_MAGIC {
            return Err(ProtocolError::MalformedPackage(format!(
                "bad magic: expected {PACKAGE_MAGIC:#010x}, got {magic:#010x}"
            )));
        }

        let mut sha256_hash = [0u8; SHA256_LENGTH];
        sha256_hash.copy_from_slice(&bytes[SHA256_OFFSET..SIG_R_OFFSET]);
        let mut r = [0u8; SIGNATURE_COMPONENT_LENGTH];
        let mut s = [0u8; SIGNATURE_COMPONENT_LENGTH];
        r.copy_from_slice(&bytes[SIG_R_OFFSET..SIG_S_OFFSET]);
        s.copy_from_slice(&bytes[SIG_S_OFFSET..FLAGS_OFFSET]);

        Ok(Self {
            version: FirmwareVersion::new(
                bytes[VERSION_OFFSET],
                bytes[VERSION_OFFSET + 1],
                bytes[VERSION_OFFSET + 2],
            ),
            firmware_size: read_u32(bytes, SIZE_OFFSET),
            firmware_crc: read_u32(bytes, CRC_OFFSET),
            sha256_hash,
            signature: RawSignature { r, s },
            flags: u16::from_le_bytes([bytes[FLAGS_OFFSET], bytes[FLAGS_OFFSET + 1]]),
        })
    }

    /// True when the signed flag is set.
    pub fn is_signed(&self) -> bool {
        self.flags & FLAG_SIGNED != 0
    }

    /// Recomputes CRC-32 and SHA-256 over the firmware and checks them
    /// against the header.
    pub fn verify_integrity(&self, firmware: &[u8]) -> Result<()> {
        if firmware.len() as u64 != self.firmware_size as u64 {
            return Err(ProtocolError::MalformedPackage(format!(
                "firmware size field is {} but payload is {} bytes",
                self.firmware_size,
                firmware.len()
            )));
        }
        if crc32(firmware) != self.firmware_crc {
            return Err(ProtocolError::IntegrityMismatch { check: "CRC-32" });
        }
        if Sha256::digest(firmware).as_slice() != self.sha256_hash {
            return Err(ProtocolError::IntegrityMismatch { check: "SHA-256" });
        }
        Ok(())
    }

    /// Verifies the embedded signature against a device public key.
    ///
    /// Recomputes the firmware digest; the header's own digest field plays
    /// no part in the check.
    pub fn verify_signature(
        &self,
        public_point: &[u8; PUBLIC_POINT_LENGTH],
        firmware: &[u8],
    ) -> Result<()> {
        if self.signature.is_zero() {
            return Err(ProtocolError::InvalidSignature(
                "package carries no signature".to_string(),
            ));
        }
        signer::verify(public_point, firmware, &self.signature)
    }
}

/// CRC-32 (IEEE polynomial) over a byte slice.
pub fn crc32(data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Assembles OTA packages, optionally signing them.
#[derive(Debug, Default)]
pub struct PackageBuilder {
    signer: Option<Signer>,
}

impl PackageBuilder {
    /// Creates a builder without signing capability.
    pub fn new() -> Self {
        Self { signer: None }
    }

    /// Creates a builder that signs with the given signer.
    pub fn with_signer(signer: Signer) -> Self {
        Self {
            signer: Some(signer),
        }
    }

    /// Builds a package: 256-byte header followed by the firmware bytes.
    ///
    /// The firmware payload passes through byte-for-byte. When `sign` is
    /// requested the configured signer populates the signature fields and
    /// sets [`FLAG_SIGNED`]; requesting a signature without a configured
    /// signer fails with [`ProtocolError::SigningKeyRequired`] rather than
    /// producing a silently unsigned package.
    pub fn build(&self, firmware: &[u8], version: FirmwareVersion, sign: bool) -> Result<Vec<u8>> {
        let firmware_size = u32::try_from(firmware.len()).map_err(|_| {
            ProtocolError::MalformedPackage(format!(
                "firmware of {} bytes exceeds the 32-bit size field",
                firmware.len()
            ))
        })?;

        let (signature, flags) = if sign {
            let signer = self.signer.as_ref().ok_or(ProtocolError::SigningKeyRequired)?;
            (signer.sign(firmware)?, FLAG_SIGNED)
        } else {
            (RawSignature::from_bytes(&[0u8; 64]), 0)
        };

        let header = PackageHeader {
            version,
            firmware_size,
            firmware_crc: crc32(firmware),
            sha256_hash: Sha256::digest(firmware).into(),
            signature,
            flags,
        };

        let mut package = Vec::with_capacity(HEADER_SIZE + firmware.len());
        package.extend_from_slice(&header.to_bytes());
        package.extend_from_slice(firmware);
        Ok(package)
    }
}

/// A parsed package: header plus a view of the firmware payload.
#[derive(Debug)]
pub struct Package<'a> {
    /// The decoded header.
    pub header: PackageHeader,
    /// The firmware payload following the header.
    pub firmware: &'a [u8],
}

impl<'a> Package<'a> {
    /// Splits a package byte string into header and firmware payload.
    ///
    /// Validates the magic and that the payload length matches the
    /// header's size field. Integrity and signature checks are separate
    /// calls on the header.
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(ProtocolError::MalformedPackage(format!(
                "package of {} bytes is shorter than the {HEADER_SIZE}-byte header",
                bytes.len()
            )));
        }

        let mut header_bytes = [0u8; HEADER_SIZE];
        header_bytes.copy_from_slice(&bytes[..HEADER_SIZE]);
        let header = PackageHeader::from_bytes(&header_bytes)?;

        let firmware = &bytes[HEADER_SIZE..];
        if firmware.len() as u64 != header.firmware_size as u64 {
            return Err(ProtocolError::MalformedPackage(format!(
                "header declares {} firmware bytes but {} follow",
                header.firmware_size,
                firmware.len()
            )));
        }

        Ok(Self { header, firmware })
    }
}
