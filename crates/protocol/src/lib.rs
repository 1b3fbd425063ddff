//! # smOTA Protocol Library
//!
//! This crate provides the package format and wire protocol for the smOTA
//! embedded firmware update system.
//!
//! ## Overview
//!
//! The protocol crate is the foundation of the smOTA host tooling,
//! providing:
//!
//! - **Package Format**: A fixed 256-byte firmware header carrying CRC-32,
//!   SHA-256, and an ECDSA-P256 signature
//! - **Key Management**: P-256 keypair generation with PKCS#8 PEM encoding
//! - **Signing**: Randomized ECDSA over the raw firmware image
//! - **Frame Codec**: `smOTA`-prefixed transport frames with a CRC-16 trailer
//! - **Handshake**: Session negotiation payloads and device error codes
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │       Handshake / Command Payloads      │  Little-endian structs
//! ├─────────────────────────────────────────┤
//! │              Framing                    │  SOF + header + CRC-16
//! ├─────────────────────────────────────────┤
//! │       Transport (TCP / serial)          │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```rust
//! use smota_protocol::{
//!     EcdsaKeypair, FirmwareVersion, FrameCodec, Package, PackageBuilder, Signer,
//! };
//!
//! // Generate a signing keypair and build a signed package
//! let keypair = EcdsaKeypair::generate();
//! let builder = PackageBuilder::with_signer(Signer::from_keypair(&keypair));
//! let firmware = vec![0x42u8; 1024];
//! let package = builder
//!     .build(&firmware, FirmwareVersion::new(1, 0, 0), true)
//!     .unwrap();
//!
//! // Parse it back and verify
//! let parsed = Package::parse(&package).unwrap();
//! parsed.header.verify_integrity(parsed.firmware).unwrap();
//!
//! // Frame a handshake command for the wire
//! let codec = FrameCodec::new();
//! let bytes = codec
//!     .encode(smota_protocol::cmd::HANDSHAKE, &[], 0)
//!     .unwrap();
//! assert!(bytes.starts_with(b"smOTA"));
//! ```
//!
//! ## Modules
//!
//! - [`package`]: Firmware package header, builder, and verification
//! - [`keys`]: P-256 keypair generation and encoding
//! - [`signer`]: ECDSA signing and verification
//! - [`framing`]: Transport frame codec
//! - [`handshake`]: Handshake payloads and device error codes
//! - [`error`]: Error types

pub mod error;
pub mod framing;
pub mod handshake;
pub mod keys;
pub mod package;
pub mod signer;

pub use error::{ProtocolError, Result};
pub use framing::{
    cmd, crc16, frag, Frame, FrameCodec, FrameHeader, FRAME_CRC_SIZE, FRAME_HEADER_SIZE,
    MAX_PAYLOAD_SIZE, PROTOCOL_VERSION, SOF,
};
pub use handshake::{
    capability_bits, describe_error, error_bits, HandshakeDetails, HandshakeRequest,
    HandshakeResponse, PROJECT_ID_LENGTH,
};
pub use keys::{
    generate_master_key, verifying_key_from_point, EcdsaKeypair, MASTER_KEY_LENGTH,
    PUBLIC_POINT_LENGTH,
};
pub use package::{
    FirmwareVersion, Package, PackageBuilder, PackageHeader, FLAG_SIGNED, HEADER_SIZE,
    PACKAGE_MAGIC,
};
pub use signer::{verify, RawSignature, Signer, SIGNATURE_LENGTH};
