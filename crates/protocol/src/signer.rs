//! Firmware signing with ECDSA-P256.
//!
//! A signature covers SHA-256 of the firmware payload only, never the
//! package header, so verification recomputes the digest from the payload
//! regardless of where the header ends up. Signing is randomized: two calls
//! over the same input produce different but equally valid signatures, so
//! consumers must verify rather than byte-compare.

use std::path::Path;

use p256::ecdsa::signature::{RandomizedSigner, Verifier};
use p256::ecdsa::{Signature, SigningKey};
use rand::rngs::OsRng;

use crate::error::{ProtocolError, Result};
use crate::keys::{self, EcdsaKeypair, PUBLIC_POINT_LENGTH};

/// Length of one signature component (r or s) in bytes.
pub const SIGNATURE_COMPONENT_LENGTH: usize = 32;

/// Length of the raw signature, r ‖ s.
pub const SIGNATURE_LENGTH: usize = 2 * SIGNATURE_COMPONENT_LENGTH;

/// A fixed-width ECDSA-P256 signature.
///
/// Both components are big-endian unsigned integers, left-padded with
/// zeroes to exactly 32 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSignature {
    /// The r component.
    pub r: [u8; SIGNATURE_COMPONENT_LENGTH],
    /// The s component.
    pub s: [u8; SIGNATURE_COMPONENT_LENGTH],
}

impl RawSignature {
    /// Returns the 64-byte concatenation r ‖ s.
    pub fn to_bytes(self) -> [u8; SIGNATURE_LENGTH] {
        let mut out = [0u8; SIGNATURE_LENGTH];
        out[..SIGNATURE_COMPONENT_LENGTH].copy_from_slice(&self.r);
        out[SIGNATURE_COMPONENT_LENGTH..].copy_from_slice(&self.s);
        out
    }

    /// Rebuilds a signature from the 64-byte r ‖ s form.
    pub fn from_bytes(bytes: &[u8; SIGNATURE_LENGTH]) -> Self {
        let mut r = [0u8; SIGNATURE_COMPONENT_LENGTH];
        let mut s = [0u8; SIGNATURE_COMPONENT_LENGTH];
        r.copy_from_slice(&bytes[..SIGNATURE_COMPONENT_LENGTH]);
        s.copy_from_slice(&bytes[SIGNATURE_COMPONENT_LENGTH..]);
        Self { r, s }
    }

    /// True when both components are all-zero (an unpopulated header slot).
    pub fn is_zero(&self) -> bool {
        self.r.iter().all(|&b| b == 0) && self.s.iter().all(|&b| b == 0)
    }
}

/// Signs firmware images with a P-256 private key.
///
/// Construction fails when the key material is missing or undecodable;
/// a constructed signer can always sign.
#[derive(Clone)]
pub struct Signer {
    key: SigningKey,
}

impl Signer {
    /// Creates a signer from an in-memory keypair.
    pub fn from_keypair(keypair: &EcdsaKeypair) -> Self {
        Self {
            key: keypair.signing_key(),
        }
    }

    /// Creates a signer from a PKCS#8 PEM string.
    pub fn from_pkcs8_pem(pem: &str) -> Result<Self> {
        let keypair = EcdsaKeypair::from_pkcs8_pem(pem)?;
        Ok(Self::from_keypair(&keypair))
    }

    /// Loads the private key from a PEM file.
    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self> {
        let pem = std::fs::read_to_string(path)?;
        Self::from_pkcs8_pem(&pem)
    }

    /// Signs a firmware image.
    ///
    /// Hashes the full payload with SHA-256 and signs the digest with
    /// randomized ECDSA-P256.
    pub fn sign(&self, firmware: &[u8]) -> Result<RawSignature> {
        let signature: Signature = self
            .key
            .try_sign_with_rng(&mut OsRng, firmware)
            .map_err(|e| ProtocolError::InvalidSignature(e.to_string()))?;

        let bytes = signature.to_bytes();
        let mut raw = [0u8; SIGNATURE_LENGTH];
        raw.copy_from_slice(&bytes);
        Ok(RawSignature::from_bytes(&raw))
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer").field("key", &"[REDACTED]").finish()
    }
}

/// Verifies a firmware signature against a raw 64-byte public point.
///
/// Recomputes SHA-256 over the firmware and checks the signature against
/// the digest. Returns `Ok(())` when the signature is valid.
pub fn verify(
    public_point: &[u8; PUBLIC_POINT_LENGTH],
    firmware: &[u8],
    signature: &RawSignature,
) -> Result<()> {
    let verifying_key = keys::verifying_key_from_point(public_point)?;
    let signature = Signature::from_slice(&signature.to_bytes())?;
    verifying_key
        .verify(firmware, &signature)
        .map_err(ProtocolError::from)
}
