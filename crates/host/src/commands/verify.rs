//! The `verify` subcommand: check a package's integrity and signature.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use smota_protocol::{Package, PUBLIC_POINT_LENGTH};

/// Arguments for the `verify` subcommand.
#[derive(Args, Debug, Clone)]
pub struct VerifyArgs {
    /// Package file to verify (.ota)
    pub package: PathBuf,

    /// 64-byte public key file; when given, the signature is checked too
    #[arg(short, long)]
    pub public_key: Option<PathBuf>,
}

pub fn run(args: &VerifyArgs) -> Result<()> {
    let bytes = fs::read(&args.package)
        .with_context(|| format!("Failed to read package: {}", args.package.display()))?;

    let parsed = Package::parse(&bytes)?;
    println!("Package: {}", args.package.display());
    println!("  Firmware version: {}", parsed.header.version);
    println!("  Firmware size:    {} bytes", parsed.header.firmware_size);
    println!("  Signed:           {}", if parsed.header.is_signed() { "yes" } else { "no" });

    parsed.header.verify_integrity(parsed.firmware)?;
    println!("  CRC-32:           ok");
    println!("  SHA-256:          ok");

    if let Some(key_path) = &args.public_key {
        let key_bytes = fs::read(key_path)
            .with_context(|| format!("Failed to read public key: {}", key_path.display()))?;
        if key_bytes.len() != PUBLIC_POINT_LENGTH {
            bail!(
                "Public key must be {} bytes, got {}",
                PUBLIC_POINT_LENGTH,
                key_bytes.len()
            );
        }
        let mut point = [0u8; PUBLIC_POINT_LENGTH];
        point.copy_from_slice(&key_bytes);

        parsed.header.verify_signature(&point, parsed.firmware)?;
        println!("  Signature:        ok");
    } else if parsed.header.is_signed() {
        println!("  Signature:        not checked (no public key given)");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use smota_protocol::{EcdsaKeypair, FirmwareVersion, PackageBuilder, Signer};
    use tempfile::TempDir;

    fn write_signed_package(dir: &TempDir) -> (PathBuf, PathBuf) {
        let keypair = EcdsaKeypair::generate();
        let builder = PackageBuilder::with_signer(Signer::from_keypair(&keypair));
        let package = builder
            .build(b"sample firmware", FirmwareVersion::new(1, 2, 3), true)
            .unwrap();

        let package_path = dir.path().join("app.ota");
        fs::write(&package_path, &package).unwrap();

        let key_path = dir.path().join("public.bin");
        fs::write(&key_path, keypair.public_point().unwrap()).unwrap();

        (package_path, key_path)
    }

    #[test]
    fn test_verify_signed_package() {
        let dir = TempDir::new().unwrap();
        let (package, public_key) = write_signed_package(&dir);

        run(&VerifyArgs {
            package,
            public_key: Some(public_key),
        })
        .unwrap();
    }

    #[test]
    fn test_verify_without_key_skips_signature() {
        let dir = TempDir::new().unwrap();
        let (package, _) = write_signed_package(&dir);

        run(&VerifyArgs {
            package,
            public_key: None,
        })
        .unwrap();
    }

    #[test]
    fn test_verify_detects_tampered_firmware() {
        let dir = TempDir::new().unwrap();
        let (package, public_key) = write_signed_package(&dir);

        let mut bytes = fs::read(&package).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        fs::write(&package, &bytes).unwrap();

        assert!(run(&VerifyArgs {
            package,
            public_key: Some(public_key),
        })
        .is_err());
    }

    #[test]
    fn test_verify_rejects_wrong_key() {
        let dir = TempDir::new().unwrap();
        let (package, _) = write_signed_package(&dir);

        let other = EcdsaKeypair::generate().public_point().unwrap();
        let other_path = dir.path().join("other.bin");
        fs::write(&other_path, other).unwrap();

        assert!(run(&VerifyArgs {
            package,
            public_key: Some(other_path),
        })
        .is_err());
    }

    #[test]
    fn test_verify_rejects_short_key_file() {
        let dir = TempDir::new().unwrap();
        let (package, _) = write_signed_package(&dir);

        let short_path = dir.path().join("short.bin");
        fs::write(&short_path, [0u8; 10]).unwrap();

        assert!(run(&VerifyArgs {
            package,
            public_key: Some(short_path),
        })
        .is_err());
    }
}
