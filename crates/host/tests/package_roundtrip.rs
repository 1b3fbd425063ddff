//! End-to-end tool pipeline: keygen, package, sign, verify against real
//! files on disk.

use std::fs;

use tempfile::TempDir;

use smota_host::commands::{keygen, package, sign, verify};
use smota_host::config::HostConfig;
use smota_protocol::{signer, Package, RawSignature, FLAG_SIGNED, HEADER_SIZE, SIGNATURE_LENGTH};

fn keygen_into(dir: &TempDir) -> std::path::PathBuf {
    let key_dir = dir.path().join("keys");
    let args = keygen::KeygenArgs {
        ecdsa: false,
        aes: false,
        output: Some(key_dir.clone()),
        source: true,
    };
    keygen::run(&args, &HostConfig::default()).unwrap();
    key_dir
}

#[test]
fn keygen_package_verify_pipeline() {
    let dir = TempDir::new().unwrap();
    let key_dir = keygen_into(&dir);

    let firmware_path = dir.path().join("blinky.bin");
    let firmware: Vec<u8> = (0..2048u32).map(|i| (i % 251) as u8).collect();
    fs::write(&firmware_path, &firmware).unwrap();

    let package_path = dir.path().join("blinky.ota");
    package::run(
        &package::PackageArgs {
            input: firmware_path,
            output: Some(package_path.clone()),
            fw_version: "3.1.4".to_string(),
            sign: true,
            key: Some(key_dir.join("ecdsa_private_key.pem")),
        },
        &HostConfig::default(),
    )
    .unwrap();

    let bytes = fs::read(&package_path).unwrap();
    assert_eq!(bytes.len(), HEADER_SIZE + firmware.len());

    let parsed = Package::parse(&bytes).unwrap();
    assert_eq!(parsed.header.flags & FLAG_SIGNED, FLAG_SIGNED);
    assert_eq!(parsed.firmware, &firmware[..]);

    // The verify command accepts the package with the generated public key.
    verify::run(&verify::VerifyArgs {
        package: package_path,
        public_key: Some(key_dir.join("ecdsa_public_key.bin")),
    })
    .unwrap();
}

#[test]
fn verify_rejects_corrupted_package() {
    let dir = TempDir::new().unwrap();
    let key_dir = keygen_into(&dir);

    let firmware_path = dir.path().join("app.bin");
    fs::write(&firmware_path, b"original firmware contents").unwrap();

    let package_path = dir.path().join("app.ota");
    package::run(
        &package::PackageArgs {
            input: firmware_path,
            output: Some(package_path.clone()),
            fw_version: "1.0.0".to_string(),
            sign: true,
            key: Some(key_dir.join("ecdsa_private_key.pem")),
        },
        &HostConfig::default(),
    )
    .unwrap();

    // Flip one firmware byte past the header.
    let mut bytes = fs::read(&package_path).unwrap();
    bytes[HEADER_SIZE + 4] ^= 0x80;
    fs::write(&package_path, &bytes).unwrap();

    let result = verify::run(&verify::VerifyArgs {
        package: package_path,
        public_key: Some(key_dir.join("ecdsa_public_key.bin")),
    });
    assert!(result.is_err());
}

#[test]
fn detached_signature_matches_generated_keys() {
    let dir = TempDir::new().unwrap();
    let key_dir = keygen_into(&dir);

    let firmware_path = dir.path().join("app.bin");
    fs::write(&firmware_path, b"detached signing input").unwrap();

    let sig_path = dir.path().join("app.sig");
    sign::run(
        &sign::SignArgs {
            firmware: firmware_path,
            key: Some(key_dir.join("ecdsa_private_key.pem")),
            output: Some(sig_path.clone()),
        },
        &HostConfig::default(),
    )
    .unwrap();

    let sig_bytes = fs::read(&sig_path).unwrap();
    assert_eq!(sig_bytes.len(), SIGNATURE_LENGTH);
    let mut raw = [0u8; SIGNATURE_LENGTH];
    raw.copy_from_slice(&sig_bytes);

    let point_bytes = fs::read(key_dir.join("ecdsa_public_key.bin")).unwrap();
    let mut point = [0u8; 64];
    point.copy_from_slice(&point_bytes);

    signer::verify(
        &point,
        b"detached signing input",
        &RawSignature::from_bytes(&raw),
    )
    .unwrap();
}

#[test]
fn default_output_name_swaps_extension() {
    let dir = TempDir::new().unwrap();

    let firmware_path = dir.path().join("widget.bin");
    fs::write(&firmware_path, b"fw").unwrap();

    package::run(
        &package::PackageArgs {
            input: firmware_path,
            output: None,
            fw_version: "0.9.0".to_string(),
            sign: false,
            key: None,
        },
        &HostConfig::default(),
    )
    .unwrap();

    assert!(dir.path().join("widget.ota").exists());
}
