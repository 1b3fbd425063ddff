//! The `package` subcommand: wrap a firmware image in an OTA package.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use smota_protocol::{FirmwareVersion, PackageBuilder, Signer};

use crate::config::HostConfig;

/// Arguments for the `package` subcommand.
#[derive(Args, Debug, Clone)]
pub struct PackageArgs {
    /// Input firmware image (.bin)
    pub input: PathBuf,

    /// Output package file (defaults to the input name with .ota)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Firmware version embedded in the header (major.minor.patch)
    #[arg(long = "fw-version", default_value = "1.0.0")]
    pub fw_version: String,

    /// Sign the package with the ECDSA private key
    #[arg(short, long)]
    pub sign: bool,

    /// Private key PEM file (defaults to the configured key directory)
    #[arg(short, long)]
    pub key: Option<PathBuf>,
}

/// Resolve the private key path from arguments or configuration.
pub(crate) fn resolve_key_path(explicit: Option<&PathBuf>, config: &HostConfig) -> PathBuf {
    explicit.cloned().unwrap_or_else(|| {
        config.keys.key_dir.join(&config.keys.private_key)
    })
}

pub fn run(args: &PackageArgs, config: &HostConfig) -> Result<()> {
    let firmware = fs::read(&args.input)
        .with_context(|| format!("Failed to read firmware: {}", args.input.display()))?;

    let version = FirmwareVersion::parse_lossy(&args.fw_version);

    let builder = if args.sign {
        let key_path = resolve_key_path(args.key.as_ref(), config);
        tracing::info!("Signing with key: {}", key_path.display());
        let signer = Signer::from_pem_file(&key_path)
            .with_context(|| format!("Failed to load private key: {}", key_path.display()))?;
        PackageBuilder::with_signer(signer)
    } else {
        PackageBuilder::new()
    };

    let package = builder.build(&firmware, version, args.sign)?;

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| args.input.with_extension("ota"));
    fs::write(&output, &package)
        .with_context(|| format!("Failed to write package: {}", output.display()))?;

    println!("Package created: {}", output.display());
    println!("  Firmware size:    {} bytes", firmware.len());
    println!("  Firmware version: {}", version);
    println!("  Signed:           {}", if args.sign { "yes" } else { "no" });
    Ok(())
}
