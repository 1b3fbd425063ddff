//! The `sign` subcommand: detached ECDSA signature over a firmware image.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use smota_protocol::Signer;

use crate::config::HostConfig;

use super::package::resolve_key_path;

/// Arguments for the `sign` subcommand.
#[derive(Args, Debug, Clone)]
pub struct SignArgs {
    /// Firmware image to sign
    pub firmware: PathBuf,

    /// Private key PEM file (defaults to the configured key directory)
    #[arg(short, long)]
    pub key: Option<PathBuf>,

    /// Write the 64-byte r ‖ s signature here instead of printing hex
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn run(args: &SignArgs, config: &HostConfig) -> Result<()> {
    let key_path = resolve_key_path(args.key.as_ref(), config);
    let signer = Signer::from_pem_file(&key_path)
        .with_context(|| format!("Failed to load private key: {}", key_path.display()))?;

    let firmware = fs::read(&args.firmware)
        .with_context(|| format!("Failed to read firmware: {}", args.firmware.display()))?;

    tracing::info!("Signing {} ({} bytes)", args.firmware.display(), firmware.len());
    let signature = signer.sign(&firmware)?;

    match &args.output {
        Some(path) => {
            fs::write(path, signature.to_bytes())
                .with_context(|| format!("Failed to write signature: {}", path.display()))?;
            println!("Signature written to: {}", path.display());
        }
        None => {
            println!("Signature (r): {}", hex::encode(signature.r));
            println!("Signature (s): {}", hex::encode(signature.s));
        }
    }
    Ok(())
}
