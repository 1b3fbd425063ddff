//! The `keygen` subcommand: generate ECDSA and AES key material.
//!
//! Besides the raw key files, the command can render the public material
//! as C source constants ready to embed in device firmware.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use smota_protocol::{
    generate_master_key, EcdsaKeypair, MASTER_KEY_LENGTH, PUBLIC_POINT_LENGTH,
};

use crate::config::HostConfig;

/// Arguments for the `keygen` subcommand.
#[derive(Args, Debug, Clone)]
pub struct KeygenArgs {
    /// Generate only the ECDSA-P256 keypair
    #[arg(long)]
    pub ecdsa: bool,

    /// Generate only the AES-128 master key
    #[arg(long)]
    pub aes: bool,

    /// Output directory (defaults to the configured key directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Also emit C source constants for device firmware
    #[arg(long)]
    pub source: bool,
}

pub fn run(args: &KeygenArgs, config: &HostConfig) -> Result<()> {
    // Neither flag means both kinds.
    let gen_ecdsa = args.ecdsa || !args.aes;
    let gen_aes = args.aes || !args.ecdsa;

    let output_dir = args.output.clone().unwrap_or_else(|| config.keys.key_dir.clone());
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create key directory: {}", output_dir.display()))?;

    if gen_ecdsa {
        let keypair = EcdsaKeypair::generate();
        let point = keypair.public_point()?;

        let private_path = output_dir.join("ecdsa_private_key.pem");
        write_key_file(&private_path, keypair.to_pkcs8_pem()?.as_bytes())?;
        println!("Private key: {}", private_path.display());
        println!("  Keep this file secret; the device only needs the public point.");

        let public_path = output_dir.join("ecdsa_public_key.bin");
        write_key_file(&public_path, &point)?;
        println!("Public key:  {}", public_path.display());

        if args.source {
            let source_path = output_dir.join("ecdsa_public_key.c");
            write_key_file(&source_path, render_public_point_source(&point).as_bytes())?;
            println!("C source:    {}", source_path.display());
        }
    }

    if gen_aes {
        let master_key = generate_master_key();

        let key_path = output_dir.join("aes_master_key.bin");
        write_key_file(&key_path, &master_key)?;
        println!("Master key:  {}", key_path.display());

        if args.source {
            let source_path = output_dir.join("aes_master_key.c");
            write_key_file(&source_path, render_master_key_source(&master_key).as_bytes())?;
            println!("C source:    {}", source_path.display());
        }
    }

    Ok(())
}

fn write_key_file(path: &Path, contents: &[u8]) -> Result<()> {
    fs::write(path, contents)
        .with_context(|| format!("Failed to write key file: {}", path.display()))
}

/// Formats bytes as rows of C hex literals, indented four spaces.
fn format_byte_rows(bytes: &[u8], per_row: usize) -> String {
    bytes
        .chunks(per_row)
        .map(|row| {
            let cells: Vec<String> = row.iter().map(|b| format!("0x{b:02X}")).collect();
            format!("    {}", cells.join(", "))
        })
        .collect::<Vec<_>>()
        .join(",\n")
}

/// Renders the uncompressed public point as embeddable C constants:
/// the x and y coordinates separately plus the combined 64-byte array.
pub fn render_public_point_source(point: &[u8; PUBLIC_POINT_LENGTH]) -> String {
    let half = PUBLIC_POINT_LENGTH / 2;
    format!(
        "/* ECDSA-P256 public key (uncompressed point, generated by smota-host keygen) */\n\
         static const uint8_t smota_ecdsa_pub_key_x[{half}] = {{\n{x}\n}};\n\
         \n\
         static const uint8_t smota_ecdsa_pub_key_y[{half}] = {{\n{y}\n}};\n\
         \n\
         static const uint8_t smota_ecdsa_pub_key[{len}] = {{\n{full}\n}};\n",
        half = half,
        len = PUBLIC_POINT_LENGTH,
        x = format_byte_rows(&point[..half], 8),
        y = format_byte_rows(&point[half..], 8),
        full = format_byte_rows(point, 8),
    )
}

/// Renders the AES master key as an embeddable C constant.
pub fn render_master_key_source(key: &[u8; MASTER_KEY_LENGTH]) -> String {
    format!(
        "/* AES-128 master key (generated by smota-host keygen) */\n\
         static const uint8_t smota_aes_master_key[{len}] = {{\n{rows}\n}};\n",
        len = MASTER_KEY_LENGTH,
        rows = format_byte_rows(key, 16),
    )
}
