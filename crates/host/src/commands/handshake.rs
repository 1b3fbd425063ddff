//! The `handshake` subcommand: run one handshake against a device simulator.
//!
//! The simulator is spawned as a subprocess with piped stdio; frames travel
//! over its stdin/stdout. One request is sent and one response awaited,
//! then the subprocess is torn down.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use tokio::process::Command;

use smota_protocol::{describe_error, FirmwareVersion, HandshakeRequest};

use crate::config::HostConfig;
use crate::session::HandshakeSession;
use crate::transport::FrameTransport;

/// Arguments for the `handshake` subcommand.
#[derive(Args, Debug, Clone)]
pub struct HandshakeArgs {
    /// Device simulator executable
    pub simulator: PathBuf,

    /// Arguments passed through to the simulator
    #[arg(trailing_var_arg = true)]
    pub simulator_args: Vec<String>,

    /// Project identifier (defaults to the configured one)
    #[arg(long)]
    pub project: Option<String>,

    /// Firmware version to announce (major.minor.patch)
    #[arg(long = "fw-version", default_value = "1.0.0")]
    pub fw_version: String,
}

pub async fn run(args: &HandshakeArgs, config: &HostConfig) -> Result<()> {
    let request = build_request(args, config)?;

    tracing::info!("Spawning simulator: {}", args.simulator.display());
    let mut child = Command::new(&args.simulator)
        .args(&args.simulator_args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("Failed to spawn simulator: {}", args.simulator.display()))?;

    let stdout = child.stdout.take().context("Simulator stdout not piped")?;
    let stdin = child.stdin.take().context("Simulator stdin not piped")?;

    let mut session = HandshakeSession::new(FrameTransport::new(stdout, stdin));
    session.send_handshake(&request).await?;

    let timeout = Duration::from_millis(config.handshake.response_timeout_ms);
    let outcome = session.await_response(timeout).await?;

    session.shutdown();
    let _ = child.kill().await;

    match outcome {
        Some(response) if response.is_success() => {
            println!("Handshake accepted");
            if let Some(details) = response.details {
                println!("  Resume offset:   {}", details.next_offset);
                println!("  Max packet size: {}", details.max_packet_size);
                println!("  MTU size:        {}", details.mtu_size);
                println!("  Flash free:      {} bytes", details.flash_free_size);
                println!("  Capabilities:    0x{:02X}", details.capabilities);
            }
            Ok(())
        }
        Some(response) => {
            bail!(
                "Device rejected handshake (code 0x{:08X}: {})",
                response.error_code,
                describe_error(response.error_code)
            );
        }
        None => bail!(
            "Handshake timed out after {} ms",
            config.handshake.response_timeout_ms
        ),
    }
}

/// Builds the request from CLI overrides on top of the configuration.
fn build_request(args: &HandshakeArgs, config: &HostConfig) -> Result<HandshakeRequest> {
    let project = args
        .project
        .as_deref()
        .unwrap_or(&config.handshake.project_id);

    let request = HandshakeRequest::new(
        FirmwareVersion::parse_lossy(&args.fw_version),
        project,
        config.handshake.block_timeout_ms,
        config.handshake.check_timeout_ms,
        config.handshake.install_timeout_ms,
        config.handshake.total_timeout_ms,
    )?;
    Ok(request)
}
