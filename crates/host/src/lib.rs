//! # smOTA Host Library
//!
//! This crate provides the host-side tooling for the smOTA embedded
//! firmware update system: packaging and signing firmware images,
//! generating key material, and talking to devices over the framed
//! transport.
//!
//! ## Overview
//!
//! - **Configuration**: TOML config with key locations and handshake
//!   parameters
//! - **Transport**: frame-oriented async transport with a background
//!   reader task
//! - **Session**: the handshake request/response state machine
//! - **Commands**: implementations behind the CLI subcommands
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use smota_host::config::HostConfig;
//! use smota_host::session::HandshakeSession;
//! use smota_host::transport::FrameTransport;
//! use smota_protocol::{FirmwareVersion, HandshakeRequest};
//! use std::time::Duration;
//!
//! # async fn example(reader: tokio::io::DuplexStream) -> anyhow::Result<()> {
//! let config = HostConfig::load_default()?;
//! let (read, write) = tokio::io::split(reader);
//!
//! let mut session = HandshakeSession::new(FrameTransport::new(read, write));
//! let request = HandshakeRequest::new(
//!     FirmwareVersion::new(1, 0, 0),
//!     &config.handshake.project_id,
//!     config.handshake.block_timeout_ms,
//!     config.handshake.check_timeout_ms,
//!     config.handshake.install_timeout_ms,
//!     config.handshake.total_timeout_ms,
//! )?;
//!
//! session.send_handshake(&request).await?;
//! let response = session.await_response(Duration::from_secs(5)).await?;
//! # Ok(())
//! # }
//! ```

pub mod commands;
pub mod config;
pub mod session;
pub mod transport;

pub use config::{HostConfig, HandshakeConfig, KeysConfig};
pub use session::{HandshakeSession, SessionError, SessionState};
pub use transport::FrameTransport;
