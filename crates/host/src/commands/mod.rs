//! Implementations of the CLI subcommands.

pub mod handshake;
pub mod keygen;
pub mod package;
pub mod sign;
pub mod verify;
