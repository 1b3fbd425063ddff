//! smOTA Host Tool
//!
//! Packages, signs and delivers firmware updates to smOTA devices.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use smota_host::commands::{handshake, keygen, package, sign, verify};
use smota_host::config::HostConfig;

/// smOTA host tool - package, sign and deliver firmware updates.
#[derive(Parser, Debug)]
#[command(name = "smota-host")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for the host tool.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Wrap a firmware image in an OTA package
    Package(package::PackageArgs),

    /// Produce a detached signature over a firmware image
    Sign(sign::SignArgs),

    /// Generate ECDSA and AES key material
    Keygen(keygen::KeygenArgs),

    /// Check a package's integrity and signature
    Verify(verify::VerifyArgs),

    /// Run one handshake against a device simulator
    Handshake(handshake::HandshakeArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Load configuration
    let mut config = if let Some(config_path) = &cli.config {
        tracing::info!("Using config file: {:?}", config_path);
        HostConfig::load(config_path)?
    } else {
        HostConfig::load_default()?
    };

    // Apply environment variable overrides
    config.apply_env_overrides();

    // Validate configuration
    config.validate()?;

    match &cli.command {
        Commands::Package(args) => package::run(args, &config),
        Commands::Sign(args) => sign::run(args, &config),
        Commands::Keygen(args) => keygen::run(args, &config),
        Commands::Verify(args) => verify::run(args),
        Commands::Handshake(args) => handshake::run(args, &config).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_debug_assert() {
        // Verify the CLI structure is valid
        Cli::command().debug_assert();
    }

    #[test]
    fn test_package_command() {
        let cli = Cli::try_parse_from(["smota-host", "package", "app.bin"]).unwrap();
        match cli.command {
            Commands::Package(args) => {
                assert_eq!(args.input, PathBuf::from("app.bin"));
                assert!(args.output.is_none());
                assert_eq!(args.fw_version, "1.0.0");
                assert!(!args.sign);
                assert!(args.key.is_none());
            }
            _ => panic!("Expected Package command"),
        }
    }

    #[test]
    fn test_package_with_all_flags() {
        let cli = Cli::try_parse_from([
            "smota-host",
            "package",
            "app.bin",
            "-o",
            "out.ota",
            "--fw-version",
            "2.3.4",
            "--sign",
            "--key",
            "key.pem",
        ])
        .unwrap();
        match cli.command {
            Commands::Package(args) => {
                assert_eq!(args.output, Some(PathBuf::from("out.ota")));
                assert_eq!(args.fw_version, "2.3.4");
                assert!(args.sign);
                assert_eq!(args.key, Some(PathBuf::from("key.pem")));
            }
            _ => panic!("Expected Package command"),
        }
    }

    #[test]
    fn test_package_requires_input() {
        let result = Cli::try_parse_from(["smota-host", "package"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_sign_command() {
        let cli = Cli::try_parse_from(["smota-host", "sign", "app.bin"]).unwrap();
        match cli.command {
            Commands::Sign(args) => {
                assert_eq!(args.firmware, PathBuf::from("app.bin"));
                assert!(args.key.is_none());
                assert!(args.output.is_none());
            }
            _ => panic!("Expected Sign command"),
        }
    }

    #[test]
    fn test_sign_with_key_and_output() {
        let cli = Cli::try_parse_from([
            "smota-host",
            "sign",
            "app.bin",
            "--key",
            "signer.pem",
            "-o",
            "app.sig",
        ])
        .unwrap();
        match cli.command {
            Commands::Sign(args) => {
                assert_eq!(args.key, Some(PathBuf::from("signer.pem")));
                assert_eq!(args.output, Some(PathBuf::from("app.sig")));
            }
            _ => panic!("Expected Sign command"),
        }
    }

    #[test]
    fn test_keygen_defaults() {
        let cli = Cli::try_parse_from(["smota-host", "keygen"]).unwrap();
        match cli.command {
            Commands::Keygen(args) => {
                assert!(!args.ecdsa);
                assert!(!args.aes);
                assert!(args.output.is_none());
                assert!(!args.source);
            }
            _ => panic!("Expected Keygen command"),
        }
    }

    #[test]
    fn test_keygen_ecdsa_with_source() {
        let cli =
            Cli::try_parse_from(["smota-host", "keygen", "--ecdsa", "--source", "-o", "keys"])
                .unwrap();
        match cli.command {
            Commands::Keygen(args) => {
                assert!(args.ecdsa);
                assert!(!args.aes);
                assert!(args.source);
                assert_eq!(args.output, Some(PathBuf::from("keys")));
            }
            _ => panic!("Expected Keygen command"),
        }
    }

    #[test]
    fn test_verify_command() {
        let cli = Cli::try_parse_from(["smota-host", "verify", "app.ota"]).unwrap();
        match cli.command {
            Commands::Verify(args) => {
                assert_eq!(args.package, PathBuf::from("app.ota"));
                assert!(args.public_key.is_none());
            }
            _ => panic!("Expected Verify command"),
        }
    }

    #[test]
    fn test_verify_with_public_key() {
        let cli = Cli::try_parse_from([
            "smota-host",
            "verify",
            "app.ota",
            "--public-key",
            "public.bin",
        ])
        .unwrap();
        match cli.command {
            Commands::Verify(args) => {
                assert_eq!(args.public_key, Some(PathBuf::from("public.bin")));
            }
            _ => panic!("Expected Verify command"),
        }
    }

    #[test]
    fn test_handshake_command() {
        let cli = Cli::try_parse_from(["smota-host", "handshake", "./sim"]).unwrap();
        match cli.command {
            Commands::Handshake(args) => {
                assert_eq!(args.simulator, PathBuf::from("./sim"));
                assert!(args.simulator_args.is_empty());
                assert!(args.project.is_none());
                assert_eq!(args.fw_version, "1.0.0");
            }
            _ => panic!("Expected Handshake command"),
        }
    }

    #[test]
    fn test_handshake_with_project_and_args() {
        let cli = Cli::try_parse_from([
            "smota-host",
            "handshake",
            "--project",
            "MY_PROJECT",
            "./sim",
            "--",
            "--port",
            "9000",
        ])
        .unwrap();
        match cli.command {
            Commands::Handshake(args) => {
                assert_eq!(args.project, Some("MY_PROJECT".to_string()));
                assert_eq!(args.simulator_args, vec!["--port", "9000"]);
            }
            _ => panic!("Expected Handshake command"),
        }
    }

    #[test]
    fn test_handshake_requires_simulator() {
        let result = Cli::try_parse_from(["smota-host", "handshake"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_verbose_flag() {
        let cli = Cli::try_parse_from(["smota-host", "--verbose", "keygen"]).unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn test_global_short_verbose_flag() {
        let cli = Cli::try_parse_from(["smota-host", "-v", "keygen"]).unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn test_global_config_flag() {
        let cli =
            Cli::try_parse_from(["smota-host", "--config", "/etc/smota.toml", "keygen"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/smota.toml")));
    }

    #[test]
    fn test_config_after_command() {
        let cli =
            Cli::try_parse_from(["smota-host", "keygen", "-c", "./smota.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("./smota.toml")));
    }

    #[test]
    fn test_invalid_command_fails() {
        let result = Cli::try_parse_from(["smota-host", "invalid"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_subcommand_fails() {
        let result = Cli::try_parse_from(["smota-host"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_help_available() {
        let result = Cli::try_parse_from(["smota-host", "--help"]);
        // --help causes an early exit, which is treated as an error by try_parse
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_package_help_available() {
        let result = Cli::try_parse_from(["smota-host", "package", "--help"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }
}
