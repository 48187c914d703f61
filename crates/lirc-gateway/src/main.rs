//! lirc-gateway entry point.
//!
//! Loads the configuration, connects to lircd and publishes its remotes on
//! the hub until Ctrl-C or a fatal error.
//!
//! # Usage
//!
//! ```text
//! lirc-gateway [OPTIONS]
//!
//! Options:
//!   --config        <FILE>  TOML config file [default: config.toml]
//!   --lirc-host     <HOST>  lircd host
//!   --lirc-port     <PORT>  lircd port
//!   --brain-ip      <IP>    NEEO brain address (skips discovery)
//!   --callback-port <PORT>  Local port for hub callbacks
//!   --key-mapping   <FILE>  JSON key-mapping file
//! ```
//!
//! # Environment variable overrides
//!
//! CLI args take precedence over environment variables, which take
//! precedence over the config file.
//!
//! | Variable               | Flag              |
//! |------------------------|-------------------|
//! | `LIRC_GATEWAY_CONFIG`  | `--config`        |
//! | `LIRC_HOST`            | `--lirc-host`     |
//! | `LIRC_PORT`            | `--lirc-port`     |
//! | `BRAINIP`              | `--brain-ip`      |
//! | `NEEO_CALLBACK_PORT`   | `--callback-port` |
//! | `LIRC_KEY_MAPPING`     | `--key-mapping`   |
//!
//! `RUST_LOG` overrides the config file's `log_level`.
//!
//! # Exit codes
//!
//! | code | meaning                                  |
//! |------|------------------------------------------|
//! | 0    | clean shutdown                           |
//! | 1    | configuration or command-line error      |
//! | 2    | lircd unreachable                        |
//! | 3    | lircd violated the protocol contract     |
//! | 4    | ambiguous button mapping                 |
//! | 5    | hub failure                              |

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use lirc_core::KeyMap;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use lirc_gateway::application::run_gateway::{GatewayError, GatewayService, GatewaySettings};
use lirc_gateway::domain::GatewayConfig;
use lirc_gateway::infrastructure::{
    hub::JsonLineHub,
    lirc_conn::{spawn_connection, LircConnectionConfig},
    storage::{effective_key_map, load_config, DEFAULT_CONFIG_FILE},
};

/// Interface the hub callback server listens on.
const CALLBACK_BIND: &str = "0.0.0.0";

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Publishes lircd remotes as NEEO devices.
#[derive(Debug, Parser)]
#[command(
    name = "lirc-gateway",
    about = "Publishes lircd remotes as virtual devices on a NEEO hub",
    version
)]
struct Cli {
    /// TOML configuration file.
    ///
    /// Without this flag `config.toml` in the working directory is used if
    /// it exists.
    #[arg(long, env = "LIRC_GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Hostname or IP address of lircd.
    #[arg(long, env = "LIRC_HOST")]
    lirc_host: Option<String>,

    /// TCP port of lircd.
    #[arg(long, env = "LIRC_PORT")]
    lirc_port: Option<u16>,

    /// Address of the NEEO brain. Skips brain discovery.
    #[arg(long, env = "BRAINIP")]
    brain_ip: Option<String>,

    /// Local port the brain sends button callbacks to.
    #[arg(long, env = "NEEO_CALLBACK_PORT")]
    callback_port: Option<u16>,

    /// JSON key-mapping file; replaces `key_mapping_file` from the config.
    #[arg(long, env = "LIRC_KEY_MAPPING")]
    key_mapping: Option<PathBuf>,
}

impl Cli {
    /// Loads the config file and applies the flags on top.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read or parsed, or if the merged
    /// configuration is invalid.
    fn into_gateway_config(self) -> anyhow::Result<(GatewayConfig, KeyMap)> {
        let (path, explicit) = match self.config {
            Some(path) => (path, true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        let mut config = load_config(&path, explicit)
            .with_context(|| format!("loading configuration from {}", path.display()))?;

        if let Some(host) = self.lirc_host {
            config.lirc.host = host;
        }
        if let Some(port) = self.lirc_port {
            config.lirc.port = port;
        }
        if let Some(brain) = self.brain_ip {
            config.neeo.brain_ip = Some(brain);
        }
        if let Some(port) = self.callback_port {
            config.neeo.callback_port = port;
        }
        config
            .validate()
            .context("command-line overrides produce an invalid configuration")?;

        let keys = effective_key_map(&config, self.key_mapping.as_deref())
            .context("loading key mappings")?;
        Ok((config, keys))
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version also arrive here, on stdout.
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    // Config loading logs through a temporary subscriber; the real one needs
    // the configured log level.
    let loaded = tracing::subscriber::with_default(bootstrap_subscriber(), || {
        cli.into_gateway_config()
    });
    let (config, keys) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("lirc-gateway: {e:#}");
            return ExitCode::from(1);
        }
    };

    init_logging(&config.log_level);
    info!(
        "lirc-gateway starting: lircd={}:{}, callback port {}",
        config.lirc.host, config.lirc.port, config.neeo.callback_port
    );

    match run(config, keys).await {
        Ok(()) => {
            info!("lirc-gateway stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("lirc-gateway stopped: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn bootstrap_subscriber() -> impl tracing::Subscriber + Send + Sync {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish()
}

/// `RUST_LOG` wins over the configured level.
fn init_logging(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .init();
}

async fn run(config: GatewayConfig, keys: KeyMap) -> Result<(), GatewayError> {
    // ── Graceful shutdown flag ────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    // ── lircd connection ──────────────────────────────────────────────────────
    let (client, events) = spawn_connection(LircConnectionConfig::from(&config));

    // ── Hub ───────────────────────────────────────────────────────────────────
    let hub = Arc::new(JsonLineHub::new(CALLBACK_BIND, Arc::clone(&running)));
    let settings = GatewaySettings {
        keys,
        style: config.device_style(),
        brain: config.neeo.brain_ip.clone(),
        callback_port: config.neeo.callback_port,
        base_url: config.callback_base_url(),
        server_name: config.neeo.server_name.clone(),
    };

    GatewayService::new(Arc::new(client), hub, settings)
        .run(events, running)
        .await
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_config(content: &str) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(format!("lirc_gateway_cli_{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("gateway.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_cli_without_flags_has_no_overrides() {
        let cli = Cli::parse_from(["lirc-gateway"]);
        assert!(cli.lirc_port.is_none());
        assert!(cli.key_mapping.is_none());
    }

    #[test]
    fn test_cli_parses_all_flags() {
        // Arrange / Act
        let cli = Cli::parse_from([
            "lirc-gateway",
            "--config",
            "/etc/lirc-gateway.toml",
            "--lirc-host",
            "pi.local",
            "--lirc-port",
            "9000",
            "--brain-ip",
            "192.168.1.20",
            "--callback-port",
            "7000",
            "--key-mapping",
            "keys.json",
        ]);

        // Assert
        assert_eq!(cli.config, Some(PathBuf::from("/etc/lirc-gateway.toml")));
        assert_eq!(cli.lirc_host.as_deref(), Some("pi.local"));
        assert_eq!(cli.lirc_port, Some(9000));
        assert_eq!(cli.brain_ip.as_deref(), Some("192.168.1.20"));
        assert_eq!(cli.callback_port, Some(7000));
        assert_eq!(cli.key_mapping, Some(PathBuf::from("keys.json")));
    }

    #[test]
    fn test_cli_rejects_non_numeric_port() {
        let result = Cli::try_parse_from(["lirc-gateway", "--lirc-port", "http"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_flags_override_config_file() {
        // Arrange
        let (dir, path) = temp_config("[lirc]\nhost = \"from-file\"\nport = 1234\n");
        let cli = Cli::parse_from([
            "lirc-gateway",
            "--config",
            path.to_str().unwrap(),
            "--lirc-host",
            "from-cli",
            "--brain-ip",
            "10.0.0.2",
        ]);

        // Act
        let (config, keys) = cli.into_gateway_config().unwrap();

        // Assert
        assert_eq!(config.lirc.host, "from-cli");
        assert_eq!(config.lirc.port, 1234);
        assert_eq!(config.neeo.brain_ip.as_deref(), Some("10.0.0.2"));
        assert!(keys.is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let (dir, path) = temp_config("");
        let cli = Cli::parse_from(["lirc-gateway", "--config", path.to_str().unwrap(), "--lirc-port", "0"]);

        let result = cli.into_gateway_config();

        assert!(result.is_err());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let cli = Cli::parse_from(["lirc-gateway", "--config", "/nonexistent/lirc-gateway.toml"]);
        assert!(cli.into_gateway_config().is_err());
    }
}
