//! # grimoire-relay
//!
//! Session relay binary: loads settings, starts the HTTP/WebSocket server and
//! waits for ctrl-c.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use grimoire_server::{RelayServer, ServerConfig};
use grimoire_settings::{LoggingSettings, RelaySettings};

/// Grimoire session relay.
#[derive(Parser, Debug)]
#[command(name = "grimoire-relay", about = "Grimoire session relay server")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (defaults to `~/.grimoire/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `grimoire_rpc=trace` (overrides settings).
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn apply(&self, settings: &mut RelaySettings) {
        if let Some(ref host) = self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(ref level) = self.log_level {
            settings.logging.level.clone_from(level);
        }
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
fn init_logging(logging: &LoggingSettings) {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let result = if logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .compact()
            .try_init()
    };
    let _ = result;
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let settings_path = args
        .settings
        .clone()
        .unwrap_or_else(grimoire_settings::settings_path);
    let mut settings = grimoire_settings::load_settings_from_path(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;
    args.apply(&mut settings);

    init_logging(&settings.logging);

    let config = ServerConfig::from(&settings);
    tracing::info!(
        max_age_secs = config.session_max_age.as_secs(),
        sweep_secs = config.sweep_interval.as_secs(),
        "starting grimoire relay"
    );

    let server = RelayServer::new(config);
    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!("Grimoire relay listening on http://{addr} (ws://{addr}/ws)");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    server.shutdown().graceful_shutdown(None).await;
    let _ = handle.await;

    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_flags_keep_settings() {
        let cli = Cli::parse_from(["grimoire-relay"]);
        let mut settings = RelaySettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 3000);
        assert!(cli.settings.is_none());
    }

    #[test]
    fn flags_override_settings() {
        let cli = Cli::parse_from([
            "grimoire-relay",
            "--host",
            "127.0.0.1",
            "--port",
            "0",
            "--log-level",
            "debug",
        ]);
        let mut settings = RelaySettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 0);
        assert_eq!(settings.logging.level, "debug");
    }

    #[test]
    fn settings_path_flag() {
        let cli = Cli::parse_from(["grimoire-relay", "--settings", "/etc/grimoire.json"]);
        assert_eq!(cli.settings, Some(PathBuf::from("/etc/grimoire.json")));
    }

    #[test]
    fn bad_port_is_rejected() {
        assert!(Cli::try_parse_from(["grimoire-relay", "--port", "70000"]).is_err());
    }
}
